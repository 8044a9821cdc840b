//! Service registry — named instances, lifecycle, typed lookup, status.
//!
//! Lookup goes through a closed set of kind-tagged variants resolved at
//! compile time; there is no downcasting. One service failing to
//! initialize is logged and contained, never a batch abort.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{error, info};

use crate::controller::ResourceController;
use crate::error::{CoreError, Result};
use crate::service::{Service, ServiceContext};

/// Closed set of service kinds the registry can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    ResourceControl,
}

/// A named service to construct at `init` and after every `reload`.
#[derive(Debug, Clone)]
pub struct ServiceDecl {
    pub name: String,
    pub kind: ServiceKind,
}

impl ServiceDecl {
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Kind-tagged service instance.
pub enum ServiceEntry {
    ResourceControl(ResourceController),
}

impl ServiceEntry {
    fn build(decl: &ServiceDecl, ctx: &ServiceContext) -> ServiceEntry {
        match decl.kind {
            ServiceKind::ResourceControl => {
                ServiceEntry::ResourceControl(ResourceController::new(&decl.name, ctx))
            }
        }
    }

    pub fn as_service(&self) -> &dyn Service {
        match self {
            ServiceEntry::ResourceControl(service) => service,
        }
    }

    pub fn as_service_mut(&mut self) -> &mut dyn Service {
        match self {
            ServiceEntry::ResourceControl(service) => service,
        }
    }
}

/// One row of the external status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub enabled: bool,
}

/// Owns the declared services and drives their lifecycle. Services live
/// from `init` until `shutdown`; `reload` drops every instance and builds
/// fresh ones, so no per-service state survives it.
pub struct ServiceRegistry {
    ctx: ServiceContext,
    decls: Vec<ServiceDecl>,
    services: Vec<ServiceEntry>,
}

impl ServiceRegistry {
    /// Duplicate names are a construction error, not a later surprise.
    pub fn new(ctx: ServiceContext, decls: Vec<ServiceDecl>) -> Result<Self> {
        let mut seen = HashSet::new();
        for decl in &decls {
            if !seen.insert(decl.name.as_str()) {
                return Err(CoreError::config(format!(
                    "duplicate service name '{}'",
                    decl.name
                )));
            }
        }
        Ok(Self {
            ctx,
            decls,
            services: Vec::new(),
        })
    }

    /// Build and initialize every declared service, in declaration order.
    /// A failing initialize is logged and its entry stays registered; the
    /// remaining services still come up.
    pub async fn init(&mut self) {
        for decl in &self.decls {
            let mut entry = ServiceEntry::build(decl, &self.ctx);
            let params = self.ctx.config.service_config(&decl.name).parameters;
            if let Err(e) = entry.as_service_mut().initialize(&params).await {
                error!("Failed to initialize service '{}': {}", decl.name, e);
            }
            self.services.push(entry);
        }
        info!("Initialized {} service(s)", self.services.len());
    }

    /// Full restart: shut everything down, then rebuild from declarations.
    pub async fn reload(&mut self) {
        info!("Reloading services");
        self.shutdown().await;
        self.init().await;
    }

    /// Shut down every service, then drop the instances.
    pub async fn shutdown(&mut self) {
        for entry in &mut self.services {
            entry.as_service_mut().shutdown().await;
        }
        self.services.clear();
    }

    /// `{name, enabled}` for every registered service, in insertion order.
    pub fn status(&self) -> Vec<ServiceStatus> {
        self.services
            .iter()
            .map(|entry| {
                let service = entry.as_service();
                ServiceStatus {
                    name: service.name().to_string(),
                    enabled: service.is_enabled(),
                }
            })
            .collect()
    }

    pub fn resource_controller(&self, name: &str) -> Result<&ResourceController> {
        match self.entry(name)? {
            ServiceEntry::ResourceControl(controller) => Ok(controller),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entry(name)
            .map(|entry| entry.as_service().is_enabled())
            .unwrap_or(false)
    }

    /// Detached copy of a service's state map.
    pub fn service_state(&self, name: &str) -> Result<HashMap<String, Value>> {
        Ok(self.entry(name)?.as_service().core().state().snapshot())
    }

    pub fn clear_service_state(&self, name: &str) -> Result<()> {
        self.entry(name)?.as_service().core().state().clear();
        Ok(())
    }

    fn entry(&self, name: &str) -> Result<&ServiceEntry> {
        self.services
            .iter()
            .find(|entry| entry.as_service().name() == name)
            .ok_or_else(|| CoreError::ServiceNotFound {
                name: name.to_string(),
            })
    }
}
