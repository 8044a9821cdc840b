//! Service contract — shared core, explicit context, bounded async execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, warn};

use crate::config::{ConfigProvider, ServiceConfig};
use crate::error::{CoreError, Result};
use crate::partition::ResourcePartitionManager;
use crate::state::StateStore;
use crate::task::{TaskHandle, TaskPool};
use crate::telemetry::TelemetrySource;

/// Everything a service needs from its host, passed explicitly to every
/// constructor. There is no process-wide singleton.
#[derive(Clone)]
pub struct ServiceContext {
    pub config: Arc<dyn ConfigProvider>,
    pub telemetry: Arc<dyn TelemetrySource>,
    pub partitions: Arc<dyn ResourcePartitionManager>,
    pub pool: Arc<TaskPool>,
}

impl ServiceContext {
    /// Build a context with a task pool sized from the global performance
    /// config.
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        telemetry: Arc<dyn TelemetrySource>,
        partitions: Arc<dyn ResourcePartitionManager>,
    ) -> Self {
        let pool = Arc::new(TaskPool::new(config.performance().max_concurrent_tasks));
        Self {
            config,
            telemetry,
            partitions,
            pool,
        }
    }
}

/// The base every service composes: resolved config, state store, and the
/// shared task pool. Mirrors one consistent contract — the same store type
/// and execution path for every service.
pub struct ServiceCore {
    name: String,
    config: ServiceConfig,
    enabled: bool,
    state: StateStore,
    pool: Arc<TaskPool>,
    initialized: AtomicBool,
}

impl ServiceCore {
    pub fn new(name: &str, ctx: &ServiceContext) -> Self {
        let config = ctx.config.service_config(name);
        Self {
            name: name.to_string(),
            enabled: config.enabled,
            config,
            state: StateStore::new(),
            pool: Arc::clone(&ctx.pool),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.config.confidence_threshold
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Flip the once-guard. `initialize` may run at most once per instance;
    /// a second call is an error for the caller to log.
    pub fn mark_initialized(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(CoreError::config(format!(
                "service '{}' initialized twice",
                self.name
            )));
        }
        Ok(())
    }

    /// Run `task` on the shared pool without blocking the caller.
    ///
    /// A disabled service yields a handle that resolves to
    /// [`CoreError::Disabled`] without running the task. A failing task is
    /// logged at error severity and rewrapped as [`CoreError::Execution`]
    /// with the original cause attached.
    pub fn execute<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if !self.enabled {
            warn!("Task submitted to disabled service '{}'", self.name);
            return TaskHandle::ready(Err(CoreError::Disabled {
                service: self.name.clone(),
            }));
        }
        let service = self.name.clone();
        self.pool.spawn(async move {
            match task.await {
                Ok(value) => Ok(value),
                Err(source) => {
                    error!("Task failed in service '{}': {:#}", service, source);
                    Err(CoreError::Execution { service, source })
                }
            }
        })
    }

    /// Record a named metric into state as `metric_<name>` plus an RFC 3339
    /// timestamp, honoring the metrics config (enable flag and the tracked
    /// list when non-empty).
    pub fn record_metric(&self, name: &str, value: f64) {
        let metrics = &self.config.metrics;
        if !metrics.enabled {
            return;
        }
        if !metrics.tracked_metrics.is_empty()
            && !metrics.tracked_metrics.iter().any(|m| m == name)
        {
            return;
        }
        self.state.update(&format!("metric_{}", name), value);
        self.state.update(
            &format!("metric_{}_ts", name),
            chrono::Utc::now().to_rfc3339(),
        );
    }
}

/// Contract every service implements. Lifecycle runs through the registry;
/// state and execution funnel through the embedded [`ServiceCore`].
#[async_trait]
pub trait Service: Send + Sync {
    fn core(&self) -> &ServiceCore;
    fn core_mut(&mut self) -> &mut ServiceCore;

    /// Safe to call at most once per instance. A disabled service performs
    /// no further work beyond flipping the guard.
    async fn initialize(&mut self, params: &HashMap<String, Value>) -> Result<()>;

    /// Releases workers and buffers. Idempotent.
    async fn shutdown(&mut self);

    fn name(&self) -> &str {
        self.core().name()
    }

    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfigProvider;
    use crate::testutil::{test_context, MockPartitions, MockTelemetry};

    fn context_with(provider: StaticConfigProvider) -> ServiceContext {
        test_context(
            provider,
            Arc::new(MockTelemetry::new(20.0, 50.0)),
            Arc::new(MockPartitions::default()),
        )
    }

    #[tokio::test]
    async fn test_core_reads_config_fields() {
        let provider = StaticConfigProvider::from_yaml_str(
            "services:\n  voice:\n    enabled: false\n    model_name: whisper\n    confidence_threshold: 0.9\n",
        )
        .unwrap();
        let ctx = context_with(provider);
        let core = ServiceCore::new("voice", &ctx);
        assert!(!core.is_enabled());
        assert_eq!(core.model_name(), "whisper");
        assert_eq!(core.confidence_threshold(), 0.9);
        assert!(core.state().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_execute_on_disabled_service_fails_without_running() {
        let provider = StaticConfigProvider::from_yaml_str(
            "services:\n  voice:\n    enabled: false\n",
        )
        .unwrap();
        let ctx = context_with(provider);
        let core = ServiceCore::new("voice", &ctx);

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = core.execute(async move {
            flag.store(true, Ordering::SeqCst);
            Ok(1)
        });

        assert!(matches!(
            handle.join().await,
            Err(CoreError::Disabled { service }) if service == "voice"
        ));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_execute_wraps_task_errors() {
        let ctx = context_with(StaticConfigProvider::new());
        let core = ServiceCore::new("optimizer", &ctx);

        let handle: TaskHandle<()> =
            core.execute(async { Err(anyhow::anyhow!("model weights missing")) });

        match handle.join().await {
            Err(CoreError::Execution { service, source }) => {
                assert_eq!(service, "optimizer");
                assert!(source.to_string().contains("model weights missing"));
            }
            other => panic!("expected execution error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_execute_success() {
        let ctx = context_with(StaticConfigProvider::new());
        let core = ServiceCore::new("optimizer", &ctx);
        let handle = core.execute(async { Ok("done") });
        assert_eq!(handle.join().await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_mark_initialized_is_once() {
        let ctx = context_with(StaticConfigProvider::new());
        let core = ServiceCore::new("optimizer", &ctx);
        assert!(core.mark_initialized().is_ok());
        assert!(matches!(
            core.mark_initialized(),
            Err(CoreError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_record_metric_honors_tracked_list() {
        let provider = StaticConfigProvider::from_yaml_str(
            "services:\n  optimizer:\n    metrics:\n      tracked_metrics: [latency]\n",
        )
        .unwrap();
        let ctx = context_with(provider);
        let core = ServiceCore::new("optimizer", &ctx);

        core.record_metric("latency", 12.5);
        core.record_metric("untracked", 1.0);

        let snapshot = core.state().snapshot();
        assert_eq!(snapshot.get("metric_latency"), Some(&Value::from(12.5)));
        assert!(snapshot.contains_key("metric_latency_ts"));
        assert!(!snapshot.contains_key("metric_untracked"));
    }

    #[tokio::test]
    async fn test_record_metric_disabled() {
        let provider = StaticConfigProvider::from_yaml_str(
            "services:\n  optimizer:\n    metrics:\n      enabled: false\n",
        )
        .unwrap();
        let ctx = context_with(provider);
        let core = ServiceCore::new("optimizer", &ctx);
        core.record_metric("latency", 12.5);
        assert!(core.state().snapshot().is_empty());
    }
}
