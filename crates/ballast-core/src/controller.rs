//! Resource controller — the sampling/optimization loop.
//!
//! A single background worker samples host telemetry on a fixed period and
//! applies threshold-based control to the resource partitions: idle
//! partitions are unloaded, crowded ones get their class caps halved, and
//! sustained memory pressure forces a compaction. Deliberately a plain
//! threshold controller with no hysteresis band; it will oscillate near the
//! thresholds, which is why every threshold is configuration-driven.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::partition::{AgentClass, ResourcePartitionManager};
use crate::service::{Service, ServiceContext, ServiceCore};
use crate::state::StateStore;
use crate::telemetry::{TelemetrySample, TelemetrySource, TelemetryWindow};

/// Bounded wait for the worker to acknowledge shutdown.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

// State keys written by the control loop.
pub const STATE_STATUS: &str = "status";
pub const STATE_THROUGHPUT: &str = "throughput_rate";
pub const STATE_MEMORY: &str = "memory_percent";
pub const STATE_UNLOADED: &str = "unloaded_count";
pub const STATE_OCCUPANCY: &str = "occupancy";
pub const STATE_SPAWN_REDUCED: &str = "spawn_limits_reduced";
pub const STATE_LAST_COMPACTION: &str = "last_compaction";

/// Loop tuning, read from `ServiceConfig.parameters` at initialize.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Time between cycles.
    pub sample_period: Duration,
    /// Memory percentage above which alerts and compaction trigger.
    pub memory_alert_percent: f64,
    /// Throughput below which an alert is emitted.
    pub throughput_floor: f64,
    /// Occupancy above which class caps are halved.
    pub occupancy_limit: usize,
    /// A partition with no agent within this radius of its anchor unloads.
    pub agent_radius: f64,
    /// Telemetry history bounds.
    pub history_capacity: usize,
    pub history_window: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_secs(30),
            memory_alert_percent: 80.0,
            throughput_floor: 18.0,
            occupancy_limit: 500,
            agent_radius: 128.0,
            history_capacity: 120,
            history_window: Duration::from_secs(3600),
        }
    }
}

impl ControllerSettings {
    /// Parse settings from service parameters. Absent or mistyped keys fall
    /// back per key with a warning; values a controller cannot run with are
    /// a hard config error.
    pub fn from_params(params: &HashMap<String, Value>) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(v) = u64_param(params, "sample_period_secs") {
            settings.sample_period = Duration::from_secs(v);
        }
        if let Some(v) = f64_param(params, "memory_alert_percent") {
            settings.memory_alert_percent = v;
        }
        if let Some(v) = f64_param(params, "throughput_floor") {
            settings.throughput_floor = v;
        }
        if let Some(v) = u64_param(params, "occupancy_limit") {
            settings.occupancy_limit = v as usize;
        }
        if let Some(v) = f64_param(params, "agent_radius") {
            settings.agent_radius = v;
        }
        if let Some(v) = u64_param(params, "history_capacity") {
            settings.history_capacity = v as usize;
        }
        if let Some(v) = u64_param(params, "history_window_secs") {
            settings.history_window = Duration::from_secs(v);
        }

        if settings.sample_period.is_zero() {
            return Err(CoreError::config("sample_period_secs must be positive"));
        }
        if settings.agent_radius <= 0.0 {
            return Err(CoreError::config("agent_radius must be positive"));
        }
        if settings.history_capacity == 0 {
            return Err(CoreError::config("history_capacity must be positive"));
        }
        Ok(settings)
    }
}

fn u64_param(params: &HashMap<String, Value>, key: &str) -> Option<u64> {
    let value = params.get(key)?;
    match value.as_u64() {
        Some(v) => Some(v),
        None => {
            warn!("Ignoring non-integer parameter '{}': {}", key, value);
            None
        }
    }
}

fn f64_param(params: &HashMap<String, Value>, key: &str) -> Option<f64> {
    let value = params.get(key)?;
    match value.as_f64() {
        Some(v) => Some(v),
        None => {
            warn!("Ignoring non-numeric parameter '{}': {}", key, value);
            None
        }
    }
}

/// Adaptive resource controller service. STOPPED until `initialize` spawns
/// the worker; `shutdown` signals it and waits a bounded window.
pub struct ResourceController {
    core: ServiceCore,
    telemetry: Arc<dyn TelemetrySource>,
    partitions: Arc<dyn ResourcePartitionManager>,
    settings: ControllerSettings,
    stop_tx: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl ResourceController {
    pub fn new(name: &str, ctx: &ServiceContext) -> Self {
        Self {
            core: ServiceCore::new(name, ctx),
            telemetry: Arc::clone(&ctx.telemetry),
            partitions: Arc::clone(&ctx.partitions),
            settings: ControllerSettings::default(),
            stop_tx: None,
            worker: None,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map(|w| !w.is_finished()).unwrap_or(false)
    }
}

#[async_trait]
impl Service for ResourceController {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ServiceCore {
        &mut self.core
    }

    async fn initialize(&mut self, params: &HashMap<String, Value>) -> Result<()> {
        self.core.mark_initialized()?;
        if !self.core.is_enabled() {
            info!(
                "Resource controller '{}' is disabled, not starting",
                self.core.name()
            );
            return Ok(());
        }

        self.settings = ControllerSettings::from_params(params)?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = ControlWorker {
            service: self.core.name().to_string(),
            state: self.core.state().clone(),
            telemetry: Arc::clone(&self.telemetry),
            partitions: Arc::clone(&self.partitions),
            history: TelemetryWindow::new(
                self.settings.history_capacity,
                self.settings.history_window,
            ),
            settings: self.settings.clone(),
        };
        self.worker = Some(tokio::spawn(worker.run(stop_rx)));
        self.stop_tx = Some(stop_tx);
        self.core.state().update(STATE_STATUS, "running");
        info!(
            "Resource controller '{}' initialized (period {:?})",
            self.core.name(),
            self.settings.sample_period
        );
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(worker) = self.worker.take() {
            if tokio::time::timeout(STOP_TIMEOUT, worker).await.is_err() {
                // The worker keeps the stop signal and will exit on its
                // own; shutdown never blocks past the window.
                let err = CoreError::StopTimeout {
                    service: self.core.name().to_string(),
                    waited_ms: STOP_TIMEOUT.as_millis() as u64,
                };
                warn!("{}", err);
            }
        }
        self.core.state().update(STATE_STATUS, "stopped");
    }
}

/// Owns everything the loop touches, so the controller handle and the
/// worker never share mutable state outside the store.
struct ControlWorker {
    service: String,
    state: StateStore,
    telemetry: Arc<dyn TelemetrySource>,
    partitions: Arc<dyn ResourcePartitionManager>,
    history: TelemetryWindow,
    settings: ControllerSettings,
}

impl ControlWorker {
    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        info!("Resource controller '{}' loop started", self.service);
        loop {
            if let Err(e) = self.run_cycle().await {
                warn!(
                    "Cycle failed in resource controller '{}': {:#} (continuing)",
                    self.service, e
                );
            }
            tokio::select! {
                _ = tokio::time::sleep(self.settings.sample_period) => {}
                changed = stop_rx.changed() => {
                    // A dropped sender counts as a stop request.
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Resource controller '{}' loop stopped", self.service);
    }

    /// One full pass: sample strictly before optimize. Cycles never
    /// overlap because the worker is a single sequential task.
    async fn run_cycle(&mut self) -> anyhow::Result<()> {
        self.sample().await?;
        self.optimize().await?;
        Ok(())
    }

    async fn sample(&mut self) -> anyhow::Result<()> {
        let throughput = self.telemetry.throughput_rate().await?;
        let memory = self.telemetry.memory_usage().await?.percent();

        self.history.push(TelemetrySample {
            timestamp: chrono::Utc::now(),
            throughput_rate: throughput,
            memory_percent: memory,
        });
        self.state.update(STATE_THROUGHPUT, throughput);
        self.state.update(STATE_MEMORY, memory);

        if memory > self.settings.memory_alert_percent
            || throughput < self.settings.throughput_floor
        {
            warn!(
                "Performance alert in '{}': throughput {:.2}, memory {:.2}%",
                self.service, throughput, memory
            );
        }
        Ok(())
    }

    async fn optimize(&mut self) -> anyhow::Result<()> {
        for partition in self.partitions.list_partitions().await? {
            let nearby = self
                .partitions
                .agents_near(partition.anchor, self.settings.agent_radius)
                .await?;
            if nearby == 0 {
                self.partitions.unload(&partition.id).await?;
                self.state.increment(STATE_UNLOADED);
                continue;
            }

            if partition.occupancy > self.settings.occupancy_limit {
                for class in AgentClass::ALL {
                    let cap = self.partitions.category_cap(&partition.id, class).await?;
                    self.partitions
                        .set_category_cap(&partition.id, class, (cap / 2).max(1))
                        .await?;
                }
                self.state.update(STATE_SPAWN_REDUCED, true);
            } else {
                for class in AgentClass::ALL {
                    self.partitions
                        .set_category_cap(&partition.id, class, class.default_cap())
                        .await?;
                }
                self.state.update(STATE_SPAWN_REDUCED, false);
            }
            self.state.update(STATE_OCCUPANCY, partition.occupancy);
        }

        // Re-check pressure after the partition pass; at most one
        // compaction per cycle.
        let memory = self.telemetry.memory_usage().await?.percent();
        if memory > self.settings.memory_alert_percent {
            info!(
                "Memory still at {:.2}% after optimize in '{}', forcing compaction",
                memory, self.service
            );
            self.partitions.compact().await?;
            self.state
                .update(STATE_LAST_COMPACTION, chrono::Utc::now().to_rfc3339());
        }
        Ok(())
    }
}
