//! Shared test doubles — in-memory telemetry, partitions, and context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::StaticConfigProvider;
use crate::partition::{AgentClass, Partition, PartitionId, Point, ResourcePartitionManager};
use crate::service::ServiceContext;
use crate::telemetry::{MemoryUsage, TelemetrySource};

pub(crate) fn test_context(
    provider: StaticConfigProvider,
    telemetry: Arc<MockTelemetry>,
    partitions: Arc<MockPartitions>,
) -> ServiceContext {
    ServiceContext::new(Arc::new(provider), telemetry, partitions)
}

pub(crate) struct MockTelemetry {
    throughput: Mutex<f64>,
    memory_percent: Mutex<f64>,
    /// When set, the next throughput read fails once.
    pub fail_next: AtomicBool,
    pub reads: AtomicUsize,
}

impl MockTelemetry {
    pub fn new(throughput: f64, memory_percent: f64) -> Self {
        Self {
            throughput: Mutex::new(throughput),
            memory_percent: Mutex::new(memory_percent),
            fail_next: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TelemetrySource for MockTelemetry {
    async fn throughput_rate(&self) -> anyhow::Result<f64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("telemetry backend offline");
        }
        Ok(*self.throughput.lock().unwrap())
    }

    async fn memory_usage(&self) -> anyhow::Result<MemoryUsage> {
        let percent = *self.memory_percent.lock().unwrap();
        Ok(MemoryUsage {
            used: (percent * 100.0) as u64,
            max: 10_000,
        })
    }
}

#[derive(Default)]
pub(crate) struct MockPartitions {
    pub partitions: Mutex<Vec<Partition>>,
    caps: Mutex<HashMap<(PartitionId, AgentClass), u32>>,
    /// Agent counts keyed by the anchor's x coordinate.
    agents: Mutex<HashMap<i64, usize>>,
    pub unloaded: Mutex<Vec<PartitionId>>,
    pub compactions: AtomicUsize,
}

impl MockPartitions {
    pub fn add_partition(&self, id: &str, x: f64, occupancy: usize, agents_nearby: usize) {
        self.partitions.lock().unwrap().push(Partition {
            id: PartitionId::new(id),
            anchor: Point { x, y: 0.0, z: 0.0 },
            occupancy,
        });
        self.agents.lock().unwrap().insert(x as i64, agents_nearby);
    }

    pub fn cap(&self, id: &str, class: AgentClass) -> u32 {
        self.caps
            .lock()
            .unwrap()
            .get(&(PartitionId::new(id), class))
            .copied()
            .unwrap_or_else(|| class.default_cap())
    }

    pub fn set_cap_directly(&self, id: &str, class: AgentClass, cap: u32) {
        self.caps
            .lock()
            .unwrap()
            .insert((PartitionId::new(id), class), cap);
    }
}

#[async_trait]
impl ResourcePartitionManager for MockPartitions {
    async fn list_partitions(&self) -> anyhow::Result<Vec<Partition>> {
        Ok(self.partitions.lock().unwrap().clone())
    }

    async fn agents_near(&self, point: Point, _radius: f64) -> anyhow::Result<usize> {
        Ok(self
            .agents
            .lock()
            .unwrap()
            .get(&(point.x as i64))
            .copied()
            .unwrap_or(0))
    }

    async fn category_cap(&self, id: &PartitionId, class: AgentClass) -> anyhow::Result<u32> {
        Ok(self
            .caps
            .lock()
            .unwrap()
            .get(&(id.clone(), class))
            .copied()
            .unwrap_or_else(|| class.default_cap()))
    }

    async fn set_category_cap(
        &self,
        id: &PartitionId,
        class: AgentClass,
        cap: u32,
    ) -> anyhow::Result<()> {
        self.caps.lock().unwrap().insert((id.clone(), class), cap);
        Ok(())
    }

    async fn unload(&self, id: &PartitionId) -> anyhow::Result<()> {
        self.unloaded.lock().unwrap().push(id.clone());
        self.partitions.lock().unwrap().retain(|p| &p.id != id);
        Ok(())
    }

    async fn compact(&self) -> anyhow::Result<()> {
        self.compactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
