//! Resource partitions — load regions with occupancy and per-class rate caps.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionId(pub String);

impl PartitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A subdivision of the managed environment. `anchor` is the reference
/// point activity checks are measured against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    pub anchor: Point,
    pub occupancy: usize,
}

/// Rate-capped agent classes. Default caps: 70 / 10 / 5 / 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentClass {
    Active,
    Passive,
    Transient,
    Ambient,
}

impl AgentClass {
    pub const ALL: [AgentClass; 4] = [
        AgentClass::Active,
        AgentClass::Passive,
        AgentClass::Transient,
        AgentClass::Ambient,
    ];

    pub fn default_cap(self) -> u32 {
        match self {
            AgentClass::Active => 70,
            AgentClass::Passive => 10,
            AgentClass::Transient => 5,
            AgentClass::Ambient => 15,
        }
    }
}

/// Host-side partition control. Implementations may block on storage or
/// network I/O; callers await them.
#[async_trait]
pub trait ResourcePartitionManager: Send + Sync {
    async fn list_partitions(&self) -> anyhow::Result<Vec<Partition>>;

    /// Number of agents within `radius` of `point`.
    async fn agents_near(&self, point: Point, radius: f64) -> anyhow::Result<usize>;

    async fn category_cap(&self, id: &PartitionId, class: AgentClass) -> anyhow::Result<u32>;

    async fn set_category_cap(
        &self,
        id: &PartitionId,
        class: AgentClass,
        cap: u32,
    ) -> anyhow::Result<()>;

    /// Drop an idle partition from memory.
    async fn unload(&self, id: &PartitionId) -> anyhow::Result<()>;

    /// Forced memory reclamation under sustained pressure.
    async fn compact(&self) -> anyhow::Result<()>;
}
