//! Host telemetry — throughput and memory snapshots, bounded history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used: u64,
    pub max: u64,
}

impl MemoryUsage {
    /// Used memory as a 0–100 percentage. A zero-sized budget reads as 0.
    pub fn percent(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        self.used as f64 / self.max as f64 * 100.0
    }
}

/// Read-only snapshot of one sampling instant. Never persisted across
/// restarts; retention is the job of [`TelemetryWindow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub throughput_rate: f64,
    pub memory_percent: f64,
}

/// Current host metrics. Implementations may block on their own I/O;
/// callers await them rather than assuming they are instantaneous.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Processing-rate metric of the host (tick rate, ops/s, ...).
    async fn throughput_rate(&self) -> anyhow::Result<f64>;

    async fn memory_usage(&self) -> anyhow::Result<MemoryUsage>;
}

/// Ring buffer with a wall-clock window: `push` first ages out samples
/// older than `max_age`, then evicts the oldest once `capacity` is hit.
/// Sample history is bounded on both axes by construction.
#[derive(Debug)]
pub struct TelemetryWindow {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
    max_age: chrono::Duration,
}

impl TelemetryWindow {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            // An out-of-range window is effectively unbounded in age;
            // capacity still bounds the buffer.
            max_age: chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        if let Some(cutoff) = sample.timestamp.checked_sub_signed(self.max_age) {
            while matches!(self.samples.front(), Some(s) if s.timestamp < cutoff) {
                self.samples.pop_front();
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }
}
