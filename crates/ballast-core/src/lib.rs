//! ballast-core — adaptive service runtime, no host bindings.
//!
//! A registry of named long-lived services with uniform lifecycle, shared
//! typed state, and bounded async task execution, plus the resource
//! controller: a periodic sampler that adjusts partition limits under
//! throughput and memory pressure. Hosts (command layers, config file
//! watchers, storage backends) plug in through the traits in `config`,
//! `telemetry`, and `partition`.

pub mod config;
pub mod controller;
pub mod error;
pub mod partition;
pub mod registry;
pub mod service;
pub mod state;
pub mod stats;
pub mod task;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testutil;
