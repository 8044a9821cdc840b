//! Service and model configuration — typed records with per-field defaults.
//!
//! Missing sections never fail: the provider hands back documented defaults
//! and logs a warning. Config file loading and watching belong to the host;
//! the static provider only parses an already-loaded YAML document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{CoreError, Result};

// ── Service config ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Named model record this service reads parameters from. Carried as
    /// data only; no inference happens in this crate.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Free-form per-service parameters, handed to `initialize`.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_enabled() -> bool {
    true
}
fn default_model_name() -> String {
    "default".into()
}
fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_max_retries() -> u32 {
    3
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            model_name: default_model_name(),
            confidence_threshold: default_confidence_threshold(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            parameters: HashMap::new(),
            rate_limit: RateLimitConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    #[serde(default = "default_penalty_timeout_ms")]
    pub penalty_timeout_ms: u64,
}

fn default_requests_per_second() -> u32 {
    10
}
fn default_burst_size() -> u32 {
    20
}
fn default_penalty_timeout_ms() -> u64 {
    60_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            penalty_timeout_ms: default_penalty_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Metric names to record. Empty means record everything.
    #[serde(default)]
    pub tracked_metrics: Vec<String>,

    #[serde(default = "default_reporting_interval_ms")]
    pub reporting_interval_ms: u64,
}

fn default_reporting_interval_ms() -> u64 {
    60_000
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tracked_metrics: Vec::new(),
            reporting_interval_ms: default_reporting_interval_ms(),
        }
    }
}

// ── Model config ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_type")]
    pub model_type: String,

    #[serde(default = "default_model_version")]
    pub version: String,

    #[serde(default = "default_input_size")]
    pub input_size: usize,

    #[serde(default = "default_output_size")]
    pub output_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_layer_sizes")]
    pub layer_sizes: Vec<usize>,

    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

fn default_model_type() -> String {
    "default".into()
}
fn default_model_version() -> String {
    "1.0.0".into()
}
fn default_input_size() -> usize {
    10
}
fn default_output_size() -> usize {
    5
}
fn default_learning_rate() -> f64 {
    0.001
}
fn default_batch_size() -> usize {
    32
}
fn default_layer_sizes() -> Vec<usize> {
    vec![64, 32, 16]
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_type: default_model_type(),
            version: default_model_version(),
            input_size: default_input_size(),
            output_size: default_output_size(),
            learning_rate: default_learning_rate(),
            batch_size: default_batch_size(),
            layer_sizes: default_layer_sizes(),
            parameters: HashMap::new(),
        }
    }
}

// ── Global config ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Size of the shared task pool all services execute on.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

fn default_max_concurrent_tasks() -> usize {
    10
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub performance: PerformanceConfig,
}

// ── Provider ──

/// Supplies per-service and per-model configuration. A missing section
/// yields the documented defaults and a logged warning, never an error.
pub trait ConfigProvider: Send + Sync {
    fn service_config(&self, name: &str) -> ServiceConfig;
    fn model_config(&self, name: &str) -> ModelConfig;
    fn performance(&self) -> PerformanceConfig;
}

/// In-memory provider over a parsed config document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticConfigProvider {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,

    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a full config document with `global:` / `services:` /
    /// `models:` sections. Every field is optional.
    pub fn from_yaml_str(doc: &str) -> Result<Self> {
        let mut provider: StaticConfigProvider = serde_yaml::from_str(doc)
            .map_err(|e| CoreError::config(format!("failed to parse config document: {}", e)))?;
        provider.validate();
        Ok(provider)
    }

    pub fn with_service(mut self, name: &str, config: ServiceConfig) -> Self {
        self.services.insert(name.to_string(), config);
        self
    }

    pub fn with_model(mut self, name: &str, config: ModelConfig) -> Self {
        self.models.insert(name.to_string(), config);
        self
    }

    /// Cross-section checks: services referencing unknown models warn,
    /// a zero-sized pool falls back to the default.
    pub fn validate(&mut self) {
        for (name, service) in &self.services {
            if service.model_name != default_model_name()
                && !self.models.contains_key(&service.model_name)
            {
                warn!(
                    "Service '{}' references unknown model '{}'",
                    name, service.model_name
                );
            }
        }
        if self.global.performance.max_concurrent_tasks == 0 {
            warn!(
                "max_concurrent_tasks must be at least 1, using default ({})",
                default_max_concurrent_tasks()
            );
            self.global.performance.max_concurrent_tasks = default_max_concurrent_tasks();
        }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn service_config(&self, name: &str) -> ServiceConfig {
        match self.services.get(name) {
            Some(config) => config.clone(),
            None => {
                warn!("No config section for service '{}', using defaults", name);
                ServiceConfig::default()
            }
        }
    }

    fn model_config(&self, name: &str) -> ModelConfig {
        match self.models.get(name) {
            Some(config) => config.clone(),
            None => {
                warn!("No config section for model '{}', using defaults", name);
                ModelConfig::default()
            }
        }
    }

    fn performance(&self) -> PerformanceConfig {
        self.global.performance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_config_defaults() {
        let config = ServiceConfig::default();
        assert!(config.enabled);
        assert_eq!(config.model_name, "default");
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.max_retries, 3);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_second, 10);
        assert_eq!(config.metrics.reporting_interval_ms, 60_000);
    }

    #[test]
    fn test_parse_partial_document() {
        let provider = StaticConfigProvider::from_yaml_str(
            "services:\n  optimizer:\n    enabled: true\n    parameters:\n      sample_period_secs: 10\n",
        )
        .unwrap();

        let config = provider.service_config("optimizer");
        assert!(config.enabled);
        // Unspecified fields keep their defaults
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(
            config.parameters.get("sample_period_secs"),
            Some(&Value::from(10))
        );
    }

    #[test]
    fn test_missing_sections_yield_defaults() {
        let provider = StaticConfigProvider::new();
        let config = provider.service_config("anything");
        assert!(config.enabled);
        let model = provider.model_config("anything");
        assert_eq!(model.layer_sizes, vec![64, 32, 16]);
        assert_eq!(provider.performance().max_concurrent_tasks, 10);
    }

    #[test]
    fn test_validate_clamps_zero_pool() {
        let mut provider = StaticConfigProvider::from_yaml_str(
            "global:\n  performance:\n    max_concurrent_tasks: 0\n",
        )
        .unwrap();
        provider.validate();
        assert_eq!(provider.global.performance.max_concurrent_tasks, 10);
    }

    #[test]
    fn test_malformed_document_is_a_config_error() {
        let result = StaticConfigProvider::from_yaml_str("services: [not, a, map]");
        assert!(matches!(result, Err(CoreError::Config { .. })));
    }
}
