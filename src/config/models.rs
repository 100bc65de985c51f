// src/config/models.rs
use crate::health::CheckDescriptor;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Registered (non-privileged, non-ephemeral) port range.
pub const PORT_RANGE: RangeInclusive<u16> = 1024..=49151;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service_name: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    pub connection: String,
    /// Zero falls back to the ten second default.
    #[serde(default)]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing service name")]
    MissingServiceName,

    #[error("missing endpoint name")]
    MissingEndpoint,

    #[error(
        "invalid port number {0}, expected {min}..={max}",
        min = PORT_RANGE.start(),
        max = PORT_RANGE.end()
    )]
    InvalidPort(u16),

    #[error("dependency #{0} has no name")]
    UnnamedDependency(usize),

    #[error("dependency {0:?} has no connection")]
    MissingConnection(String),

    #[error("metrics port {0} collides with the heartbeat port")]
    MetricsPortCollision(u16),
}

fn default_endpoint() -> String {
    "heartbeat".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            endpoint: default_endpoint(),
            port: default_port(),
            dependencies: Vec::new(),
            metrics: MetricsConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::MissingServiceName);
        }
        if self.endpoint.trim_matches('/').is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if !PORT_RANGE.contains(&self.port) {
            return Err(ConfigError::InvalidPort(self.port));
        }
        for (i, dep) in self.dependencies.iter().enumerate() {
            if dep.name.trim().is_empty() {
                return Err(ConfigError::UnnamedDependency(i));
            }
            if dep.connection.trim().is_empty() {
                return Err(ConfigError::MissingConnection(dep.name.clone()));
            }
        }
        if self.metrics.enabled && self.metrics.port == self.port {
            return Err(ConfigError::MetricsPortCollision(self.metrics.port));
        }
        Ok(())
    }

    /// Request path the heartbeat is served on, always with one leading slash.
    pub fn endpoint_path(&self) -> String {
        format!("/{}", self.endpoint.trim_start_matches('/'))
    }

    pub fn descriptors(&self) -> Vec<CheckDescriptor> {
        self.dependencies.iter().map(CheckDescriptor::from).collect()
    }
}

impl From<&DependencyConfig> for CheckDescriptor {
    fn from(dep: &DependencyConfig) -> Self {
        CheckDescriptor::url(&dep.name, &dep.kind, &dep.connection)
            .with_timeout(Duration::from_millis(dep.timeout_ms))
    }
}
