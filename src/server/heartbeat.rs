// src/server/heartbeat.rs
use crate::config::Config;
use crate::health::{Aggregator, CheckContext, CheckDescriptor, CheckResult, Status, UrlProber};
use crate::metrics::MetricsCollector;
use chrono::{DateTime, Utc};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::System;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to encode heartbeat response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to build HTTP response: {0}")]
    Http(#[from] hyper::http::Error),
}

/// Body returned by the probe endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: Status,
    #[serde(default)]
    pub name: String,
    pub resource: String,
    #[serde(default)]
    pub machine: String,
    #[serde(rename = "utc_DateTime")]
    pub utc_date_time: DateTime<Utc>,
    pub request_duration_ms: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub dependencies: Vec<CheckResult>,
}

impl HeartbeatResponse {
    /// Warning still counts as operational; only Critical takes the service out.
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            Status::Critical => StatusCode::SERVICE_UNAVAILABLE,
            Status::NotSet | Status::OK | Status::Warning => StatusCode::OK,
        }
    }
}

impl fmt::Display for HeartbeatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Owns the dependency list for one service and answers heartbeat requests.
pub struct HeartbeatService {
    service_name: String,
    descriptors: Vec<CheckDescriptor>,
    aggregator: Aggregator,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HeartbeatService {
    pub fn new(
        service_name: impl Into<String>,
        descriptors: Vec<CheckDescriptor>,
    ) -> Result<Self, HeartbeatError> {
        Ok(Self {
            service_name: service_name.into(),
            descriptors,
            aggregator: Aggregator::new(UrlProber::new()?),
            metrics: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, HeartbeatError> {
        Self::new(config.service_name.clone(), config.descriptors())
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Registers an extra check, typically a function check that cannot be
    /// expressed in a config file.
    pub fn with_dependency(mut self, descriptor: CheckDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn dependencies(&self) -> &[CheckDescriptor] {
        &self.descriptors
    }

    pub async fn check(&self, ctx: &CheckContext) -> HeartbeatResponse {
        let started = Instant::now();
        let utc_date_time = Utc::now();
        let machine = machine_name();

        let aggregate = self.aggregator.check_all(&self.descriptors, ctx).await;
        let elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_dependencies(&aggregate);
            metrics.record_request(aggregate.overall_status, elapsed);
        }

        info!(
            service = %self.service_name,
            status = %aggregate.overall_status,
            dependencies = aggregate.results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "heartbeat checked"
        );

        HeartbeatResponse {
            status: aggregate.overall_status,
            name: String::new(),
            resource: self.service_name.clone(),
            machine,
            utc_date_time,
            request_duration_ms: elapsed.as_micros() as f64 / 1000.0,
            message: String::new(),
            dependencies: aggregate.results,
        }
    }
}

/// Host identity as reported by the OS, empty when it cannot be determined.
pub fn machine_name() -> String {
    System::host_name().unwrap_or_default()
}
