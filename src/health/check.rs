// src/health/check.rs
use super::status::Status;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Applied whenever a descriptor's timeout is zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Synchronous user check. Runs on the blocking pool.
pub type CheckFn = Arc<dyn Fn() -> CheckResult + Send + Sync>;

/// Asynchronous user check, e.g. a database ping that already has an async client.
#[async_trait]
pub trait AsyncCheck: Send + Sync {
    async fn check(&self) -> CheckResult;
}

/// What a descriptor points at.
#[derive(Clone)]
pub enum CheckTarget {
    Url(String),
    Function(CheckFn),
    Task(Arc<dyn AsyncCheck>),
}

impl fmt::Debug for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckTarget::Url(url) => f.debug_tuple("Url").field(url).finish(),
            CheckTarget::Function(_) => f.write_str("Function(..)"),
            CheckTarget::Task(_) => f.write_str("Task(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckDescriptor {
    pub name: String,
    pub kind: String,
    pub target: CheckTarget,
    pub timeout: Duration,
}

impl CheckDescriptor {
    pub fn url(name: impl Into<String>, kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            target: CheckTarget::Url(url.into()),
            timeout: Duration::ZERO,
        }
    }

    pub fn function<F>(name: impl Into<String>, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> CheckResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: kind.into(),
            target: CheckTarget::Function(Arc::new(f)),
            timeout: Duration::ZERO,
        }
    }

    pub fn task<C>(name: impl Into<String>, kind: impl Into<String>, check: C) -> Self
    where
        C: AsyncCheck + 'static,
    {
        Self {
            name: name.into(),
            kind: kind.into(),
            target: CheckTarget::Task(Arc::new(check)),
            timeout: Duration::ZERO,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout to enforce, with zero mapped to [`DEFAULT_TIMEOUT`].
    pub fn effective_timeout(&self) -> Duration {
        effective_timeout(self.timeout)
    }
}

pub(crate) fn effective_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        DEFAULT_TIMEOUT
    } else {
        timeout
    }
}

/// Outcome of a single dependency check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: Status,
    #[serde(default)]
    pub name: String,
    pub resource: String,
    #[serde(rename = "request_duration_ms")]
    pub latency_ms: f64,
    #[serde(rename = "http_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub message: String,
}

impl CheckResult {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::OK, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Status::Warning, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Status::Critical, message)
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Worst-case status across a batch, plus every result in input order.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub overall_status: Status,
    pub results: Vec<CheckResult>,
}

pub(crate) fn millis(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64 / 1000.0
}
