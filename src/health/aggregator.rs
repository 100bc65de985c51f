// src/health/aggregator.rs
use super::check::{AggregateResult, CheckDescriptor, CheckResult, CheckTarget};
use super::context::CheckContext;
use super::executor;
use super::prober::UrlProber;
use super::status::Status;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// Fans a batch of descriptors out concurrently and reduces the results to
/// the worst status.
#[derive(Debug, Clone)]
pub struct Aggregator {
    prober: UrlProber,
}

impl Aggregator {
    pub fn new(prober: UrlProber) -> Self {
        Self { prober }
    }

    /// Checks every descriptor to completion, even once one is already
    /// Critical. `results[i]` always belongs to `descriptors[i]`.
    pub async fn check_all(
        &self,
        descriptors: &[CheckDescriptor],
        ctx: &CheckContext,
    ) -> AggregateResult {
        let overall = Arc::new(Mutex::new(Status::NotSet));
        let mut tasks = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let descriptor = descriptor.clone();
            let prober = self.prober.clone();
            let ctx = ctx.clone();
            let overall = overall.clone();

            let task = tokio::spawn(async move {
                let result = run_one(&prober, &descriptor, &ctx).await;
                raise(&overall, result.status);
                result
            });
            tasks.push(task);
        }

        // join_all yields in spawn order, which is the slot order.
        let joined = futures::future::join_all(tasks).await;

        let mut results = Vec::with_capacity(joined.len());
        for (descriptor, outcome) in descriptors.iter().zip(joined) {
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!(dependency = %descriptor.name, "check task failed: {}", e);
                    let failed = CheckResult::critical(format!("check task failed: {}", e));
                    let result = finish(descriptor, failed);
                    raise(&overall, result.status);
                    result
                }
            };
            results.push(result);
        }

        let overall_status = *overall.lock().unwrap_or_else(|e| e.into_inner());
        debug!(
            checks = results.len(),
            status = %overall_status,
            "dependency checks complete"
        );

        AggregateResult {
            overall_status,
            results,
        }
    }
}

async fn run_one(
    prober: &UrlProber,
    descriptor: &CheckDescriptor,
    ctx: &CheckContext,
) -> CheckResult {
    let timeout = descriptor.timeout;
    let result = match &descriptor.target {
        CheckTarget::Function(f) => executor::run_function(f.clone(), ctx, timeout).await,
        CheckTarget::Task(check) => executor::run_task(check.clone(), ctx, timeout).await,
        CheckTarget::Url(url) => prober.probe(url, ctx, timeout).await,
    };
    let result = finish(descriptor, result);

    if result.status == Status::Critical {
        warn!(
            dependency = %result.name,
            kind = %descriptor.kind,
            message = %result.message,
            "dependency is critical"
        );
    } else {
        debug!(
            dependency = %result.name,
            status = %result.status,
            latency_ms = result.latency_ms,
            "dependency checked"
        );
    }
    result
}

/// The descriptor owns naming; checks only fill in the rest.
fn finish(descriptor: &CheckDescriptor, mut result: CheckResult) -> CheckResult {
    result.name = descriptor.name.clone();
    if result.resource.is_empty() {
        result.resource = descriptor.name.clone();
    }
    result
}

fn raise(overall: &Mutex<Status>, status: Status) {
    let mut current = overall.lock().unwrap_or_else(|e| e.into_inner());
    if status > *current {
        *current = status;
    }
}
