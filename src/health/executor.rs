// src/health/executor.rs
//
// Runs user-supplied checks with a deadline and panic containment. The check
// reports through a oneshot channel: sending never blocks and simply fails
// once the waiting side has given up, so a late result is dropped silently.

use super::check::{effective_timeout, millis, AsyncCheck, CheckFn, CheckResult};
use super::context::CheckContext;
use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::warn;

/// Runs a synchronous check on its own detached thread.
///
/// A check that overruns its deadline cannot be interrupted. It keeps its
/// thread until it returns and its result is discarded. The runtime's
/// blocking pool is not used, so a hung check never delays runtime shutdown
/// or the DNS lookups of URL checks.
pub async fn run_function(f: CheckFn, ctx: &CheckContext, timeout: Duration) -> CheckResult {
    let timeout = effective_timeout(timeout);
    let bounded = ctx.with_timeout(timeout);
    let (tx, rx) = oneshot::channel();
    let start = Instant::now();

    let spawned = thread::Builder::new()
        .name("heartbeat-check".to_string())
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| f())).unwrap_or_else(contained);
            let _ = tx.send(result);
        });

    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn check thread");
        return CheckResult::critical(format!("failed to start check: {}", e));
    }

    wait_for_result(rx, &bounded, timeout, start).await
}

/// Runs an async check on its own task. Unlike blocking checks, an overrunning
/// task is aborted once the wait is over.
pub async fn run_task(
    check: Arc<dyn AsyncCheck>,
    ctx: &CheckContext,
    timeout: Duration,
) -> CheckResult {
    let timeout = effective_timeout(timeout);
    let bounded = ctx.with_timeout(timeout);
    let (tx, rx) = oneshot::channel();
    let start = Instant::now();

    let handle = tokio::spawn(async move {
        let result = AssertUnwindSafe(check.check())
            .catch_unwind()
            .await
            .unwrap_or_else(contained);
        let _ = tx.send(result);
    });

    let result = wait_for_result(rx, &bounded, timeout, start).await;
    handle.abort();
    result
}

async fn wait_for_result(
    rx: oneshot::Receiver<CheckResult>,
    bounded: &CheckContext,
    timeout: Duration,
    start: Instant,
) -> CheckResult {
    tokio::select! {
        biased;
        _ = bounded.done() => {
            let mut result = CheckResult::critical(format!("timeout after {:?}", timeout));
            result.latency_ms = millis(start.elapsed());
            result
        }
        received = rx => match received {
            Ok(result) => result,
            // Only reachable if the unit was torn down before reporting.
            Err(_) => {
                let mut result = CheckResult::critical("check exited without reporting a result");
                result.latency_ms = millis(start.elapsed());
                result
            }
        },
    }
}

fn contained(payload: Box<dyn Any + Send>) -> CheckResult {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    warn!(panic = %detail, "dependency check panicked");
    CheckResult::critical(format!("panic recovered: {}", detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::status::Status;
    use async_trait::async_trait;

    #[tokio::test]
    async fn test_result_is_returned_verbatim() {
        let f: CheckFn = Arc::new(|| CheckResult {
            status: Status::OK,
            resource: "None".to_string(),
            latency_ms: 42.0,
            ..Default::default()
        });

        let result = run_function(f, &CheckContext::background(), Duration::ZERO).await;
        assert_eq!(result.status, Status::OK);
        assert_eq!(result.resource, "None");
        assert_eq!(result.latency_ms, 42.0);
    }

    #[tokio::test]
    async fn test_slow_function_times_out() {
        let f: CheckFn = Arc::new(|| {
            std::thread::sleep(Duration::from_millis(100));
            CheckResult::ok("late")
        });

        let ctx = CheckContext::background();
        let result = run_function(f, &ctx, Duration::from_millis(50)).await;
        assert_eq!(result.status, Status::Critical);
        assert!(result.message.contains("timeout after 50ms"), "{}", result.message);

        // Give the late result time to hit the closed channel.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let f: CheckFn = Arc::new(|| {
            let missing: Option<&str> = None;
            CheckResult::ok(missing.expect("connection handle"))
        });

        let result = run_function(f, &CheckContext::background(), Duration::ZERO).await;
        assert_eq!(result.status, Status::Critical);
        assert!(result.message.contains("panic"));
        assert!(result.message.contains("connection handle"));
    }

    struct Sleepy(Duration);

    #[async_trait]
    impl AsyncCheck for Sleepy {
        async fn check(&self) -> CheckResult {
            tokio::time::sleep(self.0).await;
            CheckResult::ok("awake")
        }
    }

    struct Exploding;

    #[async_trait]
    impl AsyncCheck for Exploding {
        async fn check(&self) -> CheckResult {
            panic!("broken invariant");
        }
    }

    #[tokio::test]
    async fn test_async_check_completes_and_times_out() {
        let ctx = CheckContext::background();

        let quick = Arc::new(Sleepy(Duration::from_millis(5)));
        let result = run_task(quick, &ctx, Duration::ZERO).await;
        assert_eq!(result.status, Status::OK);
        assert_eq!(result.message, "awake");

        let result = run_task(
            Arc::new(Sleepy(Duration::from_secs(5))),
            &ctx,
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(result.status, Status::Critical);
        assert_eq!(result.message, "timeout after 20ms");
    }

    #[tokio::test]
    async fn test_async_panic_is_contained() {
        let ctx = CheckContext::background();
        let result = run_task(Arc::new(Exploding), &ctx, Duration::ZERO).await;
        assert_eq!(result.status, Status::Critical);
        assert!(result.message.contains("panic recovered: broken invariant"));
    }

    #[tokio::test]
    async fn test_cancelled_scope_reports_configured_timeout() {
        let (ctx, handle) = CheckContext::new();
        handle.cancel();

        let f: CheckFn = Arc::new(|| CheckResult::ok("fine"));
        let result = run_function(f, &ctx, Duration::from_secs(30)).await;
        assert_eq!(result.status, Status::Critical);
        assert_eq!(result.message, "timeout after 30s");
    }

    #[tokio::test]
    async fn test_parent_deadline_caps_check_timeout() {
        let ctx = CheckContext::background().with_timeout(Duration::from_millis(1));

        let f: CheckFn = Arc::new(|| {
            std::thread::sleep(Duration::from_millis(50));
            CheckResult::ok("late")
        });
        let started = Instant::now();
        let result = run_function(f, &ctx, Duration::from_secs(30)).await;
        assert_eq!(result.status, Status::Critical);
        assert_eq!(result.message, "timeout after 30s");
        assert!(started.elapsed() < Duration::from_secs(5));

        let slow = Arc::new(Sleepy(Duration::from_secs(5)));
        let result = run_task(slow, &ctx, Duration::from_secs(30)).await;
        assert_eq!(result.status, Status::Critical);
        assert_eq!(result.message, "timeout after 30s");
    }

    #[test]
    fn test_hung_function_does_not_hold_runtime_shutdown() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();

        let result = rt.block_on(async {
            let f: CheckFn = Arc::new(|| {
                std::thread::sleep(Duration::from_secs(5));
                CheckResult::ok("late")
            });
            run_function(f, &CheckContext::background(), Duration::from_millis(50)).await
        });
        assert_eq!(result.message, "timeout after 50ms");

        let started = Instant::now();
        drop(rt);
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "runtime drop took {:?}",
            started.elapsed()
        );
    }
}
