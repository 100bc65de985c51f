// src/health/context.rs
//
// Cancellable execution scope handed to every check. Cancellation is a
// watch channel flipped to `true`, the same signal the server uses for
// shutdown; a scope may also carry a deadline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnd {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for ScopeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeEnd::Cancelled => f.write_str("context cancelled"),
            ScopeEnd::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckContext {
    cancel_rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Cancels every scope derived from the context it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Turns the handle into a guard that cancels when dropped.
    pub fn cancel_on_drop(self) -> CancelOnDrop {
        CancelOnDrop(self)
    }
}

/// Cancels its scope when it goes out of scope, e.g. when a request future
/// is dropped because the client went away.
#[derive(Debug)]
pub struct CancelOnDrop(CancelHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl CheckContext {
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel_rx: rx,
            deadline: None,
        };
        (ctx, CancelHandle { tx: Arc::new(tx) })
    }

    /// A scope that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            cancel_rx: rx,
            deadline: None,
        }
    }

    /// Child scope ending at the earlier of the parent's deadline and
    /// `now + timeout`. Parent cancellation still applies.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancel_rx: self.cancel_rx.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check of whether the scope has already ended.
    pub fn ended(&self) -> Option<ScopeEnd> {
        if *self.cancel_rx.borrow() {
            return Some(ScopeEnd::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ScopeEnd::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn done(&self) -> ScopeEnd {
        let mut rx = self.cancel_rx.clone();
        let cancelled = async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Every handle is gone; nobody can cancel us any more.
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancelled => ScopeEnd::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ScopeEnd::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                ScopeEnd::Cancelled
            }
        }
    }
}

impl Default for CheckContext {
    fn default() -> Self {
        Self::background()
    }
}
