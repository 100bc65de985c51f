// src/health/mod.rs
mod aggregator;
mod check;
mod context;
mod executor;
mod prober;
mod status;

pub use aggregator::Aggregator;
pub use check::{
    AggregateResult, AsyncCheck, CheckDescriptor, CheckFn, CheckResult, CheckTarget,
    DEFAULT_TIMEOUT,
};
pub use context::{CancelHandle, CancelOnDrop, CheckContext, ScopeEnd};
pub use executor::{run_function, run_task};
pub use prober::{classify, UrlProber, SLOW_RESPONSE_THRESHOLD};
pub use status::{rank_label, ParseStatusError, Status};
