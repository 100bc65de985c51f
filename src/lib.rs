// src/lib.rs
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;

pub use health::{
    AggregateResult, Aggregator, AsyncCheck, CheckContext, CheckDescriptor, CheckResult,
    CheckTarget, Status,
};
pub use server::{HeartbeatHandler, HeartbeatResponse, HeartbeatService};
