pub mod builder;
pub mod handler;
pub mod heartbeat;
pub mod listener;

pub use builder::ServerBuilder;
pub use handler::HeartbeatHandler;
pub use heartbeat::{machine_name, HeartbeatError, HeartbeatResponse, HeartbeatService};
