//! Application startup utilities module.
//!
//! Logging, the two listeners and shutdown coordination.

mod follower;
mod grpc;
mod http;
mod listener;
mod logging;
mod shutdown;

pub use follower::{Follower, LaunchSettings, launch};
pub use grpc::grpc_server;
pub use http::http_server;
pub use listener::{ListenerManager, RunningListeners};
pub use logging::{LoggingConfig, LoggingGuard, get_subscriber, init_logging};
pub use shutdown::{ShutdownSignal, watch_os_signals};
