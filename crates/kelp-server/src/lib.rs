// Kelp follower - a non-voting lookup node for a Kelp master cluster
// The binary wires these modules together; tests drive them directly.

pub mod api; // HTTP handlers
pub mod model; // Configuration
pub mod service; // gRPC services
pub mod startup; // Listeners, logging and shutdown

pub use model::{Cli, Configuration};
