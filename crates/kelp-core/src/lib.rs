//! Kelp Core - the non-voting lookup follower
//!
//! This crate provides:
//! - Configuration bootstrap from an unreliable set of masters
//! - The follower service instance shared by both transports
//! - Volume location tracking fed by the current leader
//! - The background task that keeps a leader connection alive

pub mod bootstrap;
pub mod keeper;
pub mod lookup;
pub mod model;
pub mod peer;
pub mod server;

// Re-export commonly used types
pub use bootstrap::{BackoffPolicy, Bootstrapped, ConfigBootstrapper, capped_linear_backoff, linear_backoff};
pub use keeper::{KeeperConfig, LeaderConnectionKeeper};
pub use lookup::{LookupService, VidMap};
pub use model::{ClusterConfiguration, FollowerOptions, MasterConfiguration};
pub use peer::{GrpcPeerClient, LocationStream, PeerClient, PeerClientConfig};
pub use server::FollowerServer;
