//! Kelp Common - shared types for the lookup follower
//!
//! This crate provides:
//! - `KelpError`, the error taxonomy used by every other crate
//! - `ServerAddress` and `PeerSet` for naming cluster members
//! - Network helpers

pub mod address;
pub mod error;
pub mod utils;

pub use address::{GRPC_PORT_OFFSET, PeerSet, ServerAddress, grpc_port_for};
pub use error::{KelpError, Result};
pub use utils::local_ip;
