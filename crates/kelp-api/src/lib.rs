//! Kelp API - gRPC and HTTP API definitions
//!
//! This crate provides:
//! - The `master` gRPC contract (generated from `proto/master.proto`)
//! - HTTP lookup request/response models
//! - Volume id and file id parsing

#[allow(clippy::all)]
pub mod grpc {
    tonic::include_proto!("master");
}

pub mod model;

// Re-export commonly used types
pub use model::*;
