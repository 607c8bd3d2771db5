//! Data models and configuration for the follower binary

pub mod config;

pub use config::{Cli, Configuration};
