// Core data models for the follower
// Configuration fetched from the masters and the local startup options

use serde::{Deserialize, Serialize};

use kelp_api::grpc::GetMasterConfigurationResponse;
use kelp_common::{KelpError, Result, ServerAddress, grpc_port_for};

/// Cluster-wide settings obtained once from the masters.
///
/// Never re-fetched; lives for the whole process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfiguration {
    pub default_replication: String,
    pub volume_size_limit_mb: u32,
    pub volume_preallocate: bool,
}

/// One successful "get configuration" answer from a master
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterConfiguration {
    pub configuration: ClusterConfiguration,
    /// Leader reported by the answering master, if it knows one
    pub leader: Option<ServerAddress>,
}

impl From<GetMasterConfigurationResponse> for MasterConfiguration {
    fn from(value: GetMasterConfigurationResponse) -> Self {
        Self {
            configuration: ClusterConfiguration {
                default_replication: value.default_replication,
                volume_size_limit_mb: value.volume_size_limit_mb,
                volume_preallocate: value.volume_preallocate,
            },
            leader: value.leader.parse().ok(),
        }
    }
}

/// Local startup options, fixed before the service instance is assembled
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FollowerOptions {
    /// Plain HTTP port; the gRPC port is derived from it
    pub http_port: u16,
    /// Address to bind both listeners to; empty means all interfaces
    pub bind_address: String,
    /// Address advertised to clients and to the leader
    pub advertised_ip: String,
    /// Unused by a stateless follower, kept for the shared option shape
    pub meta_folder: String,
    non_voting: bool,
}

impl FollowerOptions {
    pub fn new(http_port: u16, bind_address: impl Into<String>, advertised_ip: impl Into<String>) -> Self {
        Self {
            http_port,
            bind_address: bind_address.into(),
            advertised_ip: advertised_ip.into(),
            meta_folder: String::new(),
            non_voting: true,
        }
    }

    pub fn with_meta_folder(mut self, meta_folder: impl Into<String>) -> Self {
        self.meta_folder = meta_folder.into();
        self
    }

    pub fn is_non_voting(&self) -> bool {
        self.non_voting
    }

    pub fn grpc_port(&self) -> Result<u16> {
        grpc_port_for(self.http_port).ok_or_else(|| {
            KelpError::ConfigError(format!(
                "port {} leaves no room for the gRPC port",
                self.http_port
            ))
        })
    }

    /// Host part used for binding; an empty bind address means all interfaces.
    pub fn bind_host(&self) -> &str {
        if self.bind_address.is_empty() {
            "0.0.0.0"
        } else {
            &self.bind_address
        }
    }

    /// `ip:port` this follower announces on the leader stream
    pub fn advertised_address(&self) -> String {
        format!("{}:{}", self.advertised_ip, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follower_options_ports() {
        let options = FollowerOptions::new(9334, "", "10.0.0.9");
        assert_eq!(options.grpc_port().unwrap(), 19334);
        assert_eq!(options.bind_host(), "0.0.0.0");
        assert_eq!(options.advertised_address(), "10.0.0.9:9334");
        assert!(options.is_non_voting());
    }

    #[test]
    fn test_follower_options_port_overflow() {
        let options = FollowerOptions::new(60000, "127.0.0.1", "127.0.0.1");
        assert!(options.grpc_port().is_err());
        assert_eq!(options.bind_host(), "127.0.0.1");
    }

    #[test]
    fn test_master_configuration_from_response() {
        let response = GetMasterConfigurationResponse {
            default_replication: "001".to_string(),
            volume_size_limit_mb: 30000,
            volume_preallocate: true,
            leader: "m2:9333".to_string(),
            ..Default::default()
        };

        let fetched = MasterConfiguration::from(response);
        assert_eq!(fetched.configuration.default_replication, "001");
        assert_eq!(fetched.configuration.volume_size_limit_mb, 30000);
        assert!(fetched.configuration.volume_preallocate);
        assert_eq!(fetched.leader.unwrap().to_string(), "m2:9333");
    }

    #[test]
    fn test_master_configuration_without_leader() {
        let fetched = MasterConfiguration::from(GetMasterConfigurationResponse::default());
        assert!(fetched.leader.is_none());
    }
}
