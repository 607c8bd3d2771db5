// Peer client for talking to cluster masters
// Both the bootstrap loop and the leader keeper go through this capability, so
// tests can swap the gRPC transport for a scripted one.

use std::{pin::Pin, time::Duration};

use futures::{Stream, StreamExt, stream};
use tonic::transport::Channel;
use tracing::debug;

use kelp_api::{
    CLIENT_TYPE_FOLLOWER,
    grpc::{
        GetMasterConfigurationRequest, KeepConnectedRequest, VolumeLocation,
        master_client::MasterClient,
    },
};
use kelp_common::{KelpError, Result, ServerAddress};

use crate::model::MasterConfiguration;

/// Stream of volume location updates pushed by a master
pub type LocationStream = Pin<Box<dyn Stream<Item = Result<VolumeLocation>> + Send>>;

/// A way to reach cluster masters
#[async_trait::async_trait]
pub trait PeerClient: Send + Sync {
    type Connection: Send;

    /// Open a connection to `peer`
    async fn connect(&self, peer: &ServerAddress) -> Result<Self::Connection>;

    /// Ask the connected master for the cluster configuration
    async fn get_configuration(
        &self,
        connection: &mut Self::Connection,
    ) -> Result<MasterConfiguration>;

    /// Subscribe to the master's volume location stream
    async fn keep_connected(
        &self,
        connection: &mut Self::Connection,
        client_address: &str,
    ) -> Result<LocationStream>;
}

/// Configuration for the gRPC peer client
#[derive(Clone, Debug)]
pub struct PeerClientConfig {
    /// Connection timeout per attempt
    pub connect_timeout: Duration,
    /// Timeout for a unary request, or for a stream to be accepted
    pub request_timeout: Duration,
}

impl Default for PeerClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// A live gRPC connection to one master
pub struct GrpcConnection {
    pub peer: ServerAddress,
    client: MasterClient<Channel>,
}

/// Peer client speaking the `master` gRPC contract
#[derive(Clone, Debug, Default)]
pub struct GrpcPeerClient {
    config: PeerClientConfig,
}

impl GrpcPeerClient {
    pub fn new(config: PeerClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PeerClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl PeerClient for GrpcPeerClient {
    type Connection = GrpcConnection;

    async fn connect(&self, peer: &ServerAddress) -> Result<GrpcConnection> {
        debug!(peer = %peer, "connecting to master at {}", peer.grpc_uri());

        let channel = Channel::from_shared(peer.grpc_uri())
            .map_err(|e| KelpError::peer_request(peer, e))?
            .connect_timeout(self.config.connect_timeout)
            .connect()
            .await
            .map_err(|e| KelpError::peer_request(peer, e))?;

        Ok(GrpcConnection {
            peer: peer.clone(),
            client: MasterClient::new(channel),
        })
    }

    async fn get_configuration(
        &self,
        connection: &mut GrpcConnection,
    ) -> Result<MasterConfiguration> {
        let peer = connection.peer.clone();
        let call = connection
            .client
            .get_master_configuration(GetMasterConfigurationRequest {});

        let response = tokio::time::timeout(self.config.request_timeout, call)
            .await
            .map_err(|_| KelpError::peer_request(&peer, "get configuration timed out"))?
            .map_err(|status| {
                KelpError::peer_request(
                    &peer,
                    format!("get master configuration: {}", status.message()),
                )
            })?;

        Ok(response.into_inner().into())
    }

    async fn keep_connected(
        &self,
        connection: &mut GrpcConnection,
        client_address: &str,
    ) -> Result<LocationStream> {
        let peer = connection.peer.clone();
        let hello = KeepConnectedRequest {
            client_type: CLIENT_TYPE_FOLLOWER.to_string(),
            client_address: client_address.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        // The request half stays open for as long as we follow this master.
        let outbound = stream::once(async move { hello }).chain(stream::pending());

        let response = tokio::time::timeout(
            self.config.request_timeout,
            connection.client.keep_connected(outbound),
        )
        .await
        .map_err(|_| KelpError::peer_request(&peer, "keep connected timed out"))?
        .map_err(|status| KelpError::peer_request(&peer, status.message()))?;

        let inbound = response.into_inner().map(move |item| {
            item.map_err(|status| KelpError::peer_request(&peer, status.message()))
        });

        Ok(Box::pin(inbound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_client_config_default() {
        let config = PeerClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_peer_fails() {
        // Grab a free port and release it so nothing listens there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let peer = ServerAddress::new("127.0.0.1", 1)
            .unwrap()
            .with_grpc_port(port);

        let client = GrpcPeerClient::new(PeerClientConfig {
            connect_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_millis(500),
        });

        let err = client.connect(&peer).await.err().unwrap();
        assert!(matches!(err, KelpError::PeerRequest { .. }));
        assert!(err.to_string().contains("127.0.0.1:1."));
    }
}
