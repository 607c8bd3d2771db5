// Shared helpers for follower integration tests
//
// A fake leader speaks the master contract on an ephemeral port so the
// follower can bootstrap and follow it without a real cluster.

#![allow(dead_code)]

use std::{pin::Pin, sync::Arc, time::Duration};

use futures::{Stream, StreamExt, stream};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status, Streaming};

use kelp_api::grpc::{
    GetMasterConfigurationRequest, GetMasterConfigurationResponse, KeepConnectedRequest,
    LookupVolumeRequest, LookupVolumeResponse, VolumeLocation,
    master_server::{Master, MasterServer},
};
use kelp_common::{PeerSet, ServerAddress};
use kelp_core::{FollowerOptions, KeeperConfig, PeerClientConfig};
use kelp_server::startup::LaunchSettings;

pub const REPLICATION: &str = "010";
pub const VOLUME_SIZE_LIMIT_MB: u32 = 30000;

/// Master that answers configuration requests and streams a fixed set of
/// volume locations to anyone who keeps connected.
#[derive(Clone)]
pub struct FakeLeader {
    address: String,
    updates: Arc<Vec<VolumeLocation>>,
}

#[tonic::async_trait]
impl Master for FakeLeader {
    async fn get_master_configuration(
        &self,
        _request: Request<GetMasterConfigurationRequest>,
    ) -> Result<Response<GetMasterConfigurationResponse>, Status> {
        Ok(Response::new(GetMasterConfigurationResponse {
            default_replication: REPLICATION.to_string(),
            volume_size_limit_mb: VOLUME_SIZE_LIMIT_MB,
            volume_preallocate: false,
            leader: self.address.clone(),
            ..Default::default()
        }))
    }

    async fn lookup_volume(
        &self,
        _request: Request<LookupVolumeRequest>,
    ) -> Result<Response<LookupVolumeResponse>, Status> {
        Ok(Response::new(LookupVolumeResponse::default()))
    }

    type KeepConnectedStream =
        Pin<Box<dyn Stream<Item = Result<VolumeLocation, Status>> + Send + 'static>>;

    async fn keep_connected(
        &self,
        request: Request<Streaming<KeepConnectedRequest>>,
    ) -> Result<Response<Self::KeepConnectedStream>, Status> {
        let mut inbound = request.into_inner();
        let hello = inbound
            .message()
            .await?
            .ok_or_else(|| Status::invalid_argument("missing hello"))?;
        if hello.client_type != "follower" {
            return Err(Status::invalid_argument("unexpected client type"));
        }

        let updates: Vec<_> = self.updates.iter().cloned().map(Ok).collect();
        Ok(Response::new(Box::pin(
            stream::iter(updates).chain(stream::pending()),
        )))
    }
}

/// A running fake leader
pub struct LeaderHandle {
    pub peer: ServerAddress,
    task: JoinHandle<()>,
}

impl Drop for LeaderHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a fake leader on an ephemeral gRPC port.
pub async fn start_leader(updates: Vec<VolumeLocation>) -> LeaderHandle {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let grpc_port = listener.local_addr().unwrap().port();
    let peer = ServerAddress::new("127.0.0.1", 9333)
        .unwrap()
        .with_grpc_port(grpc_port);

    let leader = FakeLeader {
        address: peer.to_string(),
        updates: Arc::new(updates),
    };
    let task = tokio::spawn(async move {
        let _ = tonic::transport::Server::builder()
            .add_service(MasterServer::new(leader))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });

    LeaderHandle { peer, task }
}

pub fn volume_location(url: &str, public_url: &str, new_vids: &[u32]) -> VolumeLocation {
    VolumeLocation {
        url: url.to_string(),
        public_url: public_url.to_string(),
        new_vids: new_vids.to_vec(),
        ..Default::default()
    }
}

/// A port P on 127.0.0.1 where both P and P + 10000 are currently free
pub fn free_port_pair() -> u16 {
    loop {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        if port > 55000 {
            continue;
        }
        if std::net::TcpListener::bind(("127.0.0.1", port + 10000)).is_ok() {
            return port;
        }
    }
}

/// A local port with nothing listening on it
pub fn dead_port() -> u16 {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().port()
}

pub fn settings(port: u16, peers: PeerSet) -> LaunchSettings {
    LaunchSettings {
        options: FollowerOptions::new(port, "127.0.0.1", "127.0.0.1"),
        peers,
        peer_client: PeerClientConfig {
            connect_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_secs(2),
        },
        bootstrap_backoff: Arc::new(|_: usize| Duration::from_millis(5)),
        keeper: KeeperConfig {
            retry_unit: Duration::from_millis(50),
            retry_ceiling: Duration::from_millis(200),
        },
    }
}

/// Poll `check` until it returns true or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
