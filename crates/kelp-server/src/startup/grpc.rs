//! gRPC server setup

use std::sync::Arc;

use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tracing::info;

use kelp_api::grpc::master_server::MasterServer;
use kelp_common::{KelpError, Result};
use kelp_core::FollowerServer;

use crate::service::MasterService;

/// Serve the `master` contract on an already bound listener until shutdown.
pub fn grpc_server(
    listener: std::net::TcpListener,
    server: Arc<FollowerServer>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<JoinHandle<std::result::Result<(), tonic::transport::Error>>> {
    let port = listener.local_addr().map(|a| a.port()).unwrap_or_default();
    let listener = tokio::net::TcpListener::from_std(listener)
        .map_err(|source| KelpError::Bind { port, source })?;
    let incoming = TcpListenerStream::new(listener);

    info!("gRPC listener serving on port {}", port);

    Ok(tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(MasterServer::new(MasterService::new(server)))
            .serve_with_incoming_shutdown(incoming, async move {
                let _ = shutdown.recv().await;
            })
            .await
    }))
}
