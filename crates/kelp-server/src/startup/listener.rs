//! Listener manager
//!
//! Both ports are bound before anything is served: the gRPC port (HTTP port
//! plus 10000) first, then the HTTP port. If either bind fails the error is
//! returned and no listener runs; a port that was already bound is released
//! when its socket drops.

use std::{fmt::Display, net::SocketAddr, sync::Arc};

use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use kelp_common::{KelpError, Result};
use kelp_core::{FollowerOptions, FollowerServer};

use super::{ShutdownSignal, grpc::grpc_server, http::http_server};

/// Both listener sockets, bound but not yet serving
#[derive(Debug)]
pub struct ListenerManager {
    grpc: std::net::TcpListener,
    http: std::net::TcpListener,
}

impl ListenerManager {
    pub fn bind(options: &FollowerOptions) -> Result<Self> {
        let host = options.bind_host();
        let grpc_port = options.grpc_port()?;

        let grpc = bind_port(host, grpc_port)?;
        info!("gRPC listener bound on {}:{}", host, grpc_port);

        let http = bind_port(host, options.http_port)?;
        info!("HTTP listener bound on {}:{}", host, options.http_port);

        Ok(Self { grpc, http })
    }

    pub fn grpc_addr(&self) -> Option<SocketAddr> {
        self.grpc.local_addr().ok()
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http.local_addr().ok()
    }

    /// Start serving both surfaces until `shutdown` fires.
    pub fn start(
        self,
        server: Arc<FollowerServer>,
        shutdown: &ShutdownSignal,
    ) -> Result<RunningListeners> {
        let grpc_addr = self.grpc_addr();
        let http_addr = self.http_addr();

        let grpc = grpc_server(self.grpc, server.clone(), shutdown.subscribe())?;

        let http = match http_server(self.http, server) {
            Ok(http) => http,
            Err(e) => {
                // Take the gRPC listener down with us
                shutdown.shutdown();
                return Err(e);
            }
        };

        let handle = http.handle();
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = stop.recv().await;
            handle.stop(true).await;
        });

        Ok(RunningListeners {
            grpc,
            http: tokio::spawn(http),
            grpc_addr,
            http_addr,
            shutdown: shutdown.clone(),
        })
    }
}

/// Both listeners serving
pub struct RunningListeners {
    grpc: JoinHandle<std::result::Result<(), tonic::transport::Error>>,
    http: JoinHandle<std::io::Result<()>>,
    grpc_addr: Option<SocketAddr>,
    http_addr: Option<SocketAddr>,
    shutdown: ShutdownSignal,
}

impl RunningListeners {
    pub fn grpc_addr(&self) -> Option<SocketAddr> {
        self.grpc_addr
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Wait until either listener stops; the other one is then told to stop too.
    pub async fn wait(self) -> Result<()> {
        let RunningListeners {
            mut grpc,
            mut http,
            shutdown,
            ..
        } = self;

        let result = tokio::select! {
            joined = &mut grpc => listener_exit("gRPC", joined),
            joined = &mut http => listener_exit("HTTP", joined),
        };

        shutdown.shutdown();
        result
    }
}

fn listener_exit<E: Display>(
    name: &str,
    joined: std::result::Result<std::result::Result<(), E>, JoinError>,
) -> Result<()> {
    match joined {
        Ok(Ok(())) => {
            info!("{} listener stopped", name);
            Ok(())
        }
        Ok(Err(e)) => {
            error!("{} listener failed: {}", name, e);
            Err(KelpError::InternalError(format!("{} listener failed: {}", name, e)))
        }
        Err(e) => {
            error!("{} listener task aborted: {}", name, e);
            Err(KelpError::InternalError(format!("{} listener task aborted: {}", name, e)))
        }
    }
}

fn bind_port(host: &str, port: u16) -> Result<std::net::TcpListener> {
    let listener =
        std::net::TcpListener::bind((host, port)).map_err(|source| KelpError::Bind { port, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| KelpError::Bind { port, source })?;
    Ok(listener)
}
