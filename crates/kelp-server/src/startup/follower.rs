//! Follower launch sequence
//!
//! bootstrap configuration -> assemble the non-voting instance -> bind both
//! listeners -> start the leader keeper -> serve.
//!
//! Any error before serving is fatal and nothing keeps running. A shutdown
//! requested before serving ends the launch with `KelpError::Shutdown`.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use kelp_common::{KelpError, PeerSet, Result};
use kelp_core::{
    BackoffPolicy, ConfigBootstrapper, FollowerOptions, FollowerServer, GrpcPeerClient,
    KeeperConfig, LeaderConnectionKeeper, PeerClientConfig, VidMap,
};

use super::{ListenerManager, RunningListeners, ShutdownSignal};

/// Everything the launch sequence needs, resolved from configuration
#[derive(Clone)]
pub struct LaunchSettings {
    pub options: FollowerOptions,
    pub peers: PeerSet,
    pub peer_client: PeerClientConfig,
    pub bootstrap_backoff: BackoffPolicy,
    pub keeper: KeeperConfig,
}

/// A follower that is serving
pub struct Follower {
    server: Arc<FollowerServer>,
    listeners: RunningListeners,
    keeper: JoinHandle<()>,
}

impl Follower {
    pub fn server(&self) -> &Arc<FollowerServer> {
        &self.server
    }

    pub fn listeners(&self) -> &RunningListeners {
        &self.listeners
    }

    /// Serve until shutdown or until a listener dies.
    pub async fn wait(self) -> Result<()> {
        let result = self.listeners.wait().await;
        if let Err(e) = self.keeper.await {
            error!("leader keeper task aborted: {}", e);
        }
        result
    }
}

pub async fn launch(settings: LaunchSettings, shutdown: &ShutdownSignal) -> Result<Follower> {
    let LaunchSettings {
        options,
        peers,
        peer_client,
        bootstrap_backoff,
        keeper,
    } = settings;

    let client = GrpcPeerClient::new(peer_client);

    let bootstrapper =
        ConfigBootstrapper::new(client.clone(), peers.clone()).with_backoff(bootstrap_backoff);
    let mut stop = shutdown.subscribe();
    let bootstrapped = tokio::select! {
        biased;
        _ = stop.recv() => {
            info!("shutdown requested before the cluster configuration arrived");
            return Err(KelpError::Shutdown);
        }
        bootstrapped = bootstrapper.bootstrap() => bootstrapped
            .inspect_err(|e| error!("cannot start without cluster configuration: {}", e))?,
    };

    let vid_map = Arc::new(VidMap::new());
    let server = Arc::new(FollowerServer::new(
        bootstrapped.configuration,
        options.clone(),
        peers,
        vid_map.clone(),
    ));

    if shutdown.is_triggered() {
        return Err(KelpError::Shutdown);
    }

    let listeners = ListenerManager::bind(&options)
        .inspect_err(|e| error!("cannot start listeners: {}", e))?;

    let keeper = tokio::spawn(
        LeaderConnectionKeeper::new(server.clone(), vid_map, client, &keeper)
            .with_leader_hint(bootstrapped.leader)
            .run(shutdown.subscribe()),
    );

    let listeners = match listeners.start(server.clone(), shutdown) {
        Ok(listeners) => listeners,
        Err(e) => {
            error!("cannot start listeners: {}", e);
            shutdown.shutdown();
            return Err(e);
        }
    };

    info!(
        http = ?listeners.http_addr(),
        grpc = ?listeners.grpc_addr(),
        advertised = %options.advertised_address(),
        "follower started"
    );

    Ok(Follower {
        server,
        listeners,
        keeper,
    })
}
