//! Leader connection keeper
//!
//! Runs for the life of the follower. It holds a `KeepConnected` stream open to
//! whichever master currently leads, feeds every pushed volume location into
//! the [`VidMap`], and records the leader on the [`FollowerServer`]. A master
//! that names a different leader redirects the keeper there.
//!
//! Losing the connection is never fatal: the keeper backs off (linearly, up
//! to a ceiling) and tries again, forever, until shutdown. Meanwhile the last
//! known leader stays visible and lookups keep working from the local map.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use kelp_common::{KelpError, Result, ServerAddress};

use crate::{
    bootstrap::{BackoffPolicy, capped_linear_backoff},
    lookup::VidMap,
    peer::PeerClient,
    server::FollowerServer,
};

/// Keeper configuration
#[derive(Clone, Debug)]
pub struct KeeperConfig {
    /// Backoff unit between reconnect attempts
    pub retry_unit: Duration,
    /// Upper bound for a single backoff
    pub retry_ceiling: Duration,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            retry_unit: Duration::from_secs(1),
            retry_ceiling: Duration::from_secs(10),
        }
    }
}

/// How one followed session ended
#[derive(Debug)]
enum SessionEnd {
    /// The master pointed at another leader
    Redirect {
        leader: ServerAddress,
        applied: bool,
    },
    /// The stream closed after we were connected
    Disconnected,
    /// The stream failed after we were connected
    Broken(KelpError),
}

/// Background task that follows the current leader
pub struct LeaderConnectionKeeper<C: PeerClient> {
    server: Arc<FollowerServer>,
    vid_map: Arc<VidMap>,
    client: C,
    backoff: BackoffPolicy,
    leader_hint: Option<ServerAddress>,
    cursor: usize,
}

impl<C: PeerClient> LeaderConnectionKeeper<C> {
    pub fn new(
        server: Arc<FollowerServer>,
        vid_map: Arc<VidMap>,
        client: C,
        config: &KeeperConfig,
    ) -> Self {
        Self {
            server,
            vid_map,
            client,
            backoff: capped_linear_backoff(config.retry_unit, config.retry_ceiling),
            leader_hint: None,
            cursor: 0,
        }
    }

    /// Try this address before walking the peer set
    pub fn with_leader_hint(mut self, leader: Option<ServerAddress>) -> Self {
        self.leader_hint = leader;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Follow the leader until `shutdown` fires.
    ///
    /// A redirect is followed at once, but only as many times in a row as there
    /// are peers without a single update being applied. Past that the masters
    /// are taken to disagree on the leader and the keeper backs off.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut failures = 0usize;
        let mut redirects = 0usize;

        loop {
            let target = self.next_target();

            let outcome = tokio::select! {
                _ = shutdown.recv() => break,
                outcome = self.follow(&target) => outcome,
            };

            match outcome {
                Ok(SessionEnd::Redirect { leader, applied }) => {
                    info!(from = %target, to = %leader, "redirected to new leader");
                    self.leader_hint = Some(leader);
                    redirects = if applied { 1 } else { redirects + 1 };
                    if redirects <= self.server.peers().len() {
                        failures = 0;
                        continue;
                    }
                    warn!(redirects, "masters disagree on the leader");
                    failures += 1;
                }
                Ok(SessionEnd::Disconnected) => {
                    warn!(leader = %target, "lost connection to leader");
                    redirects = 0;
                    failures = 1;
                }
                Ok(SessionEnd::Broken(e)) => {
                    warn!(leader = %target, "leader stream failed: {}", e);
                    redirects = 0;
                    failures = 1;
                }
                Err(e) => {
                    warn!(peer = %target, "failed to keep connected: {}", e);
                    failures += 1;
                }
            }

            let delay = (self.backoff)(failures - 1);
            debug!("reconnecting in {:?}", delay);
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("leader connection keeper stopped");
    }

    /// The leader hint if there is one, otherwise the next peer in rotation.
    fn next_target(&mut self) -> ServerAddress {
        if let Some(leader) = self.leader_hint.take() {
            return leader;
        }

        let members = self.server.peers().members();
        let target = members[self.cursor % members.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        target
    }

    /// One session with `target`. `Err` means no connection was established.
    async fn follow(&self, target: &ServerAddress) -> Result<SessionEnd> {
        let mut connection = self.client.connect(target).await?;
        let mut updates = self
            .client
            .keep_connected(&mut connection, &self.server.options().advertised_address())
            .await?;

        info!(leader = %target, "following leader");
        self.server.set_current_leader(target.clone());

        let mut applied = false;
        while let Some(update) = updates.next().await {
            let update = match update {
                Ok(update) => update,
                Err(e) => return Ok(SessionEnd::Broken(e)),
            };

            if !update.leader.is_empty() {
                match update.leader.parse::<ServerAddress>() {
                    Ok(leader) if leader != *target => {
                        return Ok(SessionEnd::Redirect { leader, applied });
                    }
                    Ok(_) => {}
                    Err(e) => warn!(peer = %target, "ignoring bad leader hint: {}", e),
                }
            }

            self.vid_map.apply(&update);
            applied = true;
        }

        Ok(SessionEnd::Disconnected)
    }
}
