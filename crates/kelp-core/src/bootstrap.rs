//! Configuration bootstrap
//!
//! Before a follower serves anything it must learn the cluster configuration
//! from one of the masters. Any master may be down or mid-election, so the
//! bootstrapper walks the whole peer set once per round, takes the first
//! answer it gets, and backs off linearly between failed rounds. After
//! [`BOOTSTRAP_ROUNDS`] failed rounds the error is final.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use kelp_common::{KelpError, PeerSet, Result, ServerAddress};

use crate::{
    model::{ClusterConfiguration, MasterConfiguration},
    peer::PeerClient,
};

/// Maximum number of bootstrap rounds
pub const BOOTSTRAP_ROUNDS: usize = 10;

/// Delay to wait after the failed attempt with the given zero-based index
pub type BackoffPolicy = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

/// `unit * (attempt + 1)`: 1, 2, 3, ... units
pub fn linear_backoff(unit: Duration) -> BackoffPolicy {
    capped_linear_backoff(unit, Duration::MAX)
}

/// Linear backoff that never exceeds `ceiling`
pub fn capped_linear_backoff(unit: Duration, ceiling: Duration) -> BackoffPolicy {
    Arc::new(move |attempt: usize| {
        let factor = u32::try_from(attempt.saturating_add(1)).unwrap_or(u32::MAX);
        unit.saturating_mul(factor).min(ceiling)
    })
}

/// Result of a successful bootstrap
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bootstrapped {
    pub configuration: ClusterConfiguration,
    /// Leader reported by the answering master, used to seed the keeper
    pub leader: Option<ServerAddress>,
    /// The master that answered
    pub answered_by: ServerAddress,
    /// Zero-based round in which the answer arrived
    pub round: usize,
}

/// Fetches the cluster configuration from any one of the masters
pub struct ConfigBootstrapper<C: PeerClient> {
    client: C,
    peers: PeerSet,
    backoff: BackoffPolicy,
    rounds: usize,
}

impl<C: PeerClient> ConfigBootstrapper<C> {
    pub fn new(client: C, peers: PeerSet) -> Self {
        Self {
            client,
            peers,
            backoff: linear_backoff(Duration::from_secs(1)),
            rounds: BOOTSTRAP_ROUNDS,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    /// Run the bootstrap rounds until a master answers or the rounds run out.
    ///
    /// There is no sleep after the last round.
    pub async fn bootstrap(&self) -> Result<Bootstrapped> {
        let mut last_error = KelpError::EmptyPeerSet;

        for round in 0..self.rounds {
            match self.try_round().await {
                Ok((answered_by, fetched)) => {
                    info!(
                        peer = %answered_by,
                        round,
                        replication = %fetched.configuration.default_replication,
                        volume_size_limit_mb = fetched.configuration.volume_size_limit_mb,
                        "fetched cluster configuration"
                    );
                    return Ok(Bootstrapped {
                        configuration: fetched.configuration,
                        leader: fetched.leader,
                        answered_by,
                        round,
                    });
                }
                Err(e) => {
                    warn!("failed to talk to masters {}: {}", self.peers, e);
                    last_error = e;

                    if round + 1 < self.rounds {
                        let delay = (self.backoff)(round);
                        info!("wait for {:?} before round {} ...", delay, round + 2);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(KelpError::Bootstrap {
            peers: self.peers.to_string(),
            source: Box::new(last_error),
        })
    }

    /// Try each peer once, in order. The first one that accepts a connection and
    /// answers wins; a failing peer is skipped.
    async fn try_round(&self) -> Result<(ServerAddress, MasterConfiguration)> {
        let mut last_error = KelpError::EmptyPeerSet;

        for peer in &self.peers {
            let attempt = async {
                let mut connection = self.client.connect(peer).await?;
                self.client.get_configuration(&mut connection).await
            };

            match attempt.await {
                Ok(fetched) => return Ok((peer.clone(), fetched)),
                Err(e) => {
                    debug!(peer = %peer, "master did not answer: {}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
