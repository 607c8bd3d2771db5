// Follower service instance
// Shared by the gRPC and HTTP listeners. Everything here is read-only after
// assembly except the current leader, which only the leader keeper writes.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use kelp_api::{ClusterStatus, Location, LookupResult, parse_volume_or_file_id};
use kelp_common::{PeerSet, Result, ServerAddress};

use crate::{
    lookup::LookupService,
    model::{ClusterConfiguration, FollowerOptions},
};

/// The non-voting service instance answering lookups
pub struct FollowerServer {
    configuration: ClusterConfiguration,
    options: FollowerOptions,
    peers: PeerSet,
    lookup: Arc<dyn LookupService>,
    current_leader: RwLock<Option<ServerAddress>>,
}

impl std::fmt::Debug for FollowerServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowerServer")
            .field("configuration", &self.configuration)
            .field("options", &self.options)
            .field("peers", &self.peers.to_string())
            .field("current_leader", &*self.current_leader.read())
            .finish()
    }
}

impl FollowerServer {
    pub fn new(
        configuration: ClusterConfiguration,
        options: FollowerOptions,
        peers: PeerSet,
        lookup: Arc<dyn LookupService>,
    ) -> Self {
        info!(
            replication = %configuration.default_replication,
            volume_size_limit_mb = configuration.volume_size_limit_mb,
            preallocate = configuration.volume_preallocate,
            masters = %peers,
            "assembled follower service"
        );

        Self {
            configuration,
            options,
            peers,
            lookup,
            current_leader: RwLock::new(None),
        }
    }

    /// Always true: a follower never takes part in leader election and never
    /// accepts topology writes.
    pub fn is_follower(&self) -> bool {
        self.options.is_non_voting()
    }

    pub fn configuration(&self) -> &ClusterConfiguration {
        &self.configuration
    }

    pub fn options(&self) -> &FollowerOptions {
        &self.options
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    /// Last leader the keeper connected to
    pub fn current_leader(&self) -> Option<ServerAddress> {
        self.current_leader.read().clone()
    }

    pub(crate) fn set_current_leader(&self, leader: ServerAddress) {
        let mut current = self.current_leader.write();
        if current.as_ref() != Some(&leader) {
            info!(leader = %leader, "current leader changed");
            *current = Some(leader);
        }
    }

    /// Locations of the volume named by a volume id or file id
    pub fn locate(&self, volume_or_file_id: &str) -> Result<Vec<Location>> {
        parse_volume_or_file_id(volume_or_file_id).and_then(|vid| self.lookup.lookup(vid))
    }

    /// Resolve one volume id or file id
    pub fn resolve(&self, volume_or_file_id: &str) -> LookupResult {
        match self.locate(volume_or_file_id) {
            Ok(locations) => LookupResult::found(volume_or_file_id, locations),
            Err(e) => LookupResult::failed(volume_or_file_id, e),
        }
    }

    /// Resolve a batch of ids, one result per id in request order
    pub fn resolve_all<S: AsRef<str>>(&self, ids: &[S]) -> Vec<LookupResult> {
        ids.iter().map(|id| self.resolve(id.as_ref())).collect()
    }

    pub fn cluster_status(&self) -> ClusterStatus {
        ClusterStatus {
            is_leader: false,
            leader: self
                .current_leader()
                .map(|l| l.to_string())
                .unwrap_or_default(),
            peers: self.peers.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    use kelp_api::VolumeId;

    use super::*;
    use crate::lookup::VidMap;

    fn follower(vid_map: Arc<VidMap>) -> FollowerServer {
        FollowerServer::new(
            ClusterConfiguration {
                default_replication: "000".to_string(),
                volume_size_limit_mb: 30000,
                volume_preallocate: false,
            },
            FollowerOptions::new(9334, "", "127.0.0.1"),
            PeerSet::parse("m1:9333,m2:9333").unwrap(),
            vid_map,
        )
    }

    #[test]
    fn test_assembled_follower_is_non_voting() {
        let server = follower(Arc::new(VidMap::new()));
        assert!(server.is_follower());
        assert_eq!(server.configuration().default_replication, "000");
        assert_eq!(server.configuration().volume_size_limit_mb, 30000);
        assert!(!server.configuration().volume_preallocate);
        assert_eq!(server.options().http_port, 9334);
        assert_eq!(server.options().grpc_port().unwrap(), 19334);
        assert!(server.current_leader().is_none());
    }

    #[test]
    fn test_resolve_volume_and_file_ids() {
        let vid_map = Arc::new(VidMap::new());
        vid_map.add_location(VolumeId(4), Location::new("10.0.0.1:8080", "vol:8080"));
        let server = follower(vid_map);

        let by_vid = server.resolve("4");
        assert!(by_vid.is_ok());
        assert_eq!(by_vid.locations[0].url, "10.0.0.1:8080");

        let by_fid = server.resolve("4,49c50924569199");
        assert_eq!(by_fid.volume_or_file_id, "4,49c50924569199");
        assert_eq!(by_fid.locations.len(), 1);

        let missing = server.resolve("5");
        assert!(missing.error.unwrap().contains("not found"));

        assert!(server.locate("5").unwrap_err().is_not_found());
        assert!(!server.locate("abc").unwrap_err().is_not_found());

        let malformed = server.resolve("abc");
        assert!(malformed.error.unwrap().contains("invalid"));

        let all = server.resolve_all(&["4", "5"]);
        assert_eq!(all.len(), 2);
        assert!(all[0].is_ok() && !all[1].is_ok());
    }

    #[test]
    fn test_cluster_status_reports_leader() {
        let server = follower(Arc::new(VidMap::new()));
        server.set_current_leader("m2:9333".parse().unwrap());

        let status = server.cluster_status();
        assert!(!status.is_leader);
        assert_eq!(status.leader, "m2:9333");
        assert_eq!(status.peers, vec!["m1:9333", "m2:9333"]);
    }

    #[test]
    fn test_concurrent_leader_reads_never_torn() {
        let server = Arc::new(follower(Arc::new(VidMap::new())));
        let written: Vec<ServerAddress> = (0..16)
            .map(|i| {
                ServerAddress::new(format!("leader-{}-{}", i, "x".repeat(i * 7)), 9000 + i as u16)
                    .unwrap()
            })
            .collect();
        let valid: HashSet<ServerAddress> = written.iter().cloned().collect();
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let server = server.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                for round in 0..20_000 {
                    server.set_current_leader(written[round % written.len()].clone());
                }
                stop.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let server = server.clone();
                let stop = stop.clone();
                let valid = valid.clone();
                thread::spawn(move || {
                    let mut observed = 0usize;
                    while !stop.load(Ordering::SeqCst) {
                        if let Some(leader) = server.current_leader() {
                            assert!(valid.contains(&leader), "torn leader {:?}", leader);
                            observed += 1;
                        }
                    }
                    observed
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(valid.contains(&server.current_leader().unwrap()));
    }
}
