// Volume location lookup
// The follower answers lookups from a local map that the leader keeps current.

use dashmap::DashMap;
use tracing::debug;

use kelp_api::{Location, VolumeId, grpc::VolumeLocation};
use kelp_common::{KelpError, Result};

/// Resolves a volume to the servers holding it
pub trait LookupService: Send + Sync {
    fn lookup(&self, volume_id: VolumeId) -> Result<Vec<Location>>;
}

/// In-memory volume id to locations map
#[derive(Debug, Default)]
pub struct VidMap {
    locations: DashMap<VolumeId, Vec<Location>>,
}

impl VidMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_location(&self, volume_id: VolumeId, location: Location) {
        let mut entry = self.locations.entry(volume_id).or_default();
        if !entry.iter().any(|l| l.url == location.url) {
            entry.push(location);
        }
    }

    pub fn delete_location(&self, volume_id: VolumeId, url: &str) {
        let now_empty = match self.locations.get_mut(&volume_id) {
            Some(mut entry) => {
                entry.retain(|l| l.url != url);
                entry.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.locations.remove_if(&volume_id, |_, v| v.is_empty());
        }
    }

    /// Apply one update pushed by the leader
    pub fn apply(&self, update: &VolumeLocation) {
        if update.url.is_empty() {
            return;
        }

        let location = Location {
            url: update.url.clone(),
            public_url: update.public_url.clone(),
            data_center: update.data_center.clone(),
        };

        for vid in &update.new_vids {
            self.add_location(VolumeId(*vid), location.clone());
        }
        for vid in &update.deleted_vids {
            self.delete_location(VolumeId(*vid), &update.url);
        }

        debug!(
            url = %update.url,
            added = update.new_vids.len(),
            deleted = update.deleted_vids.len(),
            "applied volume location update"
        );
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl LookupService for VidMap {
    fn lookup(&self, volume_id: VolumeId) -> Result<Vec<Location>> {
        self.locations
            .get(&volume_id)
            .map(|entry| entry.value().clone())
            .filter(|locations| !locations.is_empty())
            .ok_or_else(|| KelpError::VolumeNotFound(volume_id.to_string()))
    }
}
