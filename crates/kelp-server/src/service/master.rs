// gRPC surface of the follower
// Serves the read-only part of the master contract from the local instance.

use std::{pin::Pin, sync::Arc};

use futures::Stream;
use tonic::{Request, Response, Status, Streaming};
use tracing::debug;

use kelp_api::grpc::{
    GetMasterConfigurationRequest, GetMasterConfigurationResponse, KeepConnectedRequest,
    LookupVolumeRequest, LookupVolumeResponse, VolumeLocation, master_server::Master,
};
use kelp_core::FollowerServer;

#[derive(Clone, Debug)]
pub struct MasterService {
    server: Arc<FollowerServer>,
}

impl MasterService {
    pub fn new(server: Arc<FollowerServer>) -> Self {
        Self { server }
    }
}

#[tonic::async_trait]
impl Master for MasterService {
    async fn get_master_configuration(
        &self,
        _request: Request<GetMasterConfigurationRequest>,
    ) -> Result<Response<GetMasterConfigurationResponse>, Status> {
        let configuration = self.server.configuration();

        Ok(Response::new(GetMasterConfigurationResponse {
            default_replication: configuration.default_replication.clone(),
            volume_size_limit_mb: configuration.volume_size_limit_mb,
            volume_preallocate: configuration.volume_preallocate,
            leader: self
                .server
                .current_leader()
                .map(|l| l.to_string())
                .unwrap_or_default(),
            ..Default::default()
        }))
    }

    async fn lookup_volume(
        &self,
        request: Request<LookupVolumeRequest>,
    ) -> Result<Response<LookupVolumeResponse>, Status> {
        let request = request.into_inner();
        debug!(ids = request.volume_or_file_ids.len(), "lookup volume");

        let volume_id_locations = self
            .server
            .resolve_all(&request.volume_or_file_ids)
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(Response::new(LookupVolumeResponse {
            volume_id_locations,
        }))
    }

    type KeepConnectedStream =
        Pin<Box<dyn Stream<Item = Result<VolumeLocation, Status>> + Send + 'static>>;

    async fn keep_connected(
        &self,
        _request: Request<Streaming<KeepConnectedRequest>>,
    ) -> Result<Response<Self::KeepConnectedStream>, Status> {
        Err(Status::failed_precondition(
            "a follower does not publish volume locations, connect to the leader",
        ))
    }
}

#[cfg(test)]
mod tests {
    use kelp_api::{Location, VolumeId};
    use kelp_common::PeerSet;
    use kelp_core::{ClusterConfiguration, FollowerOptions, VidMap};

    use super::*;

    fn service() -> MasterService {
        let vid_map = Arc::new(VidMap::new());
        vid_map.add_location(VolumeId(3), Location::new("10.0.0.1:8080", "vol1:8080"));

        MasterService::new(Arc::new(FollowerServer::new(
            ClusterConfiguration {
                default_replication: "001".to_string(),
                volume_size_limit_mb: 1024,
                volume_preallocate: true,
            },
            FollowerOptions::new(9334, "", "127.0.0.1"),
            PeerSet::parse("m1:9333").unwrap(),
            vid_map,
        )))
    }

    #[tokio::test]
    async fn test_get_master_configuration() {
        let response = service()
            .get_master_configuration(Request::new(GetMasterConfigurationRequest {}))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.default_replication, "001");
        assert_eq!(response.volume_size_limit_mb, 1024);
        assert!(response.volume_preallocate);
        assert_eq!(response.leader, "");
    }

    #[tokio::test]
    async fn test_lookup_volume_keeps_request_order() {
        let response = service()
            .lookup_volume(Request::new(LookupVolumeRequest {
                volume_or_file_ids: vec!["9".to_string(), "3,01637037d6".to_string()],
                collection: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();

        let entries = response.volume_id_locations;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].volume_or_file_id, "9");
        assert!(entries[0].error.contains("not found"));
        assert_eq!(entries[1].locations[0].url, "10.0.0.1:8080");
        assert_eq!(entries[1].locations[0].public_url, "vol1:8080");
        assert!(entries[1].error.is_empty());
    }
}
