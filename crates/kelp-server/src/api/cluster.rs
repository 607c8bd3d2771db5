//! Cluster status endpoints
//!
//! - GET /cluster/status
//! - GET /cluster/healthz

use actix_web::{HttpResponse, Responder, get, web};

use kelp_core::FollowerServer;

/// Who this follower currently treats as leader, and the configured masters
#[get("/cluster/status")]
pub async fn cluster_status(data: web::Data<FollowerServer>) -> impl Responder {
    HttpResponse::Ok().json(data.cluster_status())
}

#[get("/cluster/healthz")]
pub async fn healthz() -> impl Responder {
    HttpResponse::Ok().finish()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};
    use kelp_common::PeerSet;
    use kelp_core::{ClusterConfiguration, FollowerOptions, VidMap};

    use super::*;

    #[actix_web::test]
    async fn test_cluster_status_before_any_leader() {
        let server = Arc::new(FollowerServer::new(
            ClusterConfiguration::default(),
            FollowerOptions::new(9334, "", "127.0.0.1"),
            PeerSet::parse("m1:9333,m2:9333.19999").unwrap(),
            Arc::new(VidMap::new()),
        ));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(server))
                .service(cluster_status)
                .service(healthz),
        )
        .await;

        let req = test::TestRequest::get().uri("/cluster/status").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["IsLeader"], false);
        assert_eq!(body["Leader"], "");
        assert_eq!(body["Peers"], serde_json::json!(["m1:9333", "m2:9333.19999"]));

        let req = test::TestRequest::get().uri("/cluster/healthz").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
