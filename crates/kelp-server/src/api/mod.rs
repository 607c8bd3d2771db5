//! HTTP API handlers

pub mod cluster;
pub mod lookup;

use actix_web::web;

/// Register every follower endpoint on an app
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(lookup::dir_lookup)
        .service(cluster::cluster_status)
        .service(cluster::healthz);
}
