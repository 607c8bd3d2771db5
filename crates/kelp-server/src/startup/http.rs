//! HTTP server setup

use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};
use tracing::info;

use kelp_common::{KelpError, Result};
use kelp_core::FollowerServer;

use crate::api;

/// Seconds in-flight HTTP requests get to finish after shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Creates the HTTP server on an already bound listener.
///
/// Signal handling is left to the caller's shutdown signal.
pub fn http_server(listener: std::net::TcpListener, server: Arc<FollowerServer>) -> Result<Server> {
    let port = listener.local_addr().map(|a| a.port()).unwrap_or_default();

    let http = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(server.clone()))
            .configure(api::routes)
    })
    .disable_signals()
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    .listen(listener)
    .map_err(|source| KelpError::Bind { port, source })?
    .run();

    info!("HTTP listener serving on port {}", port);

    Ok(http)
}
