//! Main entry point for the Kelp follower.
//!
//! Fetches the cluster configuration from the masters, then serves volume
//! lookups over gRPC (port + 10000) and HTTP (port) without ever voting.

use kelp_common::KelpError;
use kelp_server::{
    model::Configuration,
    startup::{self, ShutdownSignal},
};
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let _logging_guard =
        startup::init_logging("kelp-follower", &configuration.logging_config())?;

    let settings = configuration.launch_settings()?;
    info!(
        masters = %settings.peers,
        port = settings.options.http_port,
        "starting follower"
    );

    let shutdown = ShutdownSignal::new();
    startup::watch_os_signals(shutdown.clone());

    let follower = match startup::launch(settings, &shutdown).await {
        Ok(follower) => follower,
        Err(KelpError::Shutdown) => {
            info!("follower stopped before serving");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    follower.wait().await?;

    info!("follower shutdown complete");
    Ok(())
}
