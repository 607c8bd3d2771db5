//! Logging initialization
//!
//! Events are written as Bunyan JSON to stdout and, when a log directory is
//! configured, to a daily rolling `kelp-follower.log` as well.

use std::path::PathBuf;

use anyhow::anyhow;
use tracing::{Subscriber, subscriber::set_global_default};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, fmt::MakeWriter, layer::SubscriberExt};

pub const LOG_FILE_NAME: &str = "kelp-follower.log";

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
    /// Directory for the rolling log file; stdout only when `None`
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Keeps the non-blocking file writer alive; buffered lines are flushed on drop.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Creates a tracing subscriber with Bunyan JSON formatting.
pub fn get_subscriber(
    name: &str,
    env_filter: &str,
    sink: impl for<'a> MakeWriter<'a> + 'static + Send + Sync,
) -> impl Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    let formatting_layer = BunyanFormattingLayer::new(name.into(), sink);

    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init_logging(name: &str, config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(BunyanFormattingLayer::new(name.into(), writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(BunyanFormattingLayer::new(name.into(), std::io::stdout))
        .with(file_layer);

    LogTracer::init().map_err(|e| anyhow!("failed to set logger: {}", e))?;
    set_global_default(subscriber).map_err(|e| anyhow!("failed to set subscriber: {}", e))?;

    if let Some(dir) = &config.log_dir {
        tracing::info!("writing logs to {}", dir.join(LOG_FILE_NAME).display());
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
