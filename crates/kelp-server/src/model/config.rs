//! Configuration management for the Kelp follower
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `KELP_*` environment variables, then command line flags.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use config::{Config, ConfigError, Environment, File};

use kelp_common::{KelpError, PeerSet, Result, local_ip};
use kelp_core::{BackoffPolicy, FollowerOptions, KeeperConfig, PeerClientConfig, linear_backoff};

use crate::startup::{LaunchSettings, LoggingConfig};

pub const DEFAULT_HTTP_PORT: u16 = 9334;
pub const DEFAULT_MASTERS: &str = "localhost:9333";
pub const DEFAULT_CONFIG_FILE: &str = "conf/follower.yml";

pub const SERVER_PORT: &str = "server.port";
pub const SERVER_BIND: &str = "server.bind";
pub const SERVER_IP: &str = "server.ip";
pub const MASTERS: &str = "masters";
pub const META_FOLDER: &str = "meta.folder";
pub const PEER_CONNECT_TIMEOUT_MS: &str = "peer.connect_timeout_ms";
pub const PEER_REQUEST_TIMEOUT_MS: &str = "peer.request_timeout_ms";
pub const BOOTSTRAP_BACKOFF_UNIT_MS: &str = "bootstrap.backoff_unit_ms";
pub const KEEPER_RETRY_UNIT_MS: &str = "keeper.retry_unit_ms";
pub const KEEPER_RETRY_CEILING_MS: &str = "keeper.retry_ceiling_ms";
pub const LOGS_LEVEL: &str = "logs.level";
pub const LOGS_PATH: &str = "logs.path";

/// Command line arguments for the follower
#[derive(Debug, Default, Parser)]
#[command(name = "kelp-follower", version, about = "Non-voting lookup follower for a Kelp master cluster")]
pub struct Cli {
    /// HTTP listen port; gRPC listens on port + 10000
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
    /// Address both listeners bind to, all interfaces when empty
    #[arg(long = "ip-bind")]
    pub ip_bind: Option<String>,
    /// Comma separated master addresses, host:port or host:port.grpcPort
    #[arg(short = 'm', long = "masters")]
    pub masters: Option<String>,
    /// Address advertised to masters and clients
    #[arg(long = "ip")]
    pub ip: Option<String>,
    #[arg(long = "meta-folder")]
    pub meta_folder: Option<String>,
    /// Configuration file, defaults to conf/follower.yml when present
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

/// Application configuration loaded from defaults, file, environment and flags
#[derive(Clone, Debug)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Result<Self> {
        Self::build(cli).map_err(|e| KelpError::ConfigError(e.to_string()))
    }

    fn build(cli: Cli) -> std::result::Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = Config::builder()
            .set_default(SERVER_PORT, i64::from(DEFAULT_HTTP_PORT))?
            .set_default(SERVER_BIND, "")?
            .set_default(MASTERS, DEFAULT_MASTERS)?
            .set_default(META_FOLDER, "")?
            .set_default(PEER_CONNECT_TIMEOUT_MS, 5000)?
            .set_default(PEER_REQUEST_TIMEOUT_MS, 5000)?
            .set_default(BOOTSTRAP_BACKOFF_UNIT_MS, 1000)?
            .set_default(KEEPER_RETRY_UNIT_MS, 1000)?
            .set_default(KEEPER_RETRY_CEILING_MS, 10_000)?
            .set_default(LOGS_LEVEL, "info")?
            .add_source(file)
            .add_source(
                Environment::with_prefix("kelp")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(v) = cli.port {
            builder = builder.set_override(SERVER_PORT, i64::from(v))?;
        }
        if let Some(v) = cli.ip_bind {
            builder = builder.set_override(SERVER_BIND, v)?;
        }
        if let Some(v) = cli.masters {
            builder = builder.set_override(MASTERS, v)?;
        }
        if let Some(v) = cli.ip {
            builder = builder.set_override(SERVER_IP, v)?;
        }
        if let Some(v) = cli.meta_folder {
            builder = builder.set_override(META_FOLDER, v)?;
        }

        Ok(Configuration {
            config: builder.build()?,
        })
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_port(&self) -> Result<u16> {
        let port = self
            .config
            .get_int(SERVER_PORT)
            .unwrap_or(i64::from(DEFAULT_HTTP_PORT));
        u16::try_from(port)
            .map_err(|_| KelpError::ConfigError(format!("{} out of range: {}", SERVER_PORT, port)))
    }

    pub fn bind_address(&self) -> String {
        self.config.get_string(SERVER_BIND).unwrap_or_default()
    }

    /// Advertised address; detected from the local interfaces when unset
    pub fn advertised_ip(&self) -> String {
        self.config
            .get_string(SERVER_IP)
            .ok()
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(local_ip)
    }

    pub fn masters(&self) -> String {
        self.config
            .get_string(MASTERS)
            .unwrap_or(DEFAULT_MASTERS.to_string())
    }

    pub fn meta_folder(&self) -> String {
        self.config.get_string(META_FOLDER).unwrap_or_default()
    }

    pub fn follower_options(&self) -> Result<FollowerOptions> {
        let options = FollowerOptions::new(
            self.server_port()?,
            self.bind_address(),
            self.advertised_ip(),
        )
        .with_meta_folder(self.meta_folder());
        // Reject ports whose gRPC twin would overflow before anything starts
        options.grpc_port()?;
        Ok(options)
    }

    pub fn peer_set(&self) -> Result<PeerSet> {
        PeerSet::parse(&self.masters())
    }

    // ========================================================================
    // Peer Configuration
    // ========================================================================

    pub fn peer_client_config(&self) -> PeerClientConfig {
        PeerClientConfig {
            connect_timeout: self.millis(PEER_CONNECT_TIMEOUT_MS, 5000),
            request_timeout: self.millis(PEER_REQUEST_TIMEOUT_MS, 5000),
        }
    }

    pub fn bootstrap_backoff(&self) -> BackoffPolicy {
        linear_backoff(self.millis(BOOTSTRAP_BACKOFF_UNIT_MS, 1000))
    }

    pub fn keeper_config(&self) -> KeeperConfig {
        KeeperConfig {
            retry_unit: self.millis(KEEPER_RETRY_UNIT_MS, 1000),
            retry_ceiling: self.millis(KEEPER_RETRY_CEILING_MS, 10_000),
        }
    }

    pub fn launch_settings(&self) -> Result<LaunchSettings> {
        Ok(LaunchSettings {
            options: self.follower_options()?,
            peers: self.peer_set()?,
            peer_client: self.peer_client_config(),
            bootstrap_backoff: self.bootstrap_backoff(),
            keeper: self.keeper_config(),
        })
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self
                .config
                .get_string(LOGS_LEVEL)
                .unwrap_or("info".to_string()),
            log_dir: self
                .config
                .get_string(LOGS_PATH)
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        }
    }

    fn millis(&self, key: &str, default: u64) -> Duration {
        let value = self
            .config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default);
        Duration::from_millis(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["kelp-follower"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let configuration = Configuration::from_cli(Cli::default()).unwrap();

        let options = configuration.follower_options().unwrap();
        assert_eq!(options.http_port, 9334);
        assert_eq!(options.grpc_port().unwrap(), 19334);
        assert_eq!(options.bind_address, "");
        assert!(!options.advertised_ip.is_empty());

        let peers = configuration.peer_set().unwrap();
        assert_eq!(peers.to_string(), "localhost:9333");

        let keeper = configuration.keeper_config();
        assert_eq!(keeper.retry_unit, Duration::from_secs(1));
        assert_eq!(keeper.retry_ceiling, Duration::from_secs(10));

        let backoff = configuration.bootstrap_backoff();
        assert_eq!(backoff(0), Duration::from_secs(1));
        assert_eq!(backoff(8), Duration::from_secs(9));

        assert_eq!(configuration.logging_config().level, "info");
        assert!(configuration.logging_config().log_dir.is_none());
    }

    #[test]
    fn test_command_line_overrides() {
        let configuration = Configuration::from_cli(cli(&[
            "--port",
            "8080",
            "--ip-bind",
            "127.0.0.1",
            "--masters",
            "m1:9333, m2:9333.19999",
            "--ip",
            "10.1.2.3",
        ]))
        .unwrap();

        let options = configuration.follower_options().unwrap();
        assert_eq!(options.http_port, 8080);
        assert_eq!(options.grpc_port().unwrap(), 18080);
        assert_eq!(options.bind_host(), "127.0.0.1");
        assert_eq!(options.advertised_address(), "10.1.2.3:8080");

        let peers = configuration.peer_set().unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers.members()[1].grpc_port(), 19999);
    }

    #[test]
    fn test_port_without_room_for_grpc_is_rejected() {
        let configuration = Configuration::from_cli(cli(&["--port", "60000"])).unwrap();
        assert!(configuration.follower_options().is_err());
    }

    #[test]
    fn test_empty_masters_is_rejected() {
        let configuration = Configuration::from_cli(cli(&["--masters", " , "])).unwrap();
        assert!(matches!(
            configuration.peer_set(),
            Err(KelpError::EmptyPeerSet)
        ));
    }

    #[test]
    fn test_missing_explicit_config_file_fails() {
        let err = Configuration::from_cli(cli(&["--config", "/nonexistent/follower.yml"]))
            .err()
            .unwrap();
        assert!(matches!(err, KelpError::ConfigError(_)));
    }
}
