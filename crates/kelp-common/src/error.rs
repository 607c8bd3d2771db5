//! Error types for Kelp
//!
//! Startup failures (`Bootstrap`, `Bind`) are fatal to the process. Everything
//! else is contained by the caller: peer errors feed the retry loops and
//! lookup errors become per-request responses.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum KelpError {
    #[error("invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("peer set is empty")]
    EmptyPeerSet,

    #[error("failed to talk to masters {peers}: {source}")]
    Bootstrap {
        peers: String,
        #[source]
        source: Box<KelpError>,
    },

    #[error("failed to listen on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("peer {peer}: {message}")]
    PeerRequest { peer: String, message: String },

    #[error("volume id {0} not found")]
    VolumeNotFound(String),

    #[error("invalid volume or file id '{0}'")]
    InvalidFileId(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("shutdown requested")]
    Shutdown,
}

impl KelpError {
    pub fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        KelpError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    pub fn peer_request(peer: impl ToString, message: impl ToString) -> Self {
        KelpError::PeerRequest {
            peer: peer.to_string(),
            message: message.to_string(),
        }
    }

    /// True for errors a caller should report as "not found" rather than as a bad request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KelpError::VolumeNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, KelpError>;
