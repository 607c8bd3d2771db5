//! Lookup API models
//!
//! Identifiers accepted by both transports, and the JSON shapes returned by the
//! plain HTTP endpoint. The gRPC shapes live in [`crate::grpc`]; conversions
//! between the two are provided here so handlers stay thin.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use kelp_common::{KelpError, Result};

use crate::grpc;

// Query parameter names
pub const VOLUME_ID: &str = "volumeId";
pub const FILE_ID: &str = "fileId";
pub const COLLECTION: &str = "collection";

// Client type announced on the leader stream
pub const CLIENT_TYPE_FOLLOWER: &str = "follower";

/// Logical volume identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(pub u32);

impl Display for VolumeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VolumeId {
    type Err = KelpError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u32>()
            .map(VolumeId)
            .map_err(|_| KelpError::InvalidFileId(s.to_string()))
    }
}

impl From<u32> for VolumeId {
    fn from(value: u32) -> Self {
        VolumeId(value)
    }
}

/// File identifier: `<volume id>,<needle key and cookie in hex>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileId {
    pub volume_id: VolumeId,
    pub key_cookie: String,
}

impl FromStr for FileId {
    type Err = KelpError;

    fn from_str(s: &str) -> Result<Self> {
        let (vid, key_cookie) = s
            .split_once(',')
            .ok_or_else(|| KelpError::InvalidFileId(s.to_string()))?;

        if key_cookie.is_empty() || !key_cookie.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KelpError::InvalidFileId(s.to_string()));
        }

        Ok(FileId {
            volume_id: vid
                .parse()
                .map_err(|_| KelpError::InvalidFileId(s.to_string()))?,
            key_cookie: key_cookie.to_string(),
        })
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.volume_id, self.key_cookie)
    }
}

/// Extract the volume id from either a bare volume id or a full file id.
pub fn parse_volume_or_file_id(id: &str) -> Result<VolumeId> {
    if id.contains(',') {
        id.parse::<FileId>().map(|fid| fid.volume_id)
    } else {
        id.parse()
    }
}

/// Physical location of a volume replica
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub url: String,
    pub public_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_center: String,
}

impl Location {
    pub fn new(url: impl Into<String>, public_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            public_url: public_url.into(),
            data_center: String::new(),
        }
    }
}

impl From<Location> for grpc::Location {
    fn from(value: Location) -> Self {
        grpc::Location {
            url: value.url,
            public_url: value.public_url,
            data_center: value.data_center,
        }
    }
}

impl From<grpc::Location> for Location {
    fn from(value: grpc::Location) -> Self {
        Location {
            url: value.url,
            public_url: value.public_url,
            data_center: value.data_center,
        }
    }
}

/// Query parameters of `/dir/lookup`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupParam {
    pub volume_id: Option<String>,
    pub file_id: Option<String>,
    pub collection: Option<String>,
}

impl LookupParam {
    /// The identifier to resolve; `fileId` wins when both are present.
    ///
    /// A `volumeId` carrying a comma is reduced to the part before it.
    pub fn volume_or_file_id(&self) -> Option<String> {
        if let Some(fid) = self.file_id.as_deref().filter(|s| !s.is_empty()) {
            return Some(fid.to_string());
        }

        self.volume_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|vid| vid.split(',').next().unwrap_or(vid).to_string())
    }
}

/// Outcome of resolving one identifier
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub volume_or_file_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResult {
    pub fn found(volume_or_file_id: impl Into<String>, locations: Vec<Location>) -> Self {
        Self {
            volume_or_file_id: volume_or_file_id.into(),
            locations,
            error: None,
        }
    }

    pub fn failed(volume_or_file_id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            volume_or_file_id: volume_or_file_id.into(),
            locations: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<LookupResult> for grpc::lookup_volume_response::VolumeIdLocation {
    fn from(value: LookupResult) -> Self {
        grpc::lookup_volume_response::VolumeIdLocation {
            volume_or_file_id: value.volume_or_file_id,
            locations: value.locations.into_iter().map(Into::into).collect(),
            error: value.error.unwrap_or_default(),
        }
    }
}

/// Body of `/cluster/status`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(rename = "IsLeader")]
    pub is_leader: bool,
    #[serde(rename = "Leader")]
    pub leader: String,
    #[serde(rename = "Peers")]
    pub peers: Vec<String>,
}
