// Cluster member addresses
// A member is written as `host:port` or `host:port.grpcPort`; without an explicit
// gRPC port the member is reachable over gRPC at `port + GRPC_PORT_OFFSET`.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::error::{KelpError, Result};

/// Fixed distance between a node's plain HTTP port and its gRPC port.
pub const GRPC_PORT_OFFSET: u16 = 10000;

/// Returns the gRPC port paired with `port`, or `None` if it would not fit in a u16.
pub fn grpc_port_for(port: u16) -> Option<u16> {
    port.checked_add(GRPC_PORT_OFFSET)
}

/// Network address of one cluster member
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
    grpc_port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        let grpc_port = grpc_port_for(port).ok_or_else(|| {
            KelpError::invalid_address(
                &format!("{}:{}", host, port),
                "port leaves no room for the gRPC port",
            )
        })?;

        Ok(Self {
            host,
            port,
            grpc_port,
        })
    }

    pub fn with_grpc_port(mut self, grpc_port: u16) -> Self {
        self.grpc_port = grpc_port;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn grpc_port(&self) -> u16 {
        self.grpc_port
    }

    /// `host:port` of the plain HTTP endpoint
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `host:grpcPort` of the gRPC endpoint
    pub fn grpc_address(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }

    /// URI suitable for a tonic channel
    pub fn grpc_uri(&self) -> String {
        format!("http://{}", self.grpc_address())
    }

    fn has_default_grpc_port(&self) -> bool {
        grpc_port_for(self.port) == Some(self.grpc_port)
    }
}

impl Display for ServerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.has_default_grpc_port() {
            write!(f, "{}:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}.{}", self.host, self.port, self.grpc_port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = KelpError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, ports) = s
            .rsplit_once(':')
            .ok_or_else(|| KelpError::invalid_address(s, "expected host:port"))?;

        if host.is_empty() {
            return Err(KelpError::invalid_address(s, "missing host"));
        }

        let parse_port = |p: &str| {
            p.parse::<u16>()
                .map_err(|_| KelpError::invalid_address(s, format!("invalid port '{}'", p)))
        };

        match ports.split_once('.') {
            Some((port, grpc_port)) => {
                let port = parse_port(port)?;
                let grpc_port = parse_port(grpc_port)?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                    grpc_port,
                })
            }
            None => ServerAddress::new(host, parse_port(ports)?)
                .map_err(|_| KelpError::invalid_address(s, "port leaves no room for the gRPC port")),
        }
    }
}

/// Ordered, deduplicated, non-empty list of cluster members
///
/// No member is distinguished at construction time; the leader is learned later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerSet {
    members: Vec<ServerAddress>,
}

impl PeerSet {
    pub fn new(addresses: impl IntoIterator<Item = ServerAddress>) -> Result<Self> {
        let mut members: Vec<ServerAddress> = Vec::new();
        for address in addresses {
            if !members.contains(&address) {
                members.push(address);
            }
        }

        if members.is_empty() {
            return Err(KelpError::EmptyPeerSet);
        }

        Ok(Self { members })
    }

    /// Parse a comma separated member list, e.g. `127.0.0.1:9333,127.0.0.1:9334`
    pub fn parse(list: &str) -> Result<Self> {
        let addresses = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ServerAddress::from_str)
            .collect::<Result<Vec<_>>>()?;

        Self::new(addresses)
    }

    pub fn members(&self) -> &[ServerAddress] {
        &self.members
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServerAddress> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, address: &ServerAddress) -> bool {
        self.members.contains(address)
    }
}

impl Display for PeerSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .members
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}", joined)
    }
}

impl<'a> IntoIterator for &'a PeerSet {
    type Item = &'a ServerAddress;
    type IntoIter = std::slice::Iter<'a, ServerAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}
