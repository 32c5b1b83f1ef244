//! Relay server endpoints and round-robin selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::NetworkError;

/// Address family preference for DNS resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Any,
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::Ipv4 => addr.is_ipv4(),
            AddressFamily::Ipv6 => addr.is_ipv6(),
        }
    }
}

/// One `host:port` relay server endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub host: String,
    pub port: u16,
}

impl Gateway {
    /// Resolve to the first address of the preferred family
    pub fn resolve(&self, family: AddressFamily) -> Result<SocketAddr, NetworkError> {
        let resolve_err = |reason: String| NetworkError::Resolve {
            host: self.host.clone(),
            reason,
        };

        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| resolve_err(e.to_string()))?
            .find(|addr| family.accepts(addr))
            .ok_or_else(|| resolve_err(format!("no {:?} address", family)))
    }
}

impl FromStr for Gateway {
    type Err = NetworkError;

    /// Parses `host:port`; IPv6 literals are written `[addr]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidGateway(s.to_string());

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Fixed, ordered gateway list with a wrapping cursor
#[derive(Debug, Clone)]
pub struct GatewayCycle {
    gateways: Vec<Gateway>,
    cursor: usize,
}

impl GatewayCycle {
    pub fn new(gateways: Vec<Gateway>) -> Result<Self, NetworkError> {
        if gateways.is_empty() {
            return Err(NetworkError::InvalidGateway("empty gateway list".into()));
        }
        Ok(Self {
            gateways,
            cursor: 0,
        })
    }

    /// Parse every entry of a `host:port` list
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, NetworkError> {
        let gateways = entries
            .iter()
            .map(|e| e.as_ref().parse())
            .collect::<Result<Vec<Gateway>, _>>()?;
        Self::new(gateways)
    }

    /// Current candidate; advances the cursor
    pub fn next_gateway(&mut self) -> &Gateway {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.gateways.len();
        &self.gateways[index]
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}
