//! Engine connection configuration
//!
//! The relay is reached either by IP address or by DNS name. Both may be
//! configured by mistake; the address then wins and a warning is logged.
//! With neither configured the relay is assumed on loopback.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default control port of the relay
pub const DEFAULT_ENGINE_PORT: u16 = 22222;

/// Control-channel transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineProtocol {
    Udp,
    Tcp,
}

impl fmt::Display for EngineProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// Settings used to reach the media relay's control channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Control protocol; UDP when unset
    pub protocol: Option<EngineProtocol>,
    /// Control port; [`DEFAULT_ENGINE_PORT`] when zero
    pub port: u16,
    /// Relay IP address
    pub address: Option<IpAddr>,
    /// Relay DNS name
    pub domain: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protocol: None,
            port: DEFAULT_ENGINE_PORT,
            address: None,
            domain: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol(mut self, protocol: EngineProtocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Settle defaults and selector precedence into a concrete target
    pub fn resolve(&self) -> EngineTarget {
        let protocol = match self.protocol {
            Some(protocol) => protocol,
            None => {
                warn!("Empty protocol, by default UDP added");
                EngineProtocol::Udp
            }
        };

        let port = if self.port == 0 { DEFAULT_ENGINE_PORT } else { self.port };

        let domain = self.domain.as_deref().map(str::trim).filter(|d| !d.is_empty());

        let endpoint = match (self.address, domain) {
            (Some(address), None) => EngineEndpoint::Address(address),
            (None, Some(domain)) => EngineEndpoint::Domain(domain.to_string()),
            (Some(address), Some(domain)) => {
                warn!(
                    %address,
                    domain,
                    "Domain and IP cannot be configured at the same time, using the IP"
                );
                EngineEndpoint::Address(address)
            }
            (None, None) => {
                warn!("Neither IP nor domain configured, using loopback");
                EngineEndpoint::Address(IpAddr::V4(Ipv4Addr::LOCALHOST))
            }
        };

        EngineTarget { protocol, port, endpoint }
    }
}

/// How the relay host is selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEndpoint {
    Address(IpAddr),
    Domain(String),
}

/// Fully resolved relay control endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineTarget {
    pub protocol: EngineProtocol,
    pub port: u16,
    pub endpoint: EngineEndpoint,
}

impl fmt::Display for EngineTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            EngineEndpoint::Address(IpAddr::V6(ip)) => {
                write!(f, "{}://[{}]:{}", self.protocol, ip, self.port)
            }
            EngineEndpoint::Address(ip) => write!(f, "{}://{}:{}", self.protocol, ip, self.port),
            EngineEndpoint::Domain(domain) => {
                write!(f, "{}://{}:{}", self.protocol, domain, self.port)
            }
        }
    }
}
