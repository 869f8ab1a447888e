//! B2BUA configuration
//!
//! Configuration can be built in code or loaded from TOML:
//!
//! ```toml
//! teardown_timeout_secs = 10
//!
//! [[transports]]
//! transport = "udp"
//! bind_host = "0.0.0.0"
//! bind_port = 5060
//! external_host = "203.0.113.10"
//! external_port = 5060
//!
//! [rtpengine]
//! protocol = "udp"
//! port = 22222
//! address = "127.0.0.1"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rvoip_rtpengine_core::{EngineConfig, TransportClass};

use crate::lifecycle::DEFAULT_TEARDOWN_TIMEOUT;

/// Default SIP listener port
pub const DEFAULT_SIP_PORT: u16 = 5060;

/// Default bind and advertised host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// One SIP listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub transport: TransportClass,
    pub bind_host: String,
    pub bind_port: u16,
    /// Host advertised in Contact; the bind host when unset
    #[serde(default)]
    pub external_host: Option<String>,
    /// Port advertised in Contact; the bind port when unset
    #[serde(default)]
    pub external_port: Option<u16>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transport: TransportClass::PlainUdp,
            bind_host: DEFAULT_HOST.to_string(),
            bind_port: DEFAULT_SIP_PORT,
            external_host: Some(DEFAULT_HOST.to_string()),
            external_port: Some(DEFAULT_SIP_PORT),
        }
    }
}

impl TransportConfig {
    pub fn new(transport: TransportClass, bind_host: impl Into<String>, bind_port: u16) -> Self {
        Self {
            transport,
            bind_host: bind_host.into(),
            bind_port,
            external_host: None,
            external_port: None,
        }
    }

    pub fn with_external(mut self, host: impl Into<String>, port: u16) -> Self {
        self.external_host = Some(host.into());
        self.external_port = Some(port);
        self
    }

    pub fn advertised_host(&self) -> &str {
        self.external_host.as_deref().unwrap_or(&self.bind_host)
    }

    pub fn advertised_port(&self) -> u16 {
        self.external_port.unwrap_or(self.bind_port)
    }

    /// Contact URI advertised for this listener
    pub fn contact_uri(&self) -> String {
        let scheme = match self.transport {
            TransportClass::Tls | TransportClass::Wss => "sips",
            _ => "sip",
        };
        let host = self.advertised_host();
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        format!(
            "<{}:{}:{};transport={}>",
            scheme,
            host,
            self.advertised_port(),
            self.transport
        )
    }
}

/// Top-level B2BUA configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct B2buaConfig {
    /// SIP listeners; a single UDP listener on 127.0.0.1:5060 when empty
    pub transports: Vec<TransportConfig>,
    /// Media relay connection
    pub rtpengine: EngineConfig,
    /// Bound on the BYE sent when a call handler returns
    pub teardown_timeout_secs: u64,
}

impl Default for B2buaConfig {
    fn default() -> Self {
        Self {
            transports: Vec::new(),
            rtpengine: EngineConfig::default(),
            teardown_timeout_secs: DEFAULT_TEARDOWN_TIMEOUT.as_secs(),
        }
    }
}

impl B2buaConfig {
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transports.push(transport);
        self
    }

    pub fn with_rtpengine(mut self, rtpengine: EngineConfig) -> Self {
        self.rtpengine = rtpengine;
        self
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout_secs = timeout.as_secs();
        self
    }

    /// Listeners in effect, falling back to the default UDP listener
    pub fn effective_transports(&self) -> Vec<TransportConfig> {
        if self.transports.is_empty() {
            vec![TransportConfig::default()]
        } else {
            self.transports.clone()
        }
    }

    /// Contact of the first listener, used in our responses
    pub fn contact_uri(&self) -> String {
        self.effective_transports()
            .first()
            .map(TransportConfig::contact_uri)
            .unwrap_or_default()
    }

    pub fn teardown_timeout(&self) -> Duration {
        if self.teardown_timeout_secs == 0 {
            DEFAULT_TEARDOWN_TIMEOUT
        } else {
            Duration::from_secs(self.teardown_timeout_secs)
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
