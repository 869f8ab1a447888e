//! Logging setup for B2BUA processes
//!
//! The library itself only emits `tracing` events. Binaries embedding the
//! B2BUA call [`setup_logging`] once at startup to install a subscriber.

use std::str::FromStr;

use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::B2buaConfig;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` does not say otherwise
    pub level: Level,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// Include file and line information
    pub file_info: bool,
    /// Log span open/close events
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Logging could not be initialized
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber described by `config`
///
/// Fails if a global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let result = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}

/// Log the version and what the B2BUA is about to listen on
pub fn log_startup(config: &B2buaConfig) {
    info!("Starting rvoip-b2bua v{}", env!("CARGO_PKG_VERSION"));

    for listener in config.effective_transports() {
        info!(
            transport = %listener.transport,
            bind = %format!("{}:{}", listener.bind_host, listener.bind_port),
            contact = %listener.contact_uri(),
            "SIP listener"
        );
    }

    let target = config.rtpengine.resolve();
    info!(%target, "Media relay");
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    Level::from_str(level.trim()).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}
