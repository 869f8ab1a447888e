//! Error types for rtpengine-core
//!
//! Every failure the relay layer can report is folded into [`RelayError`]. The
//! profile builder itself never fails; errors only come from transport-token
//! parsing and the control channel.

use thiserror::Error;

/// Result alias used throughout rtpengine-core
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors raised while configuring or talking to the media relay
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A SIP transport token did not name a known transport class
    #[error("Unknown transport class: {token}")]
    UnknownTransport { token: String },

    /// The relay answered the command with an error result
    #[error("Relay rejected {command} command: {reason}")]
    Rejected { command: String, reason: String },

    /// The control channel itself failed (socket, timeout, encoding)
    #[error("Relay transport error: {message}")]
    Transport { message: String },
}

impl RelayError {
    /// Create a control-channel transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Create a rejection error for the given command name
    pub fn rejected(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            command: command.into(),
            reason: reason.into(),
        }
    }
}
