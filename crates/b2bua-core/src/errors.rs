//! Error types for b2bua-core
//!
//! None of these escape the event entry points of [`crate::B2bua`]: each one
//! ends either in a SIP response or in a log line.

use thiserror::Error;

use rvoip_rtpengine_core::RelayError;

use crate::dialog::{DialogId, DialogState};

/// Result alias used throughout b2bua-core
pub type B2buaResult<T> = Result<T, B2buaError>;

#[derive(Error, Debug, Clone)]
pub enum B2buaError {
    /// A dialog identifier could not be derived from the request
    #[error("Cannot derive dialog id: {reason}")]
    MalformedDialogId { reason: String },

    /// Identifier derived, but no live dialog is stored under it
    #[error("Dialog does not exist: {id}")]
    DialogNotFound { id: DialogId },

    /// Request content could not be interpreted
    #[error("Malformed request: {message}")]
    MalformedRequest { message: String },

    /// Operation is not valid in the dialog's current state
    #[error("Invalid dialog state for {operation}: {state:?}")]
    InvalidState { operation: String, state: DialogState },

    /// The transaction layer failed to deliver a response
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Sending an in-dialog request (e.g. BYE) failed
    #[error("Signaling error: {message}")]
    Signaling { message: String },

    /// The media relay rejected or failed a command
    #[error("Media relay error: {0}")]
    Relay(#[from] RelayError),
}

impl B2buaError {
    pub fn malformed_dialog_id(reason: impl Into<String>) -> Self {
        Self::MalformedDialogId { reason: reason.into() }
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::MalformedRequest { message: message.into() }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction { message: message.into() }
    }

    pub fn signaling(message: impl Into<String>) -> Self {
        Self::Signaling { message: message.into() }
    }

    pub fn invalid_state(operation: impl Into<String>, state: DialogState) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state,
        }
    }
}
