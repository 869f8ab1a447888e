//! Relay control channel contract
//!
//! The wire encoding of commands and the socket handling live outside this
//! crate. Callers only see whether the relay accepted a command and, for
//! offer/answer, the SDP it produced.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::command::RelayCommand;
use crate::errors::{RelayError, RelayResult};

/// Result field of a relay reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayOutcome {
    Ok,
    Error,
}

/// Reply returned by the relay for one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayReply {
    pub result: RelayOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl RelayReply {
    /// Successful reply, optionally carrying rewritten SDP
    pub fn ok(sdp: Option<String>) -> Self {
        Self {
            result: RelayOutcome::Ok,
            sdp,
            error_reason: None,
        }
    }

    /// Error reply with the relay's reason
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            result: RelayOutcome::Error,
            sdp: None,
            error_reason: Some(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == RelayOutcome::Ok
    }

    /// Turn an `error` reply into [`RelayError::Rejected`]
    pub fn into_result(self, command: &str) -> RelayResult<RelayReply> {
        match self.result {
            RelayOutcome::Ok => Ok(self),
            RelayOutcome::Error => Err(RelayError::rejected(
                command,
                self.error_reason.unwrap_or_else(|| "unknown".to_string()),
            )),
        }
    }
}

/// Control channel towards the media relay
#[async_trait]
pub trait RelayControl: Send + Sync {
    /// Deliver one command and return the relay's raw reply
    async fn send(&self, command: RelayCommand) -> RelayResult<RelayReply>;

    /// Deliver one command, treating an `error` reply as a failure
    async fn execute(&self, command: RelayCommand) -> RelayResult<RelayReply> {
        let action = command.action;
        let call_id = command.params.call_id.clone();
        debug!(%action, call_id = %call_id, "Sending relay command");

        let reply = self.send(command).await?;
        reply.into_result(action.as_str()).map_err(|e| {
            warn!(%action, call_id = %call_id, error = %e, "Relay command failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{BaseParams, RelayAction};
    use std::sync::Mutex;

    struct ScriptedRelay {
        reply: RelayReply,
        seen: Mutex<Vec<RelayCommand>>,
    }

    #[async_trait]
    impl RelayControl for ScriptedRelay {
        async fn send(&self, command: RelayCommand) -> RelayResult<RelayReply> {
            self.seen.lock().unwrap().push(command);
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_execute_maps_error_reply() {
        let relay = ScriptedRelay {
            reply: RelayReply::error("Unknown call-id"),
            seen: Mutex::new(Vec::new()),
        };
        let command = RelayCommand::bare(RelayAction::Delete, BaseParams::new("c1", "t1"));

        let err = tokio_test::block_on(relay.execute(command)).unwrap_err();
        assert_eq!(err, RelayError::rejected("delete", "Unknown call-id"));
        assert_eq!(relay.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_execute_passes_sdp_through() {
        let relay = ScriptedRelay {
            reply: RelayReply::ok(Some("v=0\r\n".to_string())),
            seen: Mutex::new(Vec::new()),
        };
        let command = RelayCommand::bare(RelayAction::Offer, BaseParams::new("c2", "t2"));

        let reply = tokio_test::block_on(relay.execute(command)).unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.sdp.as_deref(), Some("v=0\r\n"));
    }

    #[test]
    fn test_reply_deserializes_from_relay_dictionary() {
        let reply: RelayReply =
            serde_json::from_str(r#"{"result":"error","error-reason":"Incomplete message"}"#).unwrap();
        assert!(!reply.is_ok());
        assert_eq!(reply.error_reason.as_deref(), Some("Incomplete message"));
    }
}
