//! Dialog router
//!
//! Decides which leg an in-dialog request belongs to. The router holds an
//! ordered list of matchers, each pairing an identifier derivation with the
//! store it is looked up in. Matchers are tried in order and the first hit
//! wins:
//!
//! ```text
//! request ─► Uas derivation ─► server store ─ hit ─► server leg
//!                                  │ miss
//!            Uac derivation ─► client store ─ hit ─► client leg
//!                                  │ miss
//!                               NotFound (481) / Malformed (400)
//! ```
//!
//! A re-INVITE reflected from the other side of the B2BUA therefore falls
//! through to the client store without any special casing.

use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::dialog::{Dialog, DialogId, DialogIdDerivation, DialogSide};
use crate::errors::B2buaError;
use crate::request::{InDialogRequest, StatusCode};
use crate::store::DialogStore;

/// One (derivation, store) pair of the routing order
#[derive(Clone)]
pub struct DialogMatcher {
    pub derivation: DialogIdDerivation,
    pub side: DialogSide,
    pub store: Arc<dyn DialogStore>,
}

impl DialogMatcher {
    pub fn new(derivation: DialogIdDerivation, side: DialogSide, store: Arc<dyn DialogStore>) -> Self {
        Self { derivation, side, store }
    }
}

/// Why a request could not be routed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No derivation could compute an identifier
    #[error("malformed dialog request: {reason}")]
    Malformed { reason: String },

    /// Identifiers were computed but none is stored
    #[error("dialog does not exist: {id}")]
    NotFound { id: DialogId },
}

impl RouteError {
    /// Status code to answer the unroutable request with
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Malformed { .. } => StatusCode::BadRequest,
            Self::NotFound { .. } => StatusCode::CallOrTransactionDoesNotExist,
        }
    }
}

impl From<RouteError> for B2buaError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::Malformed { reason } => B2buaError::MalformedDialogId { reason },
            RouteError::NotFound { id } => B2buaError::DialogNotFound { id },
        }
    }
}

/// A request matched to a live leg
#[derive(Debug, Clone)]
pub struct MatchedDialog {
    pub side: DialogSide,
    pub dialog: Arc<Dialog>,
}

/// Routes in-dialog requests to server or client legs
#[derive(Clone)]
pub struct DialogRouter {
    matchers: Vec<DialogMatcher>,
}

impl DialogRouter {
    /// Standard order: server legs by UAS derivation, then client legs by UAC derivation
    pub fn new(server_dialogs: Arc<dyn DialogStore>, client_dialogs: Arc<dyn DialogStore>) -> Self {
        Self::with_matchers(vec![
            DialogMatcher::new(DialogIdDerivation::Uas, DialogSide::Server, server_dialogs),
            DialogMatcher::new(DialogIdDerivation::Uac, DialogSide::Client, client_dialogs),
        ])
    }

    pub fn with_matchers(matchers: Vec<DialogMatcher>) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &[DialogMatcher] {
        &self.matchers
    }

    /// Match `request` against every leg
    pub fn route(&self, request: &InDialogRequest) -> Result<MatchedDialog, RouteError> {
        self.route_for(request, None)
    }

    /// Match `request` against legs of one side only
    pub fn route_side(
        &self,
        request: &InDialogRequest,
        side: DialogSide,
    ) -> Result<MatchedDialog, RouteError> {
        self.route_for(request, Some(side))
    }

    fn route_for(
        &self,
        request: &InDialogRequest,
        side: Option<DialogSide>,
    ) -> Result<MatchedDialog, RouteError> {
        let mut not_found = None;
        let mut malformed = None;

        for matcher in self.matchers.iter().filter(|m| side.map_or(true, |s| m.side == s)) {
            let id = match matcher.derivation.derive(request) {
                Ok(id) => id,
                Err(e) => {
                    malformed.get_or_insert_with(|| e.to_string());
                    continue;
                }
            };

            if let Some(dialog) = matcher.store.load(&id) {
                trace!(dialog_id = %id, side = %matcher.side, method = %request.method, "Matched dialog");
                return Ok(MatchedDialog {
                    side: matcher.side,
                    dialog,
                });
            }
            not_found.get_or_insert(id);
        }

        match (not_found, malformed) {
            (Some(id), _) => Err(RouteError::NotFound { id }),
            (None, Some(reason)) => Err(RouteError::Malformed { reason }),
            (None, None) => Err(RouteError::Malformed {
                reason: "no dialog matcher configured".to_string(),
            }),
        }
    }
}
