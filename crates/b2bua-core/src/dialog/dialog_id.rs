//! Dialog identifiers
//!
//! A dialog is keyed by its Call-ID and the tags of both parties. Which tag
//! comes first depends on the side the key is computed for, so the same
//! request yields two candidate keys: one in callee-originated (UAS) order and
//! one in caller-originated (UAC) order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{B2buaError, B2buaResult};
use crate::request::InDialogRequest;

const SEPARATOR: &str = "__";

/// Store key of a dialog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DialogId(String);

impl DialogId {
    /// Join Call-ID and both tags in the given order
    pub fn from_parts(call_id: &str, first_tag: &str, second_tag: &str) -> Self {
        Self(format!("{call_id}{SEPARATOR}{first_tag}{SEPARATOR}{second_tag}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DialogId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Field ordering used to derive a [`DialogId`] from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogIdDerivation {
    /// Call-ID, To tag, From tag: requests sent to us as the callee
    Uas,
    /// Call-ID, From tag, To tag: requests reaching a leg we originated
    Uac,
}

impl DialogIdDerivation {
    /// Compute the identifier for `request`
    ///
    /// Fails when the Call-ID or either tag is absent or empty.
    pub fn derive(&self, request: &InDialogRequest) -> B2buaResult<DialogId> {
        let call_id = required(request.call_id.as_deref(), "missing Call-ID")?;
        let from_tag = required(request.from_tag.as_deref(), "missing tag param in From header")?;
        let to_tag = required(request.to_tag.as_deref(), "missing tag param in To header")?;

        Ok(match self {
            Self::Uas => DialogId::from_parts(call_id, to_tag, from_tag),
            Self::Uac => DialogId::from_parts(call_id, from_tag, to_tag),
        })
    }
}

fn required<'a>(value: Option<&'a str>, reason: &str) -> B2buaResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(B2buaError::malformed_dialog_id(reason)),
    }
}
