//! Dialog legs of a B2BUA call
//!
//! This module contains the dialog identifier derivations, the [`Dialog`]
//! leg itself and its media session handle.

pub mod dialog_id;
pub mod dialog_impl;
pub mod media;

pub use dialog_id::{DialogId, DialogIdDerivation};
pub use dialog_impl::{Dialog, DialogServices, DialogSide, DialogSignaling, DialogState};
pub use media::DialogMedia;
