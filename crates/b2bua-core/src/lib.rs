//! # RVoIP B2BUA core
//!
//! Dialog routing and call lifecycle control for a back-to-back user agent
//! that bridges calls through an rtpengine media relay.
//!
//! ## Overview
//!
//! Every call has two legs. The server leg is created from the inbound
//! INVITE; client legs are originated by the application. Both are kept in
//! [`DialogStore`]s so in-dialog requests can find them again:
//!
//! - [`DialogRouter`] matches ACK, BYE, INFO and re-INVITE to a leg, trying
//!   server legs first and client legs second
//! - [`CallLifecycle`] registers a new server leg, runs the application's
//!   [`CallHandler`], then hangs up under a bounded timeout
//! - [`B2bua`] ties both together behind one entry point per request kind
//!
//! SIP parsing, retransmissions and the relay wire protocol live outside this
//! crate, behind [`ServerTransaction`], [`DialogSignaling`] and
//! [`rvoip_rtpengine_core::RelayControl`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_b2bua_core::{handler_fn, B2bua, B2buaConfig, DialogSignaling};
//! use rvoip_rtpengine_core::RelayControl;
//!
//! fn wire(relay: Arc<dyn RelayControl>, signaling: Arc<dyn DialogSignaling>) -> B2bua {
//!     B2bua::builder(relay, signaling)
//!         .with_config(B2buaConfig::default())
//!         .with_handler(Arc::new(handler_fn(|dialog| async move {
//!             let _ = dialog.answer(dialog.media().local_sdp()).await;
//!             dialog.context().cancelled().await;
//!         })))
//!         .build()
//! }
//! ```

pub mod config;
pub mod dialog;
pub mod dtmf;
pub mod engine;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod request;
pub mod router;
pub mod store;

pub use config::{B2buaConfig, ConfigError, TransportConfig, DEFAULT_HOST, DEFAULT_SIP_PORT};
pub use dialog::{
    Dialog, DialogId, DialogIdDerivation, DialogMedia, DialogServices, DialogSide,
    DialogSignaling, DialogState,
};
pub use dtmf::{DtmfEvent, DEFAULT_DTMF_DURATION_MS};
pub use engine::{B2bua, B2buaBuilder};
pub use errors::{B2buaError, B2buaResult};
pub use lifecycle::{
    handler_fn, CallHandler, CallLifecycle, FnCallHandler, TeardownOutcome,
    UnimplementedCallHandler, DEFAULT_TEARDOWN_TIMEOUT,
};
pub use logging::{log_startup, parse_log_level, setup_logging, LoggingConfig, LoggingError};
pub use request::{
    InDialogRequest, ServerTransaction, SipMethod, SipResponse, StatusCode,
    DTMF_RELAY_CONTENT_TYPE, SDP_CONTENT_TYPE,
};
pub use router::{DialogMatcher, DialogRouter, MatchedDialog, RouteError};
pub use store::{DialogStore, MemoryDialogStore, StoreRegistration};
