//! # RVoIP rtpengine core
//!
//! Command profiles and the control-channel contract for driving an external
//! media relay (rtpengine) from a B2BUA.
//!
//! ## Overview
//!
//! - [`command`]: the relay command model and its control-protocol tokens
//! - [`profile`]: the fixed transport-class → relay-posture table and the
//!   offer/answer/delete builders
//! - [`config`]: how to reach the relay (address or domain, protocol, port)
//! - [`client`]: the [`RelayControl`] trait implemented by the control channel
//!
//! ## Example
//!
//! ```rust
//! use rvoip_rtpengine_core::{build_offer, BaseParams, RelayFlag, TransportClass};
//!
//! let params = BaseParams::new("a84b4c76e66710", "1928301774").with_sdp("v=0\r\n");
//! let command = build_offer(TransportClass::Wss, params);
//!
//! assert!(command.has_flag(RelayFlag::TrickleIce));
//! assert_eq!(command.to_json()["transport-protocol"], "UDP/TLS/RTP/SAVPF");
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod errors;
pub mod profile;

pub use client::{RelayControl, RelayOutcome, RelayReply};
pub use command::{
    BaseParams, DtlsMode, IceMode, Osrtp, RelayAction, RelayCommand, RelayFlag, Replace, RtcpMux,
    Sdes, TransportProtocol,
};
pub use config::{EngineConfig, EngineEndpoint, EngineProtocol, EngineTarget, DEFAULT_ENGINE_PORT};
pub use errors::{RelayError, RelayResult};
pub use profile::{build_answer, build_delete, build_offer, MediaProfile, TransportClass};
