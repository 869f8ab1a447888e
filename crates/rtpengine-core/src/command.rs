//! Relay command model
//!
//! A [`RelayCommand`] is one request to the media relay: the action, the
//! identifying parameters of the call leg and the transport/security posture
//! the relay should apply to the SDP it rewrites.
//!
//! Every enum serializes to the token spelling the relay's control protocol
//! uses, so `serde_json::to_value(&command)` yields the same dictionary the
//! control channel would put on the wire. Encoding that dictionary is the
//! control channel's business, not this crate's.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Action requested from the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAction {
    /// Allocate a media path and rewrite an SDP offer
    Offer,
    /// Complete a media path and rewrite an SDP answer
    Answer,
    /// Release every media path of the call leg
    Delete,
}

impl RelayAction {
    /// Token used by the relay for this action
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for RelayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SDP transport protocol the relay writes into the `m=` lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportProtocol {
    #[serde(rename = "RTP/AVP")]
    RtpAvp,
    #[serde(rename = "RTP/SAVP")]
    RtpSavp,
    #[serde(rename = "UDP/TLS/RTP/SAVP")]
    UdpTlsRtpSavp,
    #[serde(rename = "UDP/TLS/RTP/SAVPF")]
    UdpTlsRtpSavpf,
}

impl TransportProtocol {
    /// SDP spelling of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RtpAvp => "RTP/AVP",
            Self::RtpSavp => "RTP/SAVP",
            Self::UdpTlsRtpSavp => "UDP/TLS/RTP/SAVP",
            Self::UdpTlsRtpSavpf => "UDP/TLS/RTP/SAVPF",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ICE handling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceMode {
    /// Strip ICE attributes from the SDP
    Remove,
    /// Generate ICE attributes even if the peer offered none
    Force,
}

/// DTLS-SRTP handling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsMode {
    Off,
    Passive,
    Active,
}

/// Relay behavior flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayFlag {
    #[serde(rename = "loop protect")]
    LoopProtect,
    #[serde(rename = "strict source")]
    StrictSource,
    #[serde(rename = "trust address")]
    TrustAddress,
    #[serde(rename = "trickle ICE")]
    TrickleIce,
    #[serde(rename = "unidirectional")]
    Unidirectional,
    #[serde(rename = "strip-extmap")]
    StripExtmap,
    #[serde(rename = "no-rtcp-attribute")]
    NoRtcpAttribute,
}

/// RTCP multiplexing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtcpMux {
    /// Split RTCP back onto its own port
    Demux,
    /// Offer rtcp-mux to the peer
    Offer,
}

/// SDES-SRTP key exchange policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sdes {
    Off,
    Pad,
}

/// Opportunistic SRTP policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Osrtp {
    Offer,
    Accept,
}

/// SDP fields the relay rewrites with its own values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Replace {
    SessionName,
    Origin,
}

/// Identifying parameters of a relay command
///
/// The caller fills in the call and leg identifiers and the SDP; the profile
/// builder owns `transport_protocol`, `ice` and `dtls` and overwrites them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BaseParams {
    pub call_id: String,
    pub from_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_protocol: Option<TransportProtocol>,
    #[serde(rename = "ICE", skip_serializing_if = "Option::is_none")]
    pub ice: Option<IceMode>,
    #[serde(rename = "DTLS", skip_serializing_if = "Option::is_none")]
    pub dtls: Option<DtlsMode>,
}

impl BaseParams {
    /// Create parameters for a call leg
    pub fn new(call_id: impl Into<String>, from_tag: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            from_tag: from_tag.into(),
            ..Default::default()
        }
    }

    pub fn with_to_tag(mut self, to_tag: impl Into<String>) -> Self {
        self.to_tag = Some(to_tag.into());
        self
    }

    pub fn with_via_branch(mut self, branch: impl Into<String>) -> Self {
        self.via_branch = Some(branch.into());
        self
    }

    pub fn with_sdp(mut self, sdp: impl Into<String>) -> Self {
        self.sdp = Some(sdp.into());
        self
    }

    /// Keep only the call and leg identifiers
    pub(crate) fn identifiers_only(mut self) -> Self {
        self.sdp = None;
        self.transport_protocol = None;
        self.ice = None;
        self.dtls = None;
        self
    }
}

/// A fully specified request to the media relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayCommand {
    #[serde(rename = "command")]
    pub action: RelayAction,
    #[serde(flatten)]
    pub params: BaseParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<RelayFlag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_mux: Vec<RtcpMux>,
    #[serde(rename = "SDES", default, skip_serializing_if = "Vec::is_empty")]
    pub sdes: Vec<Sdes>,
    #[serde(rename = "OSRTP", default, skip_serializing_if = "Vec::is_empty")]
    pub osrtp: Vec<Osrtp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replace: Vec<Replace>,
}

impl RelayCommand {
    /// A bare command carrying only the action and identifiers
    pub fn bare(action: RelayAction, params: BaseParams) -> Self {
        Self {
            action,
            params,
            flags: Vec::new(),
            rtcp_mux: Vec::new(),
            sdes: Vec::new(),
            osrtp: Vec::new(),
            replace: Vec::new(),
        }
    }

    pub fn has_flag(&self, flag: RelayFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Render the command as the relay's control dictionary
    pub fn to_json(&self) -> serde_json::Value {
        // Every field is a plain string, enum or list of those.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match_relay_spelling() {
        let mut command = RelayCommand::bare(
            RelayAction::Offer,
            BaseParams::new("call-1", "tag-a").with_sdp("v=0\r\n"),
        );
        command.params.transport_protocol = Some(TransportProtocol::UdpTlsRtpSavpf);
        command.params.ice = Some(IceMode::Force);
        command.params.dtls = Some(DtlsMode::Active);
        command.flags = vec![RelayFlag::LoopProtect, RelayFlag::TrickleIce];
        command.rtcp_mux = vec![RtcpMux::Offer];
        command.sdes = vec![Sdes::Pad];
        command.replace = vec![Replace::SessionName, Replace::Origin];

        let json = command.to_json();
        assert_eq!(json["command"], "offer");
        assert_eq!(json["call-id"], "call-1");
        assert_eq!(json["from-tag"], "tag-a");
        assert_eq!(json["transport-protocol"], "UDP/TLS/RTP/SAVPF");
        assert_eq!(json["ICE"], "force");
        assert_eq!(json["DTLS"], "active");
        assert_eq!(json["flags"], serde_json::json!(["loop protect", "trickle ICE"]));
        assert_eq!(json["rtcp-mux"], serde_json::json!(["offer"]));
        assert_eq!(json["SDES"], serde_json::json!(["pad"]));
        assert_eq!(json["replace"], serde_json::json!(["session-name", "origin"]));
        assert!(json.get("OSRTP").is_none());
        assert!(json.get("to-tag").is_none());
    }

    #[test]
    fn test_identifiers_only_drops_sdp_and_transport() {
        let mut params = BaseParams::new("call-2", "tag-b")
            .with_to_tag("tag-c")
            .with_sdp("v=0\r\n");
        params.ice = Some(IceMode::Remove);
        params.dtls = Some(DtlsMode::Off);
        params.transport_protocol = Some(TransportProtocol::RtpAvp);

        let stripped = params.identifiers_only();
        assert_eq!(stripped.call_id, "call-2");
        assert!(stripped.sdp.is_none());
        assert_eq!(stripped.to_tag.as_deref(), Some("tag-c"));
        assert!(stripped.ice.is_none());
        assert!(stripped.dtls.is_none());
        assert!(stripped.transport_protocol.is_none());
    }
}
