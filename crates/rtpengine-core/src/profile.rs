//! Media profile builder
//!
//! Maps a [`TransportClass`] onto the single relay posture that deployment
//! scenario uses:
//!
//! | Class | Protocol | ICE | DTLS | rtcp-mux | SDES | OSRTP | Flags |
//! |---|---|---|---|---|---|---|---|
//! | UDP | RTP/AVP | remove | off | demux | off | - | strip-extmap, no-rtcp-attribute |
//! | TCP | RTP/AVP | remove | off | demux | - | offer | loop protect, strict source |
//! | TLS | RTP/SAVP | remove | off | offer | - | accept | loop protect, trust address |
//! | WS | UDP/TLS/RTP/SAVP | force | passive | offer | pad | - | loop protect |
//! | WSS | UDP/TLS/RTP/SAVPF | force | active | offer | pad | - | loop protect, trickle ICE, trust address, strict source, unidirectional |
//!
//! Every profile also asks the relay to replace the SDP session name and origin.
//! The builders are plain functions over `const` data: no state, no I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{
    BaseParams, DtlsMode, IceMode, Osrtp, RelayAction, RelayCommand, RelayFlag, Replace, RtcpMux,
    Sdes, TransportProtocol,
};
use crate::errors::RelayError;

/// SDP fields rewritten by every profile
const REPLACE_ALL: &[Replace] = &[Replace::SessionName, Replace::Origin];

/// Deployment profile selecting the relay's security/ICE posture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportClass {
    /// Plain RTP towards a UDP trunk
    #[serde(rename = "udp")]
    PlainUdp,
    /// Plain RTP for TCP signaling behind NAT
    #[serde(rename = "tcp")]
    PlainTcp,
    /// SRTP for TLS-secured signaling
    Tls,
    /// WebRTC over WebSocket
    Ws,
    /// WebRTC over secure WebSocket
    Wss,
}

impl TransportClass {
    pub const ALL: [TransportClass; 5] = [
        TransportClass::PlainUdp,
        TransportClass::PlainTcp,
        TransportClass::Tls,
        TransportClass::Ws,
        TransportClass::Wss,
    ];

    /// The fixed relay posture of this class
    pub fn profile(&self) -> &'static MediaProfile {
        match self {
            Self::PlainUdp => &PLAIN_UDP,
            Self::PlainTcp => &PLAIN_TCP,
            Self::Tls => &TLS,
            Self::Ws => &WS,
            Self::Wss => &WSS,
        }
    }

    /// SIP transport token of this class
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainUdp => "udp",
            Self::PlainTcp => "tcp",
            Self::Tls => "tls",
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

impl fmt::Display for TransportClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportClass {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::PlainUdp),
            "tcp" => Ok(Self::PlainTcp),
            "tls" => Ok(Self::Tls),
            "ws" => Ok(Self::Ws),
            "wss" => Ok(Self::Wss),
            _ => Err(RelayError::UnknownTransport { token: s.to_string() }),
        }
    }
}

/// One row of the profile table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaProfile {
    pub transport_protocol: TransportProtocol,
    pub ice: IceMode,
    pub dtls: DtlsMode,
    pub rtcp_mux: &'static [RtcpMux],
    pub sdes: &'static [Sdes],
    pub osrtp: &'static [Osrtp],
    pub flags: &'static [RelayFlag],
}

const PLAIN_UDP: MediaProfile = MediaProfile {
    transport_protocol: TransportProtocol::RtpAvp,
    ice: IceMode::Remove,
    dtls: DtlsMode::Off,
    rtcp_mux: &[RtcpMux::Demux],
    sdes: &[Sdes::Off],
    osrtp: &[],
    flags: &[RelayFlag::StripExtmap, RelayFlag::NoRtcpAttribute],
};

const PLAIN_TCP: MediaProfile = MediaProfile {
    transport_protocol: TransportProtocol::RtpAvp,
    ice: IceMode::Remove,
    dtls: DtlsMode::Off,
    rtcp_mux: &[RtcpMux::Demux],
    sdes: &[],
    osrtp: &[Osrtp::Offer],
    flags: &[RelayFlag::LoopProtect, RelayFlag::StrictSource],
};

const TLS: MediaProfile = MediaProfile {
    transport_protocol: TransportProtocol::RtpSavp,
    ice: IceMode::Remove,
    dtls: DtlsMode::Off,
    rtcp_mux: &[RtcpMux::Offer],
    sdes: &[],
    osrtp: &[Osrtp::Accept],
    flags: &[RelayFlag::LoopProtect, RelayFlag::TrustAddress],
};

const WS: MediaProfile = MediaProfile {
    transport_protocol: TransportProtocol::UdpTlsRtpSavp,
    ice: IceMode::Force,
    dtls: DtlsMode::Passive,
    rtcp_mux: &[RtcpMux::Offer],
    sdes: &[Sdes::Pad],
    osrtp: &[],
    flags: &[RelayFlag::LoopProtect],
};

const WSS: MediaProfile = MediaProfile {
    transport_protocol: TransportProtocol::UdpTlsRtpSavpf,
    ice: IceMode::Force,
    dtls: DtlsMode::Active,
    rtcp_mux: &[RtcpMux::Offer],
    sdes: &[Sdes::Pad],
    osrtp: &[],
    flags: &[
        RelayFlag::LoopProtect,
        RelayFlag::TrickleIce,
        RelayFlag::TrustAddress,
        RelayFlag::StrictSource,
        RelayFlag::Unidirectional,
    ],
};

impl MediaProfile {
    /// Apply this profile to `params`, producing a complete command
    pub fn apply(&self, action: RelayAction, mut params: BaseParams) -> RelayCommand {
        params.transport_protocol = Some(self.transport_protocol);
        params.ice = Some(self.ice);
        params.dtls = Some(self.dtls);

        RelayCommand {
            action,
            params,
            flags: self.flags.to_vec(),
            rtcp_mux: self.rtcp_mux.to_vec(),
            sdes: self.sdes.to_vec(),
            osrtp: self.osrtp.to_vec(),
            replace: REPLACE_ALL.to_vec(),
        }
    }
}

/// Build an offer command for the given transport class
pub fn build_offer(class: TransportClass, params: BaseParams) -> RelayCommand {
    let profile = class.profile();
    info!(
        offer = %profile.transport_protocol,
        transport = %class,
        "Profile to offer a {} sdp protocol",
        class.as_str().to_ascii_uppercase()
    );
    profile.apply(RelayAction::Offer, params)
}

/// Build an answer command
///
/// Answers always use the plain UDP posture, whatever class the offer used.
pub fn build_answer(params: BaseParams) -> RelayCommand {
    let profile = TransportClass::PlainUdp.profile();
    info!(answer = %profile.transport_protocol, "Profile to answer a UDP sdp protocol");
    profile.apply(RelayAction::Answer, params)
}

/// Build a delete command carrying only the identifying parameters
pub fn build_delete(params: BaseParams) -> RelayCommand {
    RelayCommand::bare(RelayAction::Delete, params.identifiers_only())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseParams {
        BaseParams::new("a84b4c76e66710", "1928301774").with_sdp("v=0\r\n")
    }

    #[test]
    fn test_plain_tcp_offer() {
        let command = build_offer(TransportClass::PlainTcp, base());

        assert_eq!(command.action, RelayAction::Offer);
        assert_eq!(command.params.transport_protocol, Some(TransportProtocol::RtpAvp));
        assert_eq!(command.osrtp, vec![Osrtp::Offer]);
        assert_eq!(command.flags, vec![RelayFlag::LoopProtect, RelayFlag::StrictSource]);
        assert_eq!(command.rtcp_mux, vec![RtcpMux::Demux]);
        assert!(command.sdes.is_empty());
    }

    #[test]
    fn test_wss_offer_is_stable_across_calls() {
        // Interleave other classes to show no state leaks between builds
        let first = build_offer(TransportClass::Wss, base());
        let _ = build_offer(TransportClass::PlainUdp, base());
        let _ = build_answer(base());
        let second = build_offer(TransportClass::Wss, base());

        assert_eq!(first, second);
        assert_eq!(first.params.ice, Some(IceMode::Force));
        assert_eq!(first.params.dtls, Some(DtlsMode::Active));
        assert_eq!(first.rtcp_mux, vec![RtcpMux::Offer]);
        assert!(first.has_flag(RelayFlag::TrickleIce));
        assert!(first.has_flag(RelayFlag::Unidirectional));
    }

    #[test]
    fn test_every_class_replaces_session_name_and_origin() {
        for class in TransportClass::ALL {
            let command = build_offer(class, base());
            assert_eq!(command.replace, vec![Replace::SessionName, Replace::Origin], "{}", class);
            assert!(command.params.transport_protocol.is_some());
            assert!(command.params.ice.is_some());
            assert!(command.params.dtls.is_some());
        }
    }

    #[test]
    fn test_every_protocol_is_offered_by_some_class() {
        let offered: Vec<TransportProtocol> = TransportClass::ALL
            .iter()
            .map(|class| class.profile().transport_protocol)
            .collect();

        for protocol in [
            TransportProtocol::RtpAvp,
            TransportProtocol::RtpSavp,
            TransportProtocol::UdpTlsRtpSavp,
            TransportProtocol::UdpTlsRtpSavpf,
        ] {
            assert!(offered.contains(&protocol), "{}", protocol);
        }
    }

    #[test]
    fn test_transport_class_from_token() {
        assert_eq!("UDP".parse::<TransportClass>().unwrap(), TransportClass::PlainUdp);
        assert_eq!("tcp".parse::<TransportClass>().unwrap(), TransportClass::PlainTcp);
        assert_eq!(" wss ".parse::<TransportClass>().unwrap(), TransportClass::Wss);
        assert!(matches!(
            "sctp".parse::<TransportClass>(),
            Err(RelayError::UnknownTransport { .. })
        ));
    }
}
