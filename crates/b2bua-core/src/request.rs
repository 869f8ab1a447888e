//! Signaling boundary types
//!
//! The transaction engine parses SIP and owns retransmissions. What reaches
//! this crate is an [`InDialogRequest`] carrying the few fields dialog
//! matching needs, plus a [`ServerTransaction`] to answer it through.

use std::fmt;

use async_trait::async_trait;

use rvoip_rtpengine_core::TransportClass;

use crate::errors::B2buaResult;

/// Content type of out-of-band DTMF carried in INFO requests
pub const DTMF_RELAY_CONTENT_TYPE: &str = "application/dtmf-relay";

/// Content type of SDP bodies
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

/// SIP methods handled by the B2BUA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SipMethod {
    Invite,
    Ack,
    Bye,
    Cancel,
    Info,
    Options,
}

impl fmt::Display for SipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invite => "INVITE",
            Self::Ack => "ACK",
            Self::Bye => "BYE",
            Self::Cancel => "CANCEL",
            Self::Info => "INFO",
            Self::Options => "OPTIONS",
        };
        f.write_str(name)
    }
}

/// Response status codes issued by the B2BUA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    NotAcceptable,
    TemporarilyUnavailable,
    CallOrTransactionDoesNotExist,
    ServerInternalError,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotAcceptable => 406,
            Self::TemporarilyUnavailable => 480,
            Self::CallOrTransactionDoesNotExist => 481,
            Self::ServerInternalError => 500,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotAcceptable => "Not Acceptable",
            Self::TemporarilyUnavailable => "Temporarily Unavailable",
            Self::CallOrTransactionDoesNotExist => "Call/Transaction Does Not Exist",
            Self::ServerInternalError => "Server Internal Error",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// Inbound request as delivered by the transaction engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InDialogRequest {
    pub method: SipMethod,
    pub call_id: Option<String>,
    pub from_tag: Option<String>,
    pub to_tag: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<String>,
    /// Transport the request arrived on
    pub transport: TransportClass,
}

impl InDialogRequest {
    pub fn new(method: SipMethod, call_id: impl Into<String>) -> Self {
        Self {
            method,
            call_id: Some(call_id.into()),
            from_tag: None,
            to_tag: None,
            content_type: None,
            body: None,
            transport: TransportClass::PlainUdp,
        }
    }

    pub fn with_from_tag(mut self, tag: impl Into<String>) -> Self {
        self.from_tag = Some(tag.into());
        self
    }

    pub fn with_to_tag(mut self, tag: impl Into<String>) -> Self {
        self.to_tag = Some(tag.into());
        self
    }

    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportClass) -> Self {
        self.transport = transport;
        self
    }

    /// Content-Type value without parameters, lowercased
    pub fn media_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
    }

    /// SDP body, when the request carries one
    pub fn sdp(&self) -> Option<&str> {
        match self.media_type().as_deref() {
            Some(SDP_CONTENT_TYPE) => self.body.as_deref().filter(|b| !b.trim().is_empty()),
            _ => None,
        }
    }
}

/// Response handed back to the transaction engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipResponse {
    pub status: StatusCode,
    pub reason: String,
    pub contact: Option<String>,
    pub sdp: Option<String>,
}

impl SipResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: status.reason_phrase().to_string(),
            contact: None,
            sdp: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_sdp(mut self, sdp: impl Into<String>) -> Self {
        self.sdp = Some(sdp.into());
        self
    }
}

/// Server transaction of an inbound request
#[async_trait]
pub trait ServerTransaction: Send + Sync {
    /// Send a final response for the request
    async fn respond(&self, response: SipResponse) -> B2buaResult<()>;
}
