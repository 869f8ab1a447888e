//! Dialog leg implementation
//!
//! A [`Dialog`] is one leg of a bridged call: the server leg created from an
//! inbound INVITE, or a client leg the B2BUA originated. In-dialog requests
//! that the router matches to a leg are handed to the `read_*`/`handle_*`
//! methods here.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rvoip_rtpengine_core::{
    build_answer, build_delete, build_offer, BaseParams, RelayCommand, RelayControl, RelayError,
    TransportClass,
};

use super::dialog_id::DialogId;
use super::media::DialogMedia;
use crate::dtmf::DtmfEvent;
use crate::errors::{B2buaError, B2buaResult};
use crate::request::{InDialogRequest, ServerTransaction, SipResponse, StatusCode};

/// Buffered DTMF events per dialog before new ones are dropped
const DTMF_CHANNEL_CAPACITY: usize = 32;

/// Which side of the B2BUA a leg sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogSide {
    /// Leg created from an inbound INVITE (we are UAS)
    Server,
    /// Leg originated by the B2BUA (we are UAC)
    Client,
}

impl fmt::Display for DialogSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Client => f.write_str("client"),
        }
    }
}

/// Lifecycle state of a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogState {
    New,
    Active,
    Terminating,
    Closed,
}

/// Outbound half of the transaction engine
#[async_trait]
pub trait DialogSignaling: Send + Sync {
    /// Send BYE within `dialog` and wait for its final response
    async fn send_bye(&self, dialog: &Dialog) -> B2buaResult<()>;
}

/// Collaborators shared by every dialog of one B2BUA
#[derive(Clone)]
pub struct DialogServices {
    pub relay: Arc<dyn RelayControl>,
    pub signaling: Arc<dyn DialogSignaling>,
    /// Contact URI placed in our responses
    pub contact: Option<String>,
}

/// One leg of a call
pub struct Dialog {
    id: DialogId,
    side: DialogSide,
    call_id: String,
    local_tag: String,
    remote_tag: String,
    transport: TransportClass,
    state: RwLock<DialogState>,
    confirmed: AtomicBool,
    relayed: AtomicBool,
    media: DialogMedia,
    created_at: DateTime<Utc>,
    /// Cancelled once the call is over, whoever ended it
    context: CancellationToken,
    invite_tx: Mutex<Option<Arc<dyn ServerTransaction>>>,
    dtmf_tx: mpsc::Sender<DtmfEvent>,
    dtmf_rx: Mutex<Option<mpsc::Receiver<DtmfEvent>>>,
    services: DialogServices,
}

impl fmt::Debug for Dialog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialog")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("transport", &self.transport)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Dialog {
    /// Create the server leg for a new INVITE
    ///
    /// A fresh local tag is generated; the leg's key is what the UAS
    /// derivation yields for later requests from the caller.
    pub fn new_server(
        request: &InDialogRequest,
        invite_tx: Arc<dyn ServerTransaction>,
        services: DialogServices,
    ) -> B2buaResult<Self> {
        let call_id = non_empty(request.call_id.as_deref())
            .ok_or_else(|| B2buaError::malformed_request("INVITE missing Call-ID"))?;
        let remote_tag = non_empty(request.from_tag.as_deref())
            .ok_or_else(|| B2buaError::malformed_request("INVITE missing From tag"))?;
        let local_tag = generate_tag();

        let id = DialogId::from_parts(call_id, &local_tag, remote_tag);
        let mut dialog = Self::build(
            id,
            DialogSide::Server,
            call_id.to_string(),
            local_tag,
            remote_tag.to_string(),
            request.transport,
            services,
        );
        dialog.media = DialogMedia::with_remote_sdp(request.sdp().map(str::to_string));
        *dialog.invite_tx.get_mut() = Some(invite_tx);
        Ok(dialog)
    }

    /// Create a client leg originated by the B2BUA
    ///
    /// `local_tag` is our From tag, `remote_tag` the callee's To tag.
    pub fn new_client(
        call_id: impl Into<String>,
        local_tag: impl Into<String>,
        remote_tag: impl Into<String>,
        transport: TransportClass,
        services: DialogServices,
    ) -> Self {
        let call_id = call_id.into();
        let local_tag = local_tag.into();
        let remote_tag = remote_tag.into();
        let id = DialogId::from_parts(&call_id, &remote_tag, &local_tag);
        Self::build(id, DialogSide::Client, call_id, local_tag, remote_tag, transport, services)
    }

    fn build(
        id: DialogId,
        side: DialogSide,
        call_id: String,
        local_tag: String,
        remote_tag: String,
        transport: TransportClass,
        services: DialogServices,
    ) -> Self {
        let (dtmf_tx, dtmf_rx) = mpsc::channel(DTMF_CHANNEL_CAPACITY);
        Self {
            id,
            side,
            call_id,
            local_tag,
            remote_tag,
            transport,
            state: RwLock::new(DialogState::New),
            confirmed: AtomicBool::new(false),
            relayed: AtomicBool::new(false),
            media: DialogMedia::new(),
            created_at: Utc::now(),
            context: CancellationToken::new(),
            invite_tx: Mutex::new(None),
            dtmf_tx,
            dtmf_rx: Mutex::new(Some(dtmf_rx)),
            services,
        }
    }

    pub fn id(&self) -> &DialogId {
        &self.id
    }

    pub fn side(&self) -> DialogSide {
        self.side
    }

    /// Call-ID of the call this leg belongs to
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn local_tag(&self) -> &str {
        &self.local_tag
    }

    pub fn remote_tag(&self) -> &str {
        &self.remote_tag
    }

    pub fn transport(&self) -> TransportClass {
        self.transport
    }

    pub fn state(&self) -> DialogState {
        *self.state.read()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn media(&self) -> &DialogMedia {
        &self.media
    }

    /// Whether the ACK for our 2xx arrived
    pub fn is_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::Acquire)
    }

    /// Lifetime context of the call
    pub fn context(&self) -> &CancellationToken {
        &self.context
    }

    /// Whether the call is over
    pub fn is_ended(&self) -> bool {
        self.context.is_cancelled()
    }

    /// Take the receiver of out-of-band DTMF; only the first caller gets it
    pub fn dtmf_events(&self) -> Option<mpsc::Receiver<DtmfEvent>> {
        self.dtmf_rx.lock().take()
    }

    pub(crate) fn set_state(&self, state: DialogState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(dialog_id = %self.id, ?previous, ?state, "Dialog state changed");
        }
    }

    /// Mark the call as ended and close the state machine
    pub(crate) fn end(&self) {
        self.set_state(DialogState::Closed);
        self.context.cancel();
    }

    /// Relay parameters for this leg; the offering party is the From side
    fn relay_params(&self) -> BaseParams {
        let (from_tag, to_tag) = match self.side {
            DialogSide::Server => (&self.remote_tag, &self.local_tag),
            DialogSide::Client => (&self.local_tag, &self.remote_tag),
        };
        BaseParams::new(self.call_id.clone(), from_tag.clone()).with_to_tag(to_tag.clone())
    }

    async fn relay_sdp(&self, command: RelayCommand, sdp: &str) -> B2buaResult<String> {
        let action = command.action;
        let reply = self.services.relay.execute(command).await?;
        let rewritten = reply
            .sdp
            .ok_or_else(|| RelayError::rejected(action.as_str(), "reply carried no SDP"))?;

        self.relayed.store(true, Ordering::Release);
        self.media.set_remote_sdp(Some(sdp.to_string()));
        self.media.set_local_sdp(Some(rewritten.clone()));
        Ok(rewritten)
    }

    /// Pass an SDP offer through the relay using this leg's transport profile
    pub async fn offer_media(&self, sdp: &str) -> B2buaResult<String> {
        let command = build_offer(self.transport, self.relay_params().with_sdp(sdp));
        self.relay_sdp(command, sdp).await
    }

    /// Pass an SDP answer through the relay
    pub async fn answer_media(&self, sdp: &str) -> B2buaResult<String> {
        let command = build_answer(self.relay_params().with_sdp(sdp));
        self.relay_sdp(command, sdp).await
    }

    /// Answer the INVITE that created this server leg with 200 OK
    pub async fn answer(&self, sdp: Option<String>) -> B2buaResult<()> {
        if self.side != DialogSide::Server || self.is_ended() {
            return Err(B2buaError::invalid_state("answer", self.state()));
        }
        let tx = self
            .invite_tx
            .lock()
            .take()
            .ok_or_else(|| B2buaError::invalid_state("answer", self.state()))?;

        let mut response = self.ok_response();
        if let Some(sdp) = sdp {
            response = response.with_sdp(sdp);
        }
        tx.respond(response).await?;
        info!(dialog_id = %self.id, "Answered call");
        Ok(())
    }

    /// Handle the ACK completing our 2xx
    pub fn read_ack(&self, request: &InDialogRequest) -> B2buaResult<()> {
        match self.state() {
            DialogState::New | DialogState::Active => {}
            state => return Err(B2buaError::invalid_state("ACK", state)),
        }
        if let Some(sdp) = request.sdp() {
            // Late offer: the caller's SDP arrives with the ACK
            self.media.set_remote_sdp(Some(sdp.to_string()));
        }
        self.confirmed.store(true, Ordering::Release);
        debug!(dialog_id = %self.id, "ACK received, dialog confirmed");
        Ok(())
    }

    /// Handle a BYE from the peer
    pub async fn read_bye(
        &self,
        _request: &InDialogRequest,
        tx: &dyn ServerTransaction,
    ) -> B2buaResult<()> {
        info!(dialog_id = %self.id, side = %self.side, "BYE received");
        self.end();
        tx.respond(SipResponse::new(StatusCode::Ok)).await
    }

    /// Handle an INFO carrying `application/dtmf-relay`
    pub async fn read_info_dtmf(
        &self,
        request: &InDialogRequest,
        tx: &dyn ServerTransaction,
    ) -> B2buaResult<()> {
        let event = match DtmfEvent::parse(request.body.as_deref().unwrap_or_default()) {
            Ok(event) => event,
            Err(e) => {
                tx.respond(SipResponse::new(StatusCode::BadRequest).with_reason(e.to_string()))
                    .await?;
                return Err(e);
            }
        };

        debug!(dialog_id = %self.id, digit = %event.digit, duration_ms = event.duration_ms, "DTMF received");
        if let Err(e) = self.dtmf_tx.try_send(event) {
            warn!(dialog_id = %self.id, error = %e, "Dropping DTMF event");
        }
        tx.respond(SipResponse::new(StatusCode::Ok)).await
    }

    /// Handle a re-INVITE, re-negotiating media through the relay
    pub async fn handle_reinvite(
        &self,
        request: &InDialogRequest,
        tx: &dyn ServerTransaction,
    ) -> B2buaResult<()> {
        if self.is_ended() {
            tx.respond(SipResponse::new(StatusCode::CallOrTransactionDoesNotExist)).await?;
            return Err(B2buaError::invalid_state("re-INVITE", self.state()));
        }

        let sdp = match request.sdp() {
            Some(offer) => match self.offer_media(offer).await {
                Ok(sdp) => Some(sdp),
                Err(e) => {
                    error!(dialog_id = %self.id, error = %e, "Re-INVITE media update failed");
                    tx.respond(SipResponse::new(StatusCode::ServerInternalError)).await?;
                    return Err(e);
                }
            },
            // Session refresh without offer: answer with what we have
            None => self.media.local_sdp(),
        };

        let mut response = self.ok_response();
        if let Some(sdp) = sdp {
            response = response.with_sdp(sdp);
        }
        tx.respond(response).await?;
        debug!(dialog_id = %self.id, "Re-INVITE handled");
        Ok(())
    }

    /// End the call from our side
    ///
    /// A server leg that was never answered gets 480 on its INVITE instead
    /// of a BYE. Fails without sending anything when the call already ended.
    pub async fn hangup(&self) -> B2buaResult<()> {
        if self.is_ended() {
            return Err(B2buaError::invalid_state("hangup", self.state()));
        }

        self.set_state(DialogState::Terminating);
        let pending = match self.side {
            DialogSide::Server => self.invite_tx.lock().take(),
            DialogSide::Client => None,
        };
        match pending {
            Some(tx) => {
                tx.respond(SipResponse::new(StatusCode::TemporarilyUnavailable)).await?;
                self.end();
                info!(dialog_id = %self.id, "Rejected unanswered call");
            }
            None => {
                self.services.signaling.send_bye(self).await?;
                self.end();
                info!(dialog_id = %self.id, side = %self.side, "Call hung up");
            }
        }

        self.close_media().await;
        Ok(())
    }

    /// Close the media session and release the relay path; idempotent
    pub async fn close_media(&self) {
        self.media.close();

        if self.relayed.swap(false, Ordering::AcqRel) {
            let command = build_delete(self.relay_params());
            if let Err(e) = self.services.relay.execute(command).await {
                warn!(dialog_id = %self.id, error = %e, "Failed to delete relay session");
            }
        }
    }

    fn ok_response(&self) -> SipResponse {
        let response = SipResponse::new(StatusCode::Ok);
        match &self.services.contact {
            Some(contact) => response.with_contact(contact.clone()),
            None => response,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn generate_tag() -> String {
    format!("{:08x}", rand::random::<u32>())
}
