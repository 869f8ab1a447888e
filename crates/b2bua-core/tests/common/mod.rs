//! Shared test doubles for the b2bua-core integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use rvoip_b2bua_core::{
    B2buaError, B2buaResult, Dialog, DialogServices, DialogSignaling, InDialogRequest,
    ServerTransaction, SipMethod, SipResponse, SDP_CONTENT_TYPE,
};
use rvoip_rtpengine_core::{RelayCommand, RelayControl, RelayReply, RelayResult};

pub const RELAYED_SDP: &str = "v=0\r\no=relay 1 1 IN IP4 198.51.100.1\r\n";
pub const CALLER_SDP: &str = "v=0\r\no=caller 1 1 IN IP4 192.0.2.10\r\n";

/// Server transaction that records every response
#[derive(Default)]
pub struct RecordingTransaction {
    responses: Mutex<Vec<SipResponse>>,
}

impl RecordingTransaction {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn responses(&self) -> Vec<SipResponse> {
        self.responses.lock().clone()
    }

    pub fn statuses(&self) -> Vec<u16> {
        self.responses.lock().iter().map(|r| r.status.as_u16()).collect()
    }
}

#[async_trait]
impl ServerTransaction for RecordingTransaction {
    async fn respond(&self, response: SipResponse) -> B2buaResult<()> {
        self.responses.lock().push(response);
        Ok(())
    }
}

/// Relay that accepts or rejects every command and records what it saw
#[derive(Default)]
pub struct RecordingRelay {
    commands: Mutex<Vec<RelayCommand>>,
    reject: Mutex<Option<String>>,
}

impl RecordingRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(reason: &str) -> Arc<Self> {
        let relay = Self::default();
        *relay.reject.lock() = Some(reason.to_string());
        Arc::new(relay)
    }

    pub fn commands(&self) -> Vec<RelayCommand> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl RelayControl for RecordingRelay {
    async fn send(&self, command: RelayCommand) -> RelayResult<RelayReply> {
        self.commands.lock().push(command);
        Ok(match self.reject.lock().clone() {
            Some(reason) => RelayReply::error(reason),
            None => RelayReply::ok(Some(RELAYED_SDP.to_string())),
        })
    }
}

/// How [`ScriptedSignaling`] answers BYE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByeBehavior {
    Succeed,
    Fail,
    Stall,
}

/// Outbound signaling with scripted BYE results
pub struct ScriptedSignaling {
    behavior: ByeBehavior,
    byes: AtomicUsize,
}

impl ScriptedSignaling {
    pub fn new(behavior: ByeBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            byes: AtomicUsize::new(0),
        })
    }

    pub fn byes_sent(&self) -> usize {
        self.byes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DialogSignaling for ScriptedSignaling {
    async fn send_bye(&self, _dialog: &Dialog) -> B2buaResult<()> {
        self.byes.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            ByeBehavior::Succeed => Ok(()),
            ByeBehavior::Fail => Err(B2buaError::signaling("408 Request Timeout")),
            ByeBehavior::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

pub fn services(relay: Arc<RecordingRelay>, signaling: Arc<ScriptedSignaling>) -> DialogServices {
    DialogServices {
        relay,
        signaling,
        contact: Some("<sip:127.0.0.1:5060;transport=udp>".to_string()),
    }
}

/// Initial INVITE from the caller
pub fn invite(call_id: &str, from_tag: &str) -> InDialogRequest {
    InDialogRequest::new(SipMethod::Invite, call_id)
        .with_from_tag(from_tag)
        .with_body(SDP_CONTENT_TYPE, CALLER_SDP)
}

/// In-dialog request sent by the peer of `dialog`, on either side
pub fn from_peer(method: SipMethod, dialog: &Dialog) -> InDialogRequest {
    InDialogRequest::new(method, dialog.call_id())
        .with_from_tag(dialog.remote_tag())
        .with_to_tag(dialog.local_tag())
}

pub fn new_server_dialog(call_id: &str, services: DialogServices) -> Arc<Dialog> {
    new_server_call(call_id, services).0
}

/// Server leg plus the transaction of the INVITE that created it
pub fn new_server_call(call_id: &str, services: DialogServices) -> (Arc<Dialog>, Arc<RecordingTransaction>) {
    let invite_tx = RecordingTransaction::new();
    let tx: Arc<dyn ServerTransaction> = invite_tx.clone();
    let dialog = Dialog::new_server(&invite(call_id, "caller-tag"), tx, services).unwrap();
    (Arc::new(dialog), invite_tx)
}

/// Poll until `check` holds, failing the test after one second
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
