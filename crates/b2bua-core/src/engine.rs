//! B2BUA engine
//!
//! [`B2bua`] is what the transaction engine talks to. It owns the two dialog
//! stores, the router and the lifecycle controller, and exposes one entry
//! point per inbound request kind. Entry points never return errors: every
//! failure ends in a response or a log line.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use rvoip_rtpengine_core::{RelayControl, TransportClass};

use crate::config::B2buaConfig;
use crate::dialog::{Dialog, DialogIdDerivation, DialogServices, DialogSide, DialogSignaling};
use crate::lifecycle::{CallHandler, CallLifecycle, UnimplementedCallHandler};
use crate::request::{
    InDialogRequest, ServerTransaction, SipResponse, StatusCode, DTMF_RELAY_CONTENT_TYPE,
};
use crate::router::{DialogRouter, MatchedDialog};
use crate::store::{DialogStore, MemoryDialogStore, StoreRegistration};

/// Builder for [`B2bua`]
pub struct B2buaBuilder {
    config: B2buaConfig,
    relay: Arc<dyn RelayControl>,
    signaling: Arc<dyn DialogSignaling>,
    handler: Option<Arc<dyn CallHandler>>,
    server_dialogs: Option<Arc<dyn DialogStore>>,
    client_dialogs: Option<Arc<dyn DialogStore>>,
}

impl B2buaBuilder {
    pub fn new(relay: Arc<dyn RelayControl>, signaling: Arc<dyn DialogSignaling>) -> Self {
        Self {
            config: B2buaConfig::default(),
            relay,
            signaling,
            handler: None,
            server_dialogs: None,
            client_dialogs: None,
        }
    }

    pub fn with_config(mut self, config: B2buaConfig) -> Self {
        self.config = config;
        self
    }

    /// Application code serving each new call
    pub fn with_handler(mut self, handler: Arc<dyn CallHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_server_store(mut self, store: Arc<dyn DialogStore>) -> Self {
        self.server_dialogs = Some(store);
        self
    }

    pub fn with_client_store(mut self, store: Arc<dyn DialogStore>) -> Self {
        self.client_dialogs = Some(store);
        self
    }

    pub fn build(self) -> B2bua {
        let server_dialogs = self
            .server_dialogs
            .unwrap_or_else(|| Arc::new(MemoryDialogStore::new("server")));
        let client_dialogs = self
            .client_dialogs
            .unwrap_or_else(|| Arc::new(MemoryDialogStore::new("client")));
        let handler = self
            .handler
            .unwrap_or_else(|| Arc::new(UnimplementedCallHandler));

        let services = DialogServices {
            relay: self.relay,
            signaling: self.signaling,
            contact: Some(self.config.contact_uri()),
        };
        let router = DialogRouter::new(server_dialogs.clone(), client_dialogs.clone());
        let lifecycle = CallLifecycle::new(server_dialogs.clone(), handler)
            .with_teardown_timeout(self.config.teardown_timeout());

        B2bua {
            config: self.config,
            services,
            server_dialogs,
            client_dialogs,
            router,
            lifecycle,
        }
    }
}

/// Back-to-back user agent bridging calls through the media relay
pub struct B2bua {
    config: B2buaConfig,
    services: DialogServices,
    server_dialogs: Arc<dyn DialogStore>,
    client_dialogs: Arc<dyn DialogStore>,
    router: DialogRouter,
    lifecycle: CallLifecycle,
}

impl B2bua {
    pub fn builder(
        relay: Arc<dyn RelayControl>,
        signaling: Arc<dyn DialogSignaling>,
    ) -> B2buaBuilder {
        B2buaBuilder::new(relay, signaling)
    }

    pub fn config(&self) -> &B2buaConfig {
        &self.config
    }

    pub fn server_dialogs(&self) -> &Arc<dyn DialogStore> {
        &self.server_dialogs
    }

    pub fn client_dialogs(&self) -> &Arc<dyn DialogStore> {
        &self.client_dialogs
    }

    pub fn router(&self) -> &DialogRouter {
        &self.router
    }

    /// Create a client leg sharing this B2BUA's relay and signaling
    pub fn new_client_dialog(
        &self,
        call_id: impl Into<String>,
        local_tag: impl Into<String>,
        remote_tag: impl Into<String>,
        transport: TransportClass,
    ) -> Arc<Dialog> {
        Arc::new(Dialog::new_client(
            call_id,
            local_tag,
            remote_tag,
            transport,
            self.services.clone(),
        ))
    }

    /// Make a client leg routable until the returned guard is dropped
    pub fn attach_client_leg(&self, dialog: Arc<Dialog>) -> StoreRegistration {
        StoreRegistration::register(self.client_dialogs.clone(), dialog)
    }

    /// INVITE: a new call, or a re-INVITE when it carries a full dialog id
    ///
    /// For a new call this returns only once the call is over.
    pub async fn on_invite(&self, request: InDialogRequest, tx: Arc<dyn ServerTransaction>) {
        if DialogIdDerivation::Uas.derive(&request).is_ok() {
            self.on_reinvite(request, tx.as_ref()).await;
            return;
        }

        let dialog = match Dialog::new_server(&request, tx.clone(), self.services.clone()) {
            Ok(dialog) => Arc::new(dialog),
            Err(e) => {
                error!(error = %e, "Failed to create server dialog");
                respond(tx.as_ref(), SipResponse::new(StatusCode::BadRequest)).await;
                return;
            }
        };

        info!(dialog_id = %dialog.id(), transport = %dialog.transport(), "New call");
        self.lifecycle.run(dialog).await;
    }

    async fn on_reinvite(&self, request: InDialogRequest, tx: &dyn ServerTransaction) {
        let matched = match self.router.route(&request) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(error = %e, "Re-INVITE did not match a dialog");
                respond(tx, SipResponse::new(e.status())).await;
                return;
            }
        };

        if let Err(e) = matched.dialog.handle_reinvite(&request, tx).await {
            warn!(dialog_id = %matched.dialog.id(), side = %matched.side, error = %e, "Re-INVITE failed");
        }
    }

    /// ACK: completes our 2xx; never answered
    pub async fn on_ack(&self, request: InDialogRequest, _tx: Arc<dyn ServerTransaction>) {
        let dialog = match self.router.route_side(&request, DialogSide::Server) {
            Ok(MatchedDialog { dialog, .. }) => dialog,
            Err(e) => {
                debug!(error = %e, "ACK did not match a dialog");
                return;
            }
        };

        if let Err(e) = dialog.read_ack(&request) {
            error!(dialog_id = %dialog.id(), error = %e, "ACK finished with error");
        }
    }

    /// BYE from either leg
    pub async fn on_bye(&self, request: InDialogRequest, tx: Arc<dyn ServerTransaction>) {
        let MatchedDialog { side, dialog } = match self.router.route(&request) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(error = %e, "BYE did not match a dialog");
                respond(tx.as_ref(), SipResponse::new(e.status())).await;
                return;
            }
        };

        if let Err(e) = dialog.read_bye(&request, tx.as_ref()).await {
            error!(dialog_id = %dialog.id(), error = %e, "Failed to read bye for {} dialog", side);
        }
        // Wakes a handler blocked on media so its call can finish
        dialog.close_media().await;
    }

    /// INFO carrying out-of-band DTMF
    pub async fn on_info(&self, request: InDialogRequest, tx: Arc<dyn ServerTransaction>) {
        if request.content_type.as_deref() != Some(DTMF_RELAY_CONTENT_TYPE) {
            debug!(content_type = ?request.content_type, "Rejecting INFO content type");
            respond(tx.as_ref(), SipResponse::new(StatusCode::NotAcceptable)).await;
            return;
        }

        let MatchedDialog { side, dialog } = match self.router.route(&request) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(error = %e, "INFO did not match a dialog");
                respond(tx.as_ref(), SipResponse::new(e.status())).await;
                return;
            }
        };

        if let Err(e) = dialog.read_info_dtmf(&request, tx.as_ref()).await {
            warn!(dialog_id = %dialog.id(), %side, error = %e, "Failed to read INFO DTMF");
        }
    }

    /// CANCEL: the transaction layer already terminated the INVITE
    pub async fn on_cancel(&self, request: InDialogRequest, tx: Arc<dyn ServerTransaction>) {
        debug!(call_id = ?request.call_id, "CANCEL received");
        respond(
            tx.as_ref(),
            SipResponse::new(StatusCode::CallOrTransactionDoesNotExist),
        )
        .await;
    }

    /// OPTIONS keep-alive
    pub async fn on_options(&self, _request: InDialogRequest, tx: Arc<dyn ServerTransaction>) {
        respond(tx.as_ref(), SipResponse::new(StatusCode::Ok)).await;
    }
}

async fn respond(tx: &dyn ServerTransaction, response: SipResponse) {
    let status = response.status;
    if let Err(e) = tx.respond(response).await {
        error!(%status, error = %e, "Failed to send response");
    }
}
