//! Call lifecycle controller
//!
//! Drives one inbound call through `New → Active → Terminating → Closed`:
//!
//! 1. register the server leg in the store (scoped by [`StoreRegistration`])
//! 2. run the application's [`CallHandler`] for as long as it wants the call
//! 3. hang up under a bounded timeout, unless the peer already did
//! 4. close media and deregister, on every exit path
//!
//! The handler may run for the full duration of the call. No store-wide lock
//! is held while it runs.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::dialog::{Dialog, DialogState};
use crate::store::{DialogStore, StoreRegistration};

/// Bound on the hangup issued when the handler returns
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application code serving an inbound call
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// Serve the call; returning ends it
    async fn serve(&self, dialog: Arc<Dialog>);
}

/// [`CallHandler`] backed by an async closure
pub struct FnCallHandler<F>(F);

/// Wrap an async closure as a [`CallHandler`]
pub fn handler_fn<F, Fut>(f: F) -> FnCallHandler<F>
where
    F: Fn(Arc<Dialog>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    FnCallHandler(f)
}

#[async_trait]
impl<F, Fut> CallHandler for FnCallHandler<F>
where
    F: Fn(Arc<Dialog>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn serve(&self, dialog: Arc<Dialog>) {
        (self.0)(dialog).await
    }
}

/// Handler installed when the application provides none
#[derive(Debug, Default)]
pub struct UnimplementedCallHandler;

#[async_trait]
impl CallHandler for UnimplementedCallHandler {
    async fn serve(&self, dialog: Arc<Dialog>) {
        warn!(dialog_id = %dialog.id(), "Serve handler not implemented");
    }
}

/// How the teardown attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Our BYE, or the 480 for an unanswered call, completed
    Completed,
    /// The peer ended the call first; nothing to do
    AlreadyEnded,
    /// BYE failed for another reason
    Failed,
    /// BYE did not complete within the teardown timeout
    TimedOut,
}

/// Runs inbound calls from registration to cleanup
#[derive(Clone)]
pub struct CallLifecycle {
    server_dialogs: Arc<dyn DialogStore>,
    handler: Arc<dyn CallHandler>,
    teardown_timeout: Duration,
}

impl CallLifecycle {
    pub fn new(server_dialogs: Arc<dyn DialogStore>, handler: Arc<dyn CallHandler>) -> Self {
        Self {
            server_dialogs,
            handler,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
        }
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    pub fn teardown_timeout(&self) -> Duration {
        self.teardown_timeout
    }

    /// Run a freshly accepted server leg to completion
    pub async fn run(&self, dialog: Arc<Dialog>) -> TeardownOutcome {
        let registration = StoreRegistration::register(self.server_dialogs.clone(), dialog.clone());
        dialog.set_state(DialogState::Active);
        info!(dialog_id = %dialog.id(), call_id = %dialog.call_id(), "Serving new call");

        let served = AssertUnwindSafe(self.handler.serve(dialog.clone()))
            .catch_unwind()
            .await;
        if served.is_err() {
            error!(dialog_id = %dialog.id(), "Call handler panicked");
        }

        let outcome = self.teardown(&dialog).await;
        dialog.close_media().await;
        drop(registration);

        debug!(dialog_id = %dialog.id(), ?outcome, "Call finished");
        outcome
    }

    /// Hang up `dialog` unless the call already ended
    pub async fn teardown(&self, dialog: &Dialog) -> TeardownOutcome {
        if dialog.is_ended() {
            debug!(dialog_id = %dialog.id(), "Call already ended by peer");
            return TeardownOutcome::AlreadyEnded;
        }

        let context = dialog.context().clone();
        let result = tokio::select! {
            biased;
            result = tokio::time::timeout(self.teardown_timeout, dialog.hangup()) => result,
            _ = context.cancelled() => {
                debug!(dialog_id = %dialog.id(), "Call ended by peer during hangup");
                return TeardownOutcome::AlreadyEnded;
            }
        };

        match result {
            Ok(Ok(())) => TeardownOutcome::Completed,
            Ok(Err(_)) if context.is_cancelled() => TeardownOutcome::AlreadyEnded,
            Ok(Err(e)) => {
                error!(dialog_id = %dialog.id(), error = %e, "Hangup failed");
                dialog.end();
                TeardownOutcome::Failed
            }
            Err(_) => {
                warn!(
                    dialog_id = %dialog.id(),
                    timeout_ms = self.teardown_timeout.as_millis() as u64,
                    "Hangup timed out"
                );
                dialog.end();
                TeardownOutcome::TimedOut
            }
        }
    }
}
