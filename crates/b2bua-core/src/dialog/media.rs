//! Media session handle of a dialog leg
//!
//! Application code parks on [`DialogMedia::closed`] (directly or inside a
//! `select!` around its own media I/O); closing the handle wakes all of them.

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DialogMedia {
    closed: CancellationToken,
    local_sdp: RwLock<Option<String>>,
    remote_sdp: RwLock<Option<String>>,
}

impl DialogMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle that already knows the peer's SDP
    pub fn with_remote_sdp(sdp: Option<String>) -> Self {
        let media = Self::new();
        *media.remote_sdp.write() = sdp;
        media
    }

    /// Close the session; idempotent
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!("Closing dialog media");
            self.closed.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the session is closed
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    pub fn local_sdp(&self) -> Option<String> {
        self.local_sdp.read().clone()
    }

    pub fn remote_sdp(&self) -> Option<String> {
        self.remote_sdp.read().clone()
    }

    pub fn set_local_sdp(&self, sdp: Option<String>) {
        *self.local_sdp.write() = sdp;
    }

    pub fn set_remote_sdp(&self, sdp: Option<String>) {
        *self.remote_sdp.write() = sdp;
    }
}
