//! Dialog stores
//!
//! Any inbound in-dialog request has to be matched without holding a
//! reference to its dialog, so live legs are kept in keyed stores: one for
//! server legs and one for client legs. Stores are passed around explicitly;
//! there is no process-global instance.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::dialog::{Dialog, DialogId};

/// Keyed lookup from dialog identifier to live dialog
///
/// Implementations must tolerate concurrent `load` calls while `store` or
/// `delete` run for other keys (or the same key).
pub trait DialogStore: Send + Sync {
    /// Register `dialog` under `id`, replacing any previous entry
    fn store(&self, id: DialogId, dialog: Arc<Dialog>);

    /// Look up a live dialog
    fn load(&self, id: &DialogId) -> Option<Arc<Dialog>>;

    /// Remove `id`; removing an absent key is not an error
    fn delete(&self, id: &DialogId) -> Option<Arc<Dialog>>;

    /// Number of live dialogs
    fn len(&self) -> usize;

    /// Remove the entry for `dialog` only if it still points at that dialog
    fn delete_dialog(&self, dialog: &Arc<Dialog>) -> bool {
        match self.load(dialog.id()) {
            Some(current) if Arc::ptr_eq(&current, dialog) => self.delete(dialog.id()).is_some(),
            _ => false,
        }
    }
}

/// In-memory store backed by a sharded concurrent map
#[derive(Debug, Default)]
pub struct MemoryDialogStore {
    name: &'static str,
    dialogs: DashMap<DialogId, Arc<Dialog>>,
}

impl MemoryDialogStore {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            dialogs: DashMap::new(),
        }
    }

    pub fn ids(&self) -> Vec<DialogId> {
        self.dialogs.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl DialogStore for MemoryDialogStore {
    fn store(&self, id: DialogId, dialog: Arc<Dialog>) {
        if self.dialogs.insert(id.clone(), dialog).is_some() {
            warn!(store = self.name, dialog_id = %id, "Replaced existing dialog in store");
        } else {
            debug!(store = self.name, dialog_id = %id, "Stored dialog");
        }
    }

    fn load(&self, id: &DialogId) -> Option<Arc<Dialog>> {
        self.dialogs.get(id).map(|entry| entry.value().clone())
    }

    fn delete(&self, id: &DialogId) -> Option<Arc<Dialog>> {
        let removed = self.dialogs.remove(id).map(|(_, dialog)| dialog);
        if removed.is_some() {
            debug!(store = self.name, dialog_id = %id, "Deleted dialog");
        }
        removed
    }

    fn len(&self) -> usize {
        self.dialogs.len()
    }

    fn delete_dialog(&self, dialog: &Arc<Dialog>) -> bool {
        let removed = self
            .dialogs
            .remove_if(dialog.id(), |_, current| Arc::ptr_eq(current, dialog))
            .is_some();
        if removed {
            debug!(store = self.name, dialog_id = %dialog.id(), "Deleted dialog");
        }
        removed
    }
}

/// Keeps a dialog registered for as long as the guard lives
///
/// Dropping the guard deletes the entry, whichever way the owning scope
/// exits. The entry is only removed if it still points at the same dialog.
pub struct StoreRegistration {
    store: Arc<dyn DialogStore>,
    dialog: Arc<Dialog>,
}

impl StoreRegistration {
    pub fn register(store: Arc<dyn DialogStore>, dialog: Arc<Dialog>) -> Self {
        store.store(dialog.id().clone(), dialog.clone());
        Self { store, dialog }
    }

    pub fn dialog(&self) -> &Arc<Dialog> {
        &self.dialog
    }
}

impl Drop for StoreRegistration {
    fn drop(&mut self) {
        if !self.store.delete_dialog(&self.dialog) {
            debug!(dialog_id = %self.dialog.id(), "Dialog already gone from store");
        }
    }
}
