//! Live-update reconciler.
//!
//! Applies server-pushed events to the local store without
//! double-applying a change the engine itself is responsible for. The
//! push channel delivers at-least-once, so every application here is
//! idempotent.

use crate::error::SyncResult;
use crate::store::EntryStore;
use calsync_model::{
    determine_sync_action, determine_update_sync_action, LiveUpdate, LocalEntry, OperationKind,
    SyncAction, UpdateSyncAction,
};
use std::sync::Arc;
use tracing::debug;

/// Applies push-channel events to the entry store.
///
/// Shares the store with the [`SyncEngine`](crate::SyncEngine); together
/// they are the store's only writers.
pub struct Reconciler<S: EntryStore> {
    store: Arc<S>,
}

impl<S: EntryStore> Reconciler<S> {
    /// Creates a reconciler over the shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Applies one event, exactly once from the store's point of view.
    pub fn apply(&self, update: LiveUpdate) -> SyncResult<()> {
        match update {
            LiveUpdate::EntryAdded { entry, .. } => {
                let existing = self.store.entry(&entry.id)?;
                match determine_sync_action(existing.as_ref()) {
                    SyncAction::ConfirmCreate => {
                        debug!(entry_id = %entry.id, "added event confirms our pending create");
                        self.confirm(entry, OperationKind::Create)
                    }
                    SyncAction::AddNew => {
                        debug!(entry_id = %entry.id, "added event is a remote insert");
                        self.store.upsert_entry(entry.into_synced())
                    }
                }
            }
            LiveUpdate::EntryUpdated { entry, .. } => {
                let existing = self.store.entry(&entry.id)?;
                match determine_update_sync_action(existing.as_ref()) {
                    UpdateSyncAction::ConfirmUpdate => {
                        debug!(entry_id = %entry.id, "updated event confirms our pending update");
                        self.confirm(entry, OperationKind::Update)
                    }
                    UpdateSyncAction::ApplyRemote => {
                        debug!(entry_id = %entry.id, "updated event is a remote change");
                        self.store.upsert_entry(entry.into_synced())
                    }
                }
            }
            // Deletes apply unconditionally, regardless of pending
            // state; removing an absent id is a no-op.
            LiveUpdate::EntryDeleted { entry_id, .. } => {
                debug!(entry_id = %entry_id, "entry deleted remotely");
                self.store.remove_entry(&entry_id)
            }
        }
    }

    /// Settles an event that acknowledges our own optimistic write:
    /// overwrite with the server-canonical fields and drop the queued
    /// operation the event confirms, keeping "entry pending" equivalent
    /// to "operation queued".
    fn confirm(&self, entry: LocalEntry, kind: OperationKind) -> SyncResult<()> {
        for operation in self.store.queued_operations()? {
            if operation.entry_id == entry.id && operation.kind == kind {
                self.store.remove_operation(operation.id)?;
            }
        }
        self.store.upsert_entry(entry.into_synced())
    }
}
