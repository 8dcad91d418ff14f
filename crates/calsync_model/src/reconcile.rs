//! Reconciliation decisions for incoming live updates.
//!
//! The decision is keyed only on whether this client has an outstanding
//! intent for the entry id, not on version numbers. The server is the
//! single source of truth and echoes every committed change back over the
//! push channel, including this client's own writes.

use crate::entry::LocalEntry;
use crate::operation::OperationKind;

/// Decision for an incoming entry-added event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// The event is the server's acknowledgment of our own optimistic
    /// insert; overwrite in place rather than duplicating the entry.
    ConfirmCreate,
    /// The event is another client's insert; upsert it as synced.
    AddNew,
}

/// Decision for an incoming entry-updated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSyncAction {
    /// The event acknowledges our own pending update.
    ConfirmUpdate,
    /// The event is a genuine remote change; upsert it as synced.
    ApplyRemote,
}

/// Decides how to handle an entry-added event given the current local
/// entry for the same id.
pub fn determine_sync_action(existing: Option<&LocalEntry>) -> SyncAction {
    match existing {
        Some(entry) if entry.pending_operation == Some(OperationKind::Create) => {
            SyncAction::ConfirmCreate
        }
        _ => SyncAction::AddNew,
    }
}

/// Decides how to handle an entry-updated event given the current local
/// entry for the same id.
pub fn determine_update_sync_action(existing: Option<&LocalEntry>) -> UpdateSyncAction {
    match existing {
        Some(entry) if entry.pending_operation == Some(OperationKind::Update) => {
            UpdateSyncAction::ConfirmUpdate
        }
        _ => UpdateSyncAction::ApplyRemote,
    }
}
