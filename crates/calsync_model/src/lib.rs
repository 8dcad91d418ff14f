//! # Calsync Model
//!
//! Data model for the calsync offline sync engine.
//!
//! This crate provides:
//! - `LocalEntry` for the client's materialized view of a calendar entry
//! - `EntryDraft` for partial payloads used to replay mutations
//! - `PendingOperation` for queued, not-yet-confirmed mutations
//! - `LiveUpdate` for server-pushed change notifications
//! - Reconciliation decision functions (confirm vs. apply-remote)
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod event;
mod operation;
mod reconcile;

pub use entry::{EntryDraft, EntryKind, LocalEntry, SyncStatus};
pub use event::LiveUpdate;
pub use operation::{sort_by_created_at, OperationKind, PendingOperation};
pub use reconcile::{
    determine_sync_action, determine_update_sync_action, SyncAction, UpdateSyncAction,
};
