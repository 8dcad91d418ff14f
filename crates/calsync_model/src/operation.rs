//! Queued mutations awaiting server confirmation.

use crate::entry::EntryDraft;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of mutation a queued operation replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create a new entry.
    Create,
    /// Update an existing entry.
    Update,
    /// Delete an entry.
    Delete,
}

impl OperationKind {
    /// Returns a lowercase name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

/// A queued mutation awaiting confirmation by the server.
///
/// Operations are replayed strictly oldest-first (see
/// [`sort_by_created_at`]). Multiple queued operations for the same entry
/// are allowed; they are processed in creation order, so an update queued
/// before a delete is attempted before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Globally unique operation id, generated at enqueue time.
    pub id: Uuid,
    /// The entry this operation targets.
    pub entry_id: String,
    /// The kind of mutation.
    pub kind: OperationKind,
    /// Fields needed to replay the mutation. `None` for deletes.
    pub payload: Option<EntryDraft>,
    /// Enqueue timestamp; defines replay order.
    pub created_at: DateTime<Utc>,
    /// Number of failed replay attempts so far.
    pub retry_count: u32,
    /// Message of the most recent failure, if any.
    pub last_error: Option<String>,
}

impl PendingOperation {
    /// Creates a new operation with a fresh id and timestamp.
    pub fn new(entry_id: impl Into<String>, kind: OperationKind, payload: Option<EntryDraft>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id: entry_id.into(),
            kind,
            payload,
            created_at: Utc::now(),
            retry_count: 0,
            last_error: None,
        }
    }

    /// Creates a queued create carrying the full draft.
    pub fn create(entry_id: impl Into<String>, draft: EntryDraft) -> Self {
        Self::new(entry_id, OperationKind::Create, Some(draft))
    }

    /// Creates a queued update carrying the changed fields.
    pub fn update(entry_id: impl Into<String>, draft: EntryDraft) -> Self {
        Self::new(entry_id, OperationKind::Update, Some(draft))
    }

    /// Creates a queued delete. Deletes carry no payload.
    pub fn delete(entry_id: impl Into<String>) -> Self {
        Self::new(entry_id, OperationKind::Delete, None)
    }

    /// Records a failed replay attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.last_error = Some(error.into());
    }
}

/// Sorts operations into replay order: ascending `created_at`.
///
/// The sort is stable, so operations with identical timestamps keep their
/// storage order.
pub fn sort_by_created_at(operations: &mut [PendingOperation]) {
    operations.sort_by_key(|op| op.created_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(op: PendingOperation, secs: i64) -> PendingOperation {
        PendingOperation {
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            ..op
        }
    }

    #[test]
    fn constructors_set_payload_rules() {
        let create = PendingOperation::create("e1", EntryDraft::new());
        assert_eq!(create.kind, OperationKind::Create);
        assert!(create.payload.is_some());
        assert_eq!(create.retry_count, 0);
        assert!(create.last_error.is_none());

        let delete = PendingOperation::delete("e1");
        assert_eq!(delete.kind, OperationKind::Delete);
        assert!(delete.payload.is_none());
    }

    #[test]
    fn record_failure_accumulates() {
        let mut op = PendingOperation::delete("e1");
        op.record_failure("timeout");
        op.record_failure("503");

        assert_eq!(op.retry_count, 2);
        assert_eq!(op.last_error.as_deref(), Some("503"));
    }

    #[test]
    fn sort_is_oldest_first() {
        let mut ops = vec![
            at(PendingOperation::delete("e3"), 30),
            at(PendingOperation::delete("e1"), 10),
            at(PendingOperation::delete("e2"), 20),
        ];

        sort_by_created_at(&mut ops);

        let order: Vec<_> = ops.iter().map(|op| op.entry_id.as_str()).collect();
        assert_eq!(order, ["e1", "e2", "e3"]);
    }

    #[test]
    fn sort_ties_keep_storage_order() {
        let mut ops = vec![
            at(PendingOperation::delete("first"), 10),
            at(PendingOperation::delete("second"), 10),
            at(PendingOperation::delete("third"), 10),
        ];

        sort_by_created_at(&mut ops);

        let order: Vec<_> = ops.iter().map(|op| op.entry_id.as_str()).collect();
        assert_eq!(order, ["first", "second", "third"]);
    }

    proptest! {
        #[test]
        fn sorted_timestamps_are_non_decreasing(stamps in proptest::collection::vec(0i64..1_000_000, 0..50)) {
            let mut ops: Vec<_> = stamps
                .iter()
                .enumerate()
                .map(|(i, &s)| at(PendingOperation::delete(format!("e{i}")), s))
                .collect();

            sort_by_created_at(&mut ops);

            for pair in ops.windows(2) {
                prop_assert!(pair[0].created_at <= pair[1].created_at);
            }
        }
    }
}
