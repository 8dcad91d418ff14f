//! Server-pushed change notifications.

use crate::entry::LocalEntry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A change notification delivered over the push channel.
///
/// Events are delivered at-least-once and order-preserving per entry id.
/// Redelivery after a reconnect is expected, so every application of an
/// event must be idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveUpdate {
    /// An entry was added on the server.
    EntryAdded {
        /// Server-canonical entry.
        entry: LocalEntry,
        /// Date bucket the server filed the entry under.
        date: NaiveDate,
    },
    /// An entry was updated on the server.
    EntryUpdated {
        /// Server-canonical entry.
        entry: LocalEntry,
        /// Date bucket the server filed the entry under.
        date: NaiveDate,
    },
    /// An entry was deleted on the server.
    EntryDeleted {
        /// Id of the removed entry.
        entry_id: String,
        /// Date bucket the entry lived under.
        date: NaiveDate,
    },
}

impl LiveUpdate {
    /// Returns the id of the entry this event concerns.
    pub fn entry_id(&self) -> &str {
        match self {
            LiveUpdate::EntryAdded { entry, .. } | LiveUpdate::EntryUpdated { entry, .. } => {
                &entry.id
            }
            LiveUpdate::EntryDeleted { entry_id, .. } => entry_id,
        }
    }

    /// Returns the date bucket the event refers to.
    pub fn date(&self) -> NaiveDate {
        match self {
            LiveUpdate::EntryAdded { date, .. }
            | LiveUpdate::EntryUpdated { date, .. }
            | LiveUpdate::EntryDeleted { date, .. } => *date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryDraft;

    #[test]
    fn entry_id_accessor() {
        let entry = LocalEntry::from_draft(
            "e1",
            "c1",
            &EntryDraft::new().with_date("2024-03-01".parse().unwrap()),
        );
        let date = entry.start_date;

        let added = LiveUpdate::EntryAdded { entry: entry.clone(), date };
        assert_eq!(added.entry_id(), "e1");
        assert_eq!(added.date(), date);

        let deleted = LiveUpdate::EntryDeleted { entry_id: "e2".into(), date };
        assert_eq!(deleted.entry_id(), "e2");
    }

    #[test]
    fn event_tag_format() {
        let deleted = LiveUpdate::EntryDeleted {
            entry_id: "e9".into(),
            date: "2024-03-01".parse().unwrap(),
        };
        let json = serde_json::to_string(&deleted).unwrap();
        assert!(json.contains("\"type\":\"entry_deleted\""));
    }
}
