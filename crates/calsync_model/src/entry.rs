//! Calendar entry model.

use crate::operation::OperationKind;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync lifecycle state of a local entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The entry matches the server's canonical state.
    Synced,
    /// A local mutation for this entry is queued and awaiting confirmation.
    Pending,
    /// The retry budget was exhausted; manual resolution is required.
    Conflict,
}

/// The kind of calendar entry.
///
/// Exactly one kind applies to an entry at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// An all-day entry without a time range.
    AllDay,
    /// A timed entry within a single day.
    Timed,
    /// A task (checkable item) on a date.
    Task,
    /// An entry spanning more than one day.
    MultiDay,
}

/// The client's materialized view of a calendar entry.
///
/// # Invariants
///
/// - `sync_status == Pending` if and only if `pending_operation` is set
/// - `sync_status == Conflict` implies `last_sync_error` is set
///
/// The mutation helpers (`mark_pending`, `mark_synced`, `mark_conflict`)
/// preserve these invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEntry {
    /// Stable identity, assigned by the server or generated locally at
    /// creation time.
    pub id: String,
    /// The calendar this entry belongs to.
    pub calendar_id: String,
    /// Entry title.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Location text.
    pub location: Option<String>,
    /// Display color.
    pub color: Option<String>,
    /// First day of the entry.
    pub start_date: NaiveDate,
    /// Last day of the entry (equal to `start_date` for single-day entries).
    pub end_date: NaiveDate,
    /// Start time for timed entries.
    pub start_time: Option<NaiveTime>,
    /// End time for timed entries.
    pub end_time: Option<NaiveTime>,
    /// Entry kind.
    pub kind: EntryKind,
    /// Current sync state.
    pub sync_status: SyncStatus,
    /// Timestamp of the last local mutation.
    pub local_updated_at: DateTime<Utc>,
    /// Mirrors whether a queued operation currently targets this entry.
    pub pending_operation: Option<OperationKind>,
    /// Present only when `sync_status == Conflict`.
    pub last_sync_error: Option<String>,
}

impl LocalEntry {
    /// Builds a synced entry from a draft, applying the draft's defaulting
    /// rules.
    ///
    /// This is the shape an entry takes when it originates from a server
    /// payload: `Synced`, no pending operation, no sync error.
    pub fn from_draft(id: impl Into<String>, calendar_id: impl Into<String>, draft: &EntryDraft) -> Self {
        let start_date = draft.start_date.unwrap_or_else(|| Utc::now().date_naive());
        Self {
            id: id.into(),
            calendar_id: calendar_id.into(),
            title: draft.title.clone().unwrap_or_default(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            color: draft.color.clone(),
            start_date,
            end_date: draft.end_date.unwrap_or(start_date),
            start_time: draft.start_time,
            end_time: draft.end_time,
            kind: draft.kind_or_default(),
            sync_status: SyncStatus::Synced,
            local_updated_at: Utc::now(),
            pending_operation: None,
            last_sync_error: None,
        }
    }

    /// Builds an optimistically inserted entry: visible immediately,
    /// `Pending` with an outstanding create.
    pub fn optimistic(id: impl Into<String>, calendar_id: impl Into<String>, draft: &EntryDraft) -> Self {
        let mut entry = Self::from_draft(id, calendar_id, draft);
        entry.mark_pending(OperationKind::Create);
        entry
    }

    /// Marks the entry as awaiting confirmation for the given operation.
    pub fn mark_pending(&mut self, kind: OperationKind) {
        self.sync_status = SyncStatus::Pending;
        self.pending_operation = Some(kind);
        self.local_updated_at = Utc::now();
    }

    /// Clears the entry back to the confirmed state.
    pub fn mark_synced(&mut self) {
        self.sync_status = SyncStatus::Synced;
        self.pending_operation = None;
        self.last_sync_error = None;
    }

    /// Moves the entry into the terminal conflict state.
    pub fn mark_conflict(&mut self, error: impl Into<String>) {
        self.sync_status = SyncStatus::Conflict;
        self.pending_operation = None;
        self.last_sync_error = Some(error.into());
    }

    /// Consumes the entry and returns it normalized to the synced state.
    ///
    /// Used when server-canonical fields overwrite the local view.
    pub fn into_synced(mut self) -> Self {
        self.mark_synced();
        self
    }
}

/// A partial entry payload.
///
/// Drafts are the replay payload of create and update operations. Every
/// field is optional; on create, unset fields default as follows:
///
/// - `title` defaults to the empty string
/// - `start_date` defaults to today (UTC), `end_date` to `start_date`
/// - `kind` defaults to `Timed` when a start time is set, else `AllDay`
///
/// On update, unset fields leave the existing value untouched (see
/// [`EntryDraft::apply_to`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    /// Target calendar. Required for create operations.
    pub calendar_id: Option<String>,
    /// Entry title.
    pub title: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Location text.
    pub location: Option<String>,
    /// Display color.
    pub color: Option<String>,
    /// First day of the entry.
    pub start_date: Option<NaiveDate>,
    /// Last day of the entry.
    pub end_date: Option<NaiveDate>,
    /// Start time for timed entries.
    pub start_time: Option<NaiveTime>,
    /// End time for timed entries.
    pub end_time: Option<NaiveTime>,
    /// Entry kind.
    pub kind: Option<EntryKind>,
}

impl EntryDraft {
    /// Creates an empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target calendar.
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = Some(calendar_id.into());
        self
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Sets the date range.
    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// Sets a single-day date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self.end_date = Some(date);
        self
    }

    /// Sets the time range.
    pub fn with_times(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Sets the entry kind explicitly.
    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Resolves the entry kind: explicit kind wins, else `Timed` when a
    /// start time is set, else `AllDay`.
    pub fn kind_or_default(&self) -> EntryKind {
        match self.kind {
            Some(kind) => kind,
            None if self.start_time.is_some() => EntryKind::Timed,
            None => EntryKind::AllDay,
        }
    }

    /// Merges the draft over an existing entry.
    ///
    /// Unset fields are left untouched; `local_updated_at` is refreshed.
    pub fn apply_to(&self, entry: &mut LocalEntry) {
        if let Some(calendar_id) = &self.calendar_id {
            entry.calendar_id = calendar_id.clone();
        }
        if let Some(title) = &self.title {
            entry.title = title.clone();
        }
        if let Some(description) = &self.description {
            entry.description = Some(description.clone());
        }
        if let Some(location) = &self.location {
            entry.location = Some(location.clone());
        }
        if let Some(color) = &self.color {
            entry.color = Some(color.clone());
        }
        if let Some(start_date) = self.start_date {
            entry.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            entry.end_date = end_date;
        }
        if let Some(start_time) = self.start_time {
            entry.start_time = Some(start_time);
        }
        if let Some(end_time) = self.end_time {
            entry.end_time = Some(end_time);
        }
        if let Some(kind) = self.kind {
            entry.kind = kind;
        }
        entry.local_updated_at = Utc::now();
    }
}
