//! Local entry store contract and in-memory implementation.

use crate::error::SyncResult;
use calsync_model::{LocalEntry, PendingOperation};
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Contract for the durable local store consumed by the engine.
///
/// The store holds two tables: the entry table (keyed by entry id, with a
/// date-bucket secondary index) and the queue table of pending operations
/// (insertion-ordered).
///
/// The engine and reconciler are the only writers; UI collaborators read
/// through these accessors and mutate exclusively via
/// [`SyncEngine::queue_operation`](crate::SyncEngine::queue_operation).
pub trait EntryStore: Send + Sync {
    /// Looks up an entry by id.
    fn entry(&self, id: &str) -> SyncResult<Option<LocalEntry>>;

    /// Inserts or overwrites an entry.
    ///
    /// The date index is rebuilt for the entry: its id is removed from
    /// every other date bucket and filed under the entry's start date, so
    /// an id lives under exactly one date key at a time.
    fn upsert_entry(&self, entry: LocalEntry) -> SyncResult<()>;

    /// Removes an entry by id. Removing an absent id is a no-op.
    fn remove_entry(&self, id: &str) -> SyncResult<()>;

    /// Returns the entries filed under a date, in insertion order.
    fn entries_on(&self, date: NaiveDate) -> SyncResult<Vec<LocalEntry>>;

    /// Inserts or overwrites a queued operation.
    ///
    /// Overwriting (same operation id) keeps the operation's queue
    /// position; it is how retry bookkeeping is persisted.
    fn put_operation(&self, operation: PendingOperation) -> SyncResult<()>;

    /// Removes a queued operation by id. Absent ids are a no-op.
    fn remove_operation(&self, id: Uuid) -> SyncResult<()>;

    /// Returns all queued operations in storage (insertion) order.
    fn queued_operations(&self) -> SyncResult<Vec<PendingOperation>>;

    /// Returns the number of queued operations.
    fn queued_count(&self) -> SyncResult<usize>;
}

#[derive(Default)]
struct MemoryStoreInner {
    entries: HashMap<String, LocalEntry>,
    buckets: BTreeMap<NaiveDate, Vec<String>>,
    queue: Vec<PendingOperation>,
}

impl MemoryStoreInner {
    fn unindex(&mut self, id: &str) {
        for ids in self.buckets.values_mut() {
            ids.retain(|existing| existing != id);
        }
        self.buckets.retain(|_, ids| !ids.is_empty());
    }
}

/// An in-memory [`EntryStore`].
///
/// Useful for tests and as the reference implementation of the store
/// contract; a host application typically substitutes a persistent table.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries.
    pub fn entry_count(&self) -> usize {
        self.inner.read().entries.len()
    }
}

impl EntryStore for MemoryStore {
    fn entry(&self, id: &str) -> SyncResult<Option<LocalEntry>> {
        Ok(self.inner.read().entries.get(id).cloned())
    }

    fn upsert_entry(&self, entry: LocalEntry) -> SyncResult<()> {
        let mut inner = self.inner.write();
        inner.unindex(&entry.id);
        inner
            .buckets
            .entry(entry.start_date)
            .or_default()
            .push(entry.id.clone());
        inner.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    fn remove_entry(&self, id: &str) -> SyncResult<()> {
        let mut inner = self.inner.write();
        inner.unindex(id);
        inner.entries.remove(id);
        Ok(())
    }

    fn entries_on(&self, date: NaiveDate) -> SyncResult<Vec<LocalEntry>> {
        let inner = self.inner.read();
        let entries = inner
            .buckets
            .get(&date)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.entries.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    fn put_operation(&self, operation: PendingOperation) -> SyncResult<()> {
        let mut inner = self.inner.write();
        match inner.queue.iter_mut().find(|op| op.id == operation.id) {
            Some(existing) => *existing = operation,
            None => inner.queue.push(operation),
        }
        Ok(())
    }

    fn remove_operation(&self, id: Uuid) -> SyncResult<()> {
        self.inner.write().queue.retain(|op| op.id != id);
        Ok(())
    }

    fn queued_operations(&self) -> SyncResult<Vec<PendingOperation>> {
        Ok(self.inner.read().queue.clone())
    }

    fn queued_count(&self) -> SyncResult<usize> {
        Ok(self.inner.read().queue.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsync_model::EntryDraft;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn entry_on(id: &str, day: &str) -> LocalEntry {
        LocalEntry::from_draft(id, "c1", &EntryDraft::new().with_date(date(day)))
    }

    #[test]
    fn upsert_and_get() {
        let store = MemoryStore::new();
        store.upsert_entry(entry_on("e1", "2024-03-01")).unwrap();

        let found = store.entry("e1").unwrap().unwrap();
        assert_eq!(found.id, "e1");
        assert!(store.entry("missing").unwrap().is_none());
    }

    #[test]
    fn upsert_moves_between_date_buckets() {
        let store = MemoryStore::new();
        store.upsert_entry(entry_on("e1", "2024-03-01")).unwrap();
        assert_eq!(store.entries_on(date("2024-03-01")).unwrap().len(), 1);

        // Same id, new date: the old bucket must be vacated
        store.upsert_entry(entry_on("e1", "2024-04-15")).unwrap();
        assert!(store.entries_on(date("2024-03-01")).unwrap().is_empty());
        assert_eq!(store.entries_on(date("2024-04-15")).unwrap().len(), 1);
        assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn remove_entry_is_idempotent() {
        let store = MemoryStore::new();
        store.upsert_entry(entry_on("e1", "2024-03-01")).unwrap();

        store.remove_entry("e1").unwrap();
        store.remove_entry("e1").unwrap();

        assert!(store.entry("e1").unwrap().is_none());
        assert!(store.entries_on(date("2024-03-01")).unwrap().is_empty());
    }

    #[test]
    fn queue_preserves_insertion_order() {
        let store = MemoryStore::new();
        store.put_operation(PendingOperation::delete("a")).unwrap();
        store.put_operation(PendingOperation::delete("b")).unwrap();
        store.put_operation(PendingOperation::delete("c")).unwrap();

        let ids: Vec<_> = store
            .queued_operations()
            .unwrap()
            .into_iter()
            .map(|op| op.entry_id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(store.queued_count().unwrap(), 3);
    }

    #[test]
    fn put_operation_updates_in_place() {
        let store = MemoryStore::new();
        let first = PendingOperation::delete("a");
        let id = first.id;
        store.put_operation(first.clone()).unwrap();
        store.put_operation(PendingOperation::delete("b")).unwrap();

        let mut updated = first;
        updated.record_failure("timeout");
        store.put_operation(updated).unwrap();

        let queue = store.queued_operations().unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].id, id);
        assert_eq!(queue[0].retry_count, 1);
    }
}
