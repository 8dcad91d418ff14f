//! Sync engine orchestration: queueing, flush passes, connectivity.

use crate::client::{execute_operation, ApiClient, OperationOutcome};
use crate::config::EngineConfig;
use crate::error::SyncResult;
use crate::store::EntryStore;
use calsync_model::{
    sort_by_created_at, EntryDraft, LocalEntry, OperationKind, PendingOperation,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Snapshot of the engine's reactive flags, delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// Whether the engine considers itself connected.
    pub online: bool,
    /// Whether a flush pass is currently executing.
    pub syncing: bool,
}

/// Statistics about engine activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed flush passes.
    pub passes_completed: u64,
    /// Operations confirmed by the server.
    pub operations_applied: u64,
    /// Failed replay attempts (including ones that were later retried).
    pub operations_failed: u64,
    /// Operations that exhausted their retry budget.
    pub conflicts: u64,
    /// Most recent terminal error message.
    pub last_error: Option<String>,
    /// When the last flush pass finished.
    pub last_flush_at: Option<Instant>,
}

type Listener = Arc<dyn Fn(EngineStatus) + Send + Sync>;
type ListenerRegistry = Mutex<Vec<(u64, Listener)>>;

/// Unsubscribes its listener when dropped.
///
/// Listener registrations are scoped resources: acquire on subscribe,
/// release on drop, so a torn-down UI binding cannot leak callbacks.
#[must_use = "dropping the guard immediately unsubscribes the listener"]
pub struct ListenerGuard {
    registry: Weak<ListenerRegistry>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

/// The offline sync engine.
///
/// The engine is the single authority for connectivity transitions and
/// for replaying the pending-operation queue against the API client. It
/// is the only writer of the entry store, together with the
/// [`Reconciler`](crate::Reconciler) it shares the store with; UI
/// collaborators read through accessors and mutate via
/// [`queue_operation`](Self::queue_operation).
///
/// Flush passes are serialized: a [`sync_pending`](Self::sync_pending)
/// call while a pass is running requests a re-run and returns instead of
/// starting a second pass, so no two passes ever replay the same queue
/// concurrently.
///
/// Every entry point is synchronous. In particular, an enqueue while
/// online runs the flush pass on the calling thread before returning;
/// hosts that want a non-blocking enqueue call
/// [`queue_operation`](Self::queue_operation) from a background task.
pub struct SyncEngine<S: EntryStore> {
    config: EngineConfig,
    store: Arc<S>,
    client: RwLock<Option<Arc<dyn ApiClient>>>,
    online: AtomicBool,
    syncing: AtomicBool,
    rerun_requested: AtomicBool,
    listeners: Arc<ListenerRegistry>,
    next_listener_id: AtomicU64,
    stats: RwLock<SyncStats>,
}

impl<S: EntryStore> SyncEngine<S> {
    /// Creates an engine with no API client bound.
    ///
    /// The engine starts online; hosts should feed the platform's
    /// connectivity signal through [`set_online`](Self::set_online).
    pub fn new(config: EngineConfig, store: Arc<S>) -> Self {
        Self {
            config,
            store,
            client: RwLock::new(None),
            online: AtomicBool::new(true),
            syncing: AtomicBool::new(false),
            rerun_requested: AtomicBool::new(false),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(0),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Creates an engine bound to a client.
    pub fn with_client(config: EngineConfig, store: Arc<S>, client: Arc<dyn ApiClient>) -> Self {
        let engine = Self::new(config, store);
        *engine.client.write() = Some(client);
        engine
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Binds the API client if none is bound yet.
    ///
    /// The engine pins to whichever client bound first; a rebind with a
    /// different client is a no-op until [`reset_client`](Self::reset_client).
    pub fn bind_client(&self, client: Arc<dyn ApiClient>) {
        let mut slot = self.client.write();
        if slot.is_some() {
            debug!("api client already bound; ignoring rebind");
            return;
        }
        *slot = Some(client);
    }

    /// Clears the client binding.
    pub fn reset_client(&self) {
        *self.client.write() = None;
    }

    /// Returns true if an API client is bound.
    pub fn has_client(&self) -> bool {
        self.client.read().is_some()
    }

    /// Returns the current connectivity flag.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns true while a flush pass is executing.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Returns the number of queued operations.
    pub fn pending_count(&self) -> SyncResult<usize> {
        self.store.queued_count()
    }

    /// Returns a snapshot of the engine statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Registers a listener invoked synchronously whenever the online or
    /// syncing flag flips.
    ///
    /// Callbacks run outside the registry lock, so a listener may call
    /// back into the engine; a flush on reconnect is the typical case.
    pub fn subscribe(&self, callback: impl Fn(EngineStatus) + Send + Sync + 'static) -> ListenerGuard {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::new(callback)));
        ListenerGuard {
            registry: Arc::downgrade(&self.listeners),
            id,
        }
    }

    /// Records a connectivity transition.
    ///
    /// A transition notifies subscribers; coming back online triggers a
    /// flush of whatever queued up while disconnected.
    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return;
        }
        info!(online, "connectivity changed");
        self.notify();

        if online {
            if let Err(error) = self.sync_pending() {
                warn!(%error, "flush after reconnect failed");
            }
        }
    }

    /// Durably enqueues a mutation and, when online, flushes the queue.
    ///
    /// Only the durable enqueue can fail here; losing an enqueue
    /// silently would lose user data. Failures of the network round trip
    /// never propagate to the caller; they surface as entry sync state.
    /// The flush runs on the calling thread; hosts wanting fire-and-forget
    /// semantics invoke this from a background task.
    pub fn queue_operation(
        &self,
        entry_id: &str,
        kind: OperationKind,
        payload: Option<EntryDraft>,
    ) -> SyncResult<()> {
        let operation = PendingOperation::new(entry_id, kind, payload);
        self.store.put_operation(operation.clone())?;
        self.mirror_pending_state(entry_id, &operation)?;
        debug!(entry_id, kind = kind.as_str(), "operation queued");

        if self.is_online() {
            if let Err(error) = self.sync_pending() {
                warn!(%error, "flush after enqueue failed");
            }
        }
        Ok(())
    }

    /// Reflects a freshly queued operation on the targeted entry.
    fn mirror_pending_state(&self, entry_id: &str, operation: &PendingOperation) -> SyncResult<()> {
        match self.store.entry(entry_id)? {
            Some(mut entry) => {
                // Updates show their new field values immediately; the
                // server's echo later overwrites with canonical state.
                if operation.kind == OperationKind::Update {
                    if let Some(draft) = operation.payload.as_ref() {
                        draft.apply_to(&mut entry);
                    }
                }
                entry.mark_pending(operation.kind);
                self.store.upsert_entry(entry)
            }
            None => {
                // A create for an unseen id materializes the optimistic
                // entry so the UI can show it immediately.
                if operation.kind == OperationKind::Create {
                    if let Some(draft) = operation.payload.as_ref() {
                        let calendar_id = draft.calendar_id.clone().unwrap_or_default();
                        let entry = LocalEntry::optimistic(entry_id, calendar_id, draft);
                        return self.store.upsert_entry(entry);
                    }
                }
                Ok(())
            }
        }
    }

    /// Runs a flush pass, serialized against concurrent callers.
    ///
    /// When offline this is a no-op that leaves the queue untouched. A
    /// call that finds a pass already running requests a re-run and
    /// returns; the running pass re-executes before finishing, so work
    /// enqueued mid-flush is never lost.
    pub fn sync_pending(&self) -> SyncResult<()> {
        if !self.is_online() {
            debug!("offline; flush skipped");
            return Ok(());
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.rerun_requested.store(true, Ordering::SeqCst);
            debug!("flush already running; queued a re-run");
            return Ok(());
        }
        self.notify();

        let mut result = Ok(());
        loop {
            if let Err(error) = self.run_pass() {
                result = Err(error);
            }
            self.syncing.store(false, Ordering::SeqCst);
            self.notify();

            if self.rerun_requested.swap(false, Ordering::SeqCst)
                && self.is_online()
                && self
                    .syncing
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                self.notify();
                continue;
            }
            break;
        }
        result
    }

    /// One traversal of the queue in creation order.
    fn run_pass(&self) -> SyncResult<()> {
        let client = self.client.read().clone();
        let Some(client) = client else {
            warn!("no api client bound; leaving queue untouched");
            return Ok(());
        };

        let mut operations = self.store.queued_operations()?;
        sort_by_created_at(&mut operations);
        debug!(count = operations.len(), "flush pass started");

        for operation in operations {
            // Stop launching new calls once connectivity is observed
            // lost; remaining operations stay queued for the next
            // online transition.
            if !self.is_online() {
                debug!("went offline mid-pass; stopping");
                break;
            }

            match execute_operation(client.as_ref(), &operation) {
                OperationOutcome::Applied(canonical) => {
                    self.complete_operation(&operation, canonical)?;
                }
                OperationOutcome::Failed { message, retryable } => {
                    self.fail_operation(operation, message, retryable)?;
                }
            }
        }

        let mut stats = self.stats.write();
        stats.passes_completed += 1;
        stats.last_flush_at = Some(Instant::now());
        Ok(())
    }

    /// Dequeues a confirmed operation and settles the entry.
    fn complete_operation(
        &self,
        operation: &PendingOperation,
        canonical: Option<LocalEntry>,
    ) -> SyncResult<()> {
        self.store.remove_operation(operation.id)?;

        match operation.kind {
            OperationKind::Create | OperationKind::Update => {
                if let Some(remote) = canonical {
                    // The server may have assigned a new id to a locally
                    // created entry; retire the temporary one.
                    if remote.id != operation.entry_id {
                        self.store.remove_entry(&operation.entry_id)?;
                    }
                    self.store.upsert_entry(remote.into_synced())?;
                } else if let Some(mut entry) = self.store.entry(&operation.entry_id)? {
                    entry.mark_synced();
                    self.store.upsert_entry(entry)?;
                }
            }
            OperationKind::Delete => {
                self.store.remove_entry(&operation.entry_id)?;
            }
        }

        debug!(
            entry_id = %operation.entry_id,
            kind = operation.kind.as_str(),
            "operation confirmed"
        );
        self.stats.write().operations_applied += 1;
        Ok(())
    }

    /// Handles a failed replay: retry bookkeeping or escalation to the
    /// terminal conflict state.
    fn fail_operation(
        &self,
        mut operation: PendingOperation,
        message: String,
        retryable: bool,
    ) -> SyncResult<()> {
        self.stats.write().operations_failed += 1;

        if retryable && operation.retry_count < self.config.max_retries {
            operation.record_failure(message.as_str());
            let delay = self.config.retry.delay_for_attempt(operation.retry_count);
            debug!(
                entry_id = %operation.entry_id,
                kind = operation.kind.as_str(),
                retry_count = operation.retry_count,
                suggested_delay_ms = delay.as_millis() as u64,
                "operation failed; kept queued for the next flush trigger"
            );
            self.store.put_operation(operation)?;
        } else {
            warn!(
                entry_id = %operation.entry_id,
                kind = operation.kind.as_str(),
                error = %message,
                "giving up on operation; marking entry conflicted"
            );
            self.store.remove_operation(operation.id)?;
            if let Some(mut entry) = self.store.entry(&operation.entry_id)? {
                entry.mark_conflict(message.as_str());
                self.store.upsert_entry(entry)?;
            }
            let mut stats = self.stats.write();
            stats.conflicts += 1;
            stats.last_error = Some(message);
        }
        Ok(())
    }

    /// Invokes all listeners with the current status snapshot.
    ///
    /// The registry lock is released before any callback runs, so a
    /// listener re-entering the engine (or a guard dropping on another
    /// thread) cannot deadlock against it.
    fn notify(&self) {
        let status = EngineStatus {
            online: self.is_online(),
            syncing: self.is_syncing(),
        };
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(status);
        }
    }
}
