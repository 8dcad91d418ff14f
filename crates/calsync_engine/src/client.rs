//! API client contract and per-operation execution boundary.

use crate::error::{SyncError, SyncResult};
use calsync_model::{EntryDraft, LocalEntry, OperationKind, PendingOperation};
use parking_lot::Mutex;
use std::collections::VecDeque;
use uuid::Uuid;

/// Contract for the remote calendar API.
///
/// Implementations wrap a concrete transport (HTTP fetch, desktop IPC)
/// chosen by the host at startup; the engine never branches on the
/// transport. All transport failure modes surface as [`SyncError`]s.
pub trait ApiClient: Send + Sync {
    /// Creates an entry in the given calendar and returns the server's
    /// canonical entry.
    fn create_entry(&self, calendar_id: &str, draft: &EntryDraft) -> SyncResult<LocalEntry>;

    /// Updates an entry and returns the server's canonical entry.
    fn update_entry(&self, entry_id: &str, draft: &EntryDraft) -> SyncResult<LocalEntry>;

    /// Deletes an entry.
    fn delete_entry(&self, entry_id: &str) -> SyncResult<()>;
}

/// Outcome of replaying one queued operation.
///
/// Every client failure is captured here; the flush loop never sees a
/// raw error from the transport, which keeps retry handling
/// transport-agnostic.
#[derive(Debug)]
pub enum OperationOutcome {
    /// The remote call succeeded. Create and update carry the canonical
    /// entry; delete carries nothing.
    Applied(Option<LocalEntry>),
    /// The remote call failed.
    Failed {
        /// Failure message recorded on the operation.
        message: String,
        /// Whether a retry could succeed.
        retryable: bool,
    },
}

impl OperationOutcome {
    fn from_error(error: SyncError) -> Self {
        OperationOutcome::Failed {
            retryable: error.is_retryable(),
            message: error.to_string(),
        }
    }
}

/// Translates a pending operation into exactly one remote call.
///
/// A create or update with a missing payload, or a create payload without
/// a calendar id, is a non-retryable failure rather than a panic.
pub fn execute_operation(client: &dyn ApiClient, operation: &PendingOperation) -> OperationOutcome {
    let result = match operation.kind {
        OperationKind::Create => {
            let Some(draft) = operation.payload.as_ref() else {
                return OperationOutcome::from_error(SyncError::MissingPayload("create"));
            };
            let Some(calendar_id) = draft.calendar_id.as_deref() else {
                return OperationOutcome::from_error(SyncError::MissingCalendarId);
            };
            client.create_entry(calendar_id, draft).map(Some)
        }
        OperationKind::Update => {
            let Some(draft) = operation.payload.as_ref() else {
                return OperationOutcome::from_error(SyncError::MissingPayload("update"));
            };
            client.update_entry(&operation.entry_id, draft).map(Some)
        }
        OperationKind::Delete => client.delete_entry(&operation.entry_id).map(|()| None),
    };

    match result {
        Ok(canonical) => OperationOutcome::Applied(canonical),
        Err(error) => OperationOutcome::from_error(error),
    }
}

/// One call recorded by [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// The kind of call.
    pub kind: OperationKind,
    /// The calendar id for creates, the entry id otherwise.
    pub target: String,
}

type OnCall = Box<dyn FnMut(&MockCall) + Send>;

#[derive(Default)]
struct MockClientInner {
    calls: Vec<MockCall>,
    create_responses: VecDeque<LocalEntry>,
    update_responses: VecDeque<LocalEntry>,
    failure: Option<(String, bool)>,
}

/// A scripted API client for testing.
///
/// By default every call succeeds; create and update echo a canonical
/// entry built from the draft (creates get a fresh server id). Responses
/// can be scripted per call and a blanket failure mode can be toggled.
#[derive(Default)]
pub struct MockClient {
    inner: Mutex<MockClientInner>,
    on_call: Mutex<Option<OnCall>>,
}

impl MockClient {
    /// Creates a client whose calls all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded calls in invocation order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().calls.clone()
    }

    /// Queues the canonical entry returned by the next create call.
    pub fn respond_to_create(&self, entry: LocalEntry) {
        self.inner.lock().create_responses.push_back(entry);
    }

    /// Queues the canonical entry returned by the next update call.
    pub fn respond_to_update(&self, entry: LocalEntry) {
        self.inner.lock().update_responses.push_back(entry);
    }

    /// Makes every subsequent call fail.
    pub fn fail_with(&self, message: impl Into<String>, retryable: bool) {
        self.inner.lock().failure = Some((message.into(), retryable));
    }

    /// Clears the failure mode.
    pub fn succeed(&self) {
        self.inner.lock().failure = None;
    }

    /// Installs a hook invoked on every call, after it is recorded.
    ///
    /// The hook is not re-entered: calls made from inside the hook skip
    /// it.
    pub fn on_call(&self, hook: impl FnMut(&MockCall) + Send + 'static) {
        *self.on_call.lock() = Some(Box::new(hook));
    }

    /// Records the call, fires the hook, and returns the scripted
    /// failure if one is set.
    fn begin(&self, call: MockCall) -> SyncResult<()> {
        let failure = {
            let mut inner = self.inner.lock();
            inner.calls.push(call.clone());
            inner.failure.clone()
        };

        // Take the hook out while it runs so re-entrant calls skip it
        // instead of deadlocking.
        let hook = self.on_call.lock().take();
        if let Some(mut hook) = hook {
            hook(&call);
            *self.on_call.lock() = Some(hook);
        }

        match failure {
            Some((message, retryable)) => Err(SyncError::Transport { message, retryable }),
            None => Ok(()),
        }
    }
}

impl ApiClient for MockClient {
    fn create_entry(&self, calendar_id: &str, draft: &EntryDraft) -> SyncResult<LocalEntry> {
        self.begin(MockCall {
            kind: OperationKind::Create,
            target: calendar_id.to_string(),
        })?;

        let scripted = self.inner.lock().create_responses.pop_front();
        Ok(scripted
            .unwrap_or_else(|| LocalEntry::from_draft(Uuid::new_v4().to_string(), calendar_id, draft)))
    }

    fn update_entry(&self, entry_id: &str, draft: &EntryDraft) -> SyncResult<LocalEntry> {
        self.begin(MockCall {
            kind: OperationKind::Update,
            target: entry_id.to_string(),
        })?;

        let scripted = self.inner.lock().update_responses.pop_front();
        Ok(scripted.unwrap_or_else(|| {
            LocalEntry::from_draft(entry_id, draft.calendar_id.clone().unwrap_or_default(), draft)
        }))
    }

    fn delete_entry(&self, entry_id: &str) -> SyncResult<()> {
        self.begin(MockCall {
            kind: OperationKind::Delete,
            target: entry_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft() -> EntryDraft {
        EntryDraft::new()
            .with_calendar_id("work")
            .with_title("Standup")
            .with_date("2024-03-01".parse::<NaiveDate>().unwrap())
    }

    #[test]
    fn create_without_payload_fails_fast() {
        let client = MockClient::new();
        let mut op = PendingOperation::create("e1", draft());
        op.payload = None;

        match execute_operation(&client, &op) {
            OperationOutcome::Failed { retryable, .. } => assert!(!retryable),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(client.calls().is_empty());
    }

    #[test]
    fn create_without_calendar_id_fails_fast() {
        let client = MockClient::new();
        let op = PendingOperation::create("e1", EntryDraft::new().with_title("no calendar"));

        match execute_operation(&client, &op) {
            OperationOutcome::Failed { retryable, .. } => assert!(!retryable),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn delete_applies_without_entry() {
        let client = MockClient::new();
        let op = PendingOperation::delete("e1");

        match execute_operation(&client, &op) {
            OperationOutcome::Applied(entry) => assert!(entry.is_none()),
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(
            client.calls(),
            vec![MockCall {
                kind: OperationKind::Delete,
                target: "e1".into()
            }]
        );
    }

    #[test]
    fn transport_error_becomes_failed_outcome() {
        let client = MockClient::new();
        client.fail_with("gateway timeout", true);

        let op = PendingOperation::update("e1", draft());
        match execute_operation(&client, &op) {
            OperationOutcome::Failed { message, retryable } => {
                assert!(retryable);
                assert!(message.contains("gateway timeout"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn scripted_create_response_wins_over_echo() {
        let client = MockClient::new();
        let canonical = LocalEntry::from_draft("e1", "work", &draft());
        client.respond_to_create(canonical.clone());

        let result = client.create_entry("work", &draft()).unwrap();
        assert_eq!(result.id, "e1");

        // With nothing scripted, the echo assigns a fresh server id
        let echoed = client.create_entry("work", &draft()).unwrap();
        assert_ne!(echoed.id, "e1");
        assert_eq!(echoed.title, "Standup");
    }
}
