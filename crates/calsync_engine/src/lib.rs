//! # Calsync Engine
//!
//! Offline sync engine for calendar entries.
//!
//! This crate provides:
//! - [`SyncEngine`]: queueing of local mutations, serialized flush
//!   passes with bounded retries, connectivity handling, and status
//!   listeners
//! - [`Reconciler`]: applies server-pushed live updates exactly once,
//!   distinguishing echoes of this client's own writes from genuine
//!   remote changes
//! - [`EntryStore`] and [`ApiClient`]: the narrow contracts the engine
//!   consumes, with [`MemoryStore`] and [`MockClient`] implementations
//!
//! ## Architecture
//!
//! The engine implements an **optimistic-write, confirmed-by-echo**
//! model: local mutations are applied to the store immediately and
//! queued; the queue is replayed oldest-first against the API client;
//! the server echoes every committed change back over a push channel,
//! and the reconciler decides per event whether it confirms a pending
//! local operation or represents an independent remote change.
//!
//! ## Key invariants
//!
//! - The server is the single source of truth
//! - Queue replay is strictly creation-order
//! - At most one flush pass runs at a time
//! - Event application is idempotent (redelivery-safe)
//! - An entry is `Pending` exactly when an operation for it is queued

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod engine;
mod error;
mod reconcile;
mod store;

pub use client::{execute_operation, ApiClient, MockCall, MockClient, OperationOutcome};
pub use config::{EngineConfig, RetryConfig};
pub use engine::{EngineStatus, ListenerGuard, SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use reconcile::Reconciler;
pub use store::{EntryStore, MemoryStore};
