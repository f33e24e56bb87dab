//! The `EventStore` trait: the persistence collaborator behind the ledger.
//!
//! The trait is implemented by storage backends (e.g. `hammer-store-sqlite`).
//! The ledger depends on this abstraction, never on a concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::event::{Event, NewEvent};

/// Abstraction over an append-only moderation event table.
///
/// Subject matching is case-insensitive in every query. Implementations never
/// update or delete a row once inserted.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait EventStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create the backing tables and indices unless they already exist.
  fn create_schema(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Persist a pending event and return the id assigned to it. Ids are
  /// strictly increasing in insertion order.
  fn insert<'a>(
    &'a self,
    event: &'a NewEvent,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// All events for `subject`, ordered by id ascending.
  fn query_by_subject<'a>(
    &'a self,
    subject: &'a str,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + 'a;

  /// The highest-id event for `subject` that is active at `now`, if any.
  fn query_active<'a>(
    &'a self,
    subject: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + 'a;
}
