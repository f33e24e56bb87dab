//! [`SqliteStore`]: the SQLite implementation of [`EventStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use hammer_core::{
  event::{Event, NewEvent},
  store::EventStore,
};

use crate::{
  Result,
  encode::{EVENT_COLUMNS, RawEvent, encode_dt, encode_expiry},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Hammer event ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    debug!("schema initialised");
    Ok(())
  }
}

// ─── EventStore impl ─────────────────────────────────────────────────────────

impl EventStore for SqliteStore {
  type Error = crate::Error;

  async fn create_schema(&self) -> Result<()> { self.init_schema().await }

  async fn insert(&self, event: &NewEvent) -> Result<i64> {
    let created_at = encode_dt(event.created_at);
    let subject    = event.subject.clone();
    let issued_by  = event.issued_by.clone();
    let kind       = event.kind.as_ref().to_owned();
    let reason     = event.reason.clone();
    let expires_at = encode_expiry(event.expires_at);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO events (created_at, subject, issued_by, kind, reason, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![created_at, subject, issued_by, kind, reason, expires_at],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(id)
  }

  async fn query_by_subject(&self, subject: &str) -> Result<Vec<Event>> {
    let subject = subject.to_owned();

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM events WHERE subject = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![subject], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn query_active(&self, subject: &str, now: DateTime<Utc>) -> Result<Option<Event>> {
    let subject = subject.to_owned();
    let now     = encode_dt(now);

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE subject = ?1
                   AND (expires_at = 0 OR expires_at > ?2)
                 ORDER BY id DESC
                 LIMIT 1"
              ),
              rusqlite::params![subject, now],
              RawEvent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }
}
