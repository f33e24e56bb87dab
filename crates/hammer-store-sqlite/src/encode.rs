//! Encoding and decoding helpers between ledger types and SQLite columns.
//!
//! Timestamps are stored as integer Unix seconds. A missing expiry is stored
//! as `0` so the active-event query can stay a single indexed comparison.

use chrono::{DateTime, Utc};
use hammer_core::event::{Event, EventKind};

use crate::{Error, Result};

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> i64 { dt.timestamp() }

pub fn decode_dt(id: i64, secs: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(secs, 0).ok_or(Error::Timestamp { id, secs })
}

pub fn encode_expiry(expires_at: Option<DateTime<Utc>>) -> i64 {
  expires_at.map_or(0, encode_dt)
}

pub fn decode_expiry(id: i64, secs: i64) -> Result<Option<DateTime<Utc>>> {
  if secs == 0 { Ok(None) } else { decode_dt(id, secs).map(Some) }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawEvent::from_row`].
pub const EVENT_COLUMNS: &str = "id, created_at, subject, issued_by, kind, reason, expires_at";

/// Raw values read directly from an `events` row.
pub struct RawEvent {
  pub id:         i64,
  pub created_at: i64,
  pub subject:    String,
  pub issued_by:  String,
  pub kind:       String,
  pub reason:     String,
  pub expires_at: i64,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      created_at: row.get(1)?,
      subject:    row.get(2)?,
      issued_by:  row.get(3)?,
      kind:       row.get(4)?,
      reason:     row.get(5)?,
      expires_at: row.get(6)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    let kind: EventKind = self
      .kind
      .parse()
      .map_err(|_| Error::UnknownKind { id: self.id, kind: self.kind.clone() })?;

    Ok(Event {
      id: self.id,
      created_at: decode_dt(self.id, self.created_at)?,
      subject: self.subject,
      issued_by: self.issued_by,
      kind,
      reason: self.reason,
      expires_at: decode_expiry(self.id, self.expires_at)?,
    })
  }
}
