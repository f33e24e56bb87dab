//! Moderation events, the fundamental unit of the Hammer ledger.
//!
//! An event is an immutable record that a subject was banned or unbanned at a
//! point in time, optionally until some later instant. Events are never
//! updated or deleted; lifting a ban is expressed by appending an
//! [`EventKind::Unban`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// What a moderation event does to its subject.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
  Ban,
  Unban,
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A persisted moderation event. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  /// Store-assigned, strictly increasing in creation order.
  pub id:         i64,
  /// Ledger-assigned creation time, second precision.
  pub created_at: DateTime<Utc>,
  /// The player name this event applies to. Matched case-insensitively.
  pub subject:    String,
  /// The operator who issued the event.
  pub issued_by:  String,
  pub kind:       EventKind,
  /// Free text; may be empty.
  #[serde(default)]
  pub reason:     String,
  /// `None` means the event never expires.
  pub expires_at: Option<DateTime<Utc>>,
}

impl Event {
  /// Whether this event still applies at `now`.
  pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
    is_active(self.expires_at, now)
  }

  pub fn is_ban(&self) -> bool { self.kind == EventKind::Ban }
}

// ─── NewEvent ────────────────────────────────────────────────────────────────

/// A pending event, built by the ledger and offered to pre-commit hooks.
/// Becomes an [`Event`] once the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
  pub created_at: DateTime<Utc>,
  pub subject:    String,
  pub issued_by:  String,
  pub kind:       EventKind,
  pub reason:     String,
  pub expires_at: Option<DateTime<Utc>>,
}

impl NewEvent {
  pub fn into_event(self, id: i64) -> Event {
    Event {
      id,
      created_at: self.created_at,
      subject: self.subject,
      issued_by: self.issued_by,
      kind: self.kind,
      reason: self.reason,
      expires_at: self.expires_at,
    }
  }
}

/// An event is active iff it never expires or expires strictly after `now`.
pub fn is_active(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
  expires_at.is_none_or(|at| at > now)
}

/// Normalise a subject name for use as a map key. Mirrors SQLite's `NOCASE`
/// collation, which folds ASCII only.
pub fn subject_key(subject: &str) -> String { subject.to_ascii_lowercase() }
