//! The event ledger: the only writer of moderation events.
//!
//! Writes go through [`Ledger::append`], which runs pre-commit hooks, persists
//! via the [`EventStore`], then runs post-commit hooks before returning. Reads
//! are thin wrappers over the store that pin "now" to the ledger's clock.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  clock::{Clock, SystemClock},
  event::{Event, EventKind, NewEvent},
  hooks::{HookDecision, PostCommitHook, PreCommitHook},
  store::EventStore,
  timespec::parse_duration,
};

/// The outcome of [`Ledger::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
  Committed(Event),
  /// A pre-commit hook vetoed the event. Nothing was persisted.
  Cancelled,
}

impl Appended {
  pub fn event(&self) -> Option<&Event> {
    match self {
      Self::Committed(event) => Some(event),
      Self::Cancelled => None,
    }
  }

  pub fn into_event(self) -> Option<Event> {
    match self {
      Self::Committed(event) => Some(event),
      Self::Cancelled => None,
    }
  }
}

pub struct Ledger<S> {
  store:       Arc<S>,
  clock:       Arc<dyn Clock>,
  pre_commit:  Vec<Arc<dyn PreCommitHook>>,
  post_commit: Vec<Arc<dyn PostCommitHook>>,
}

impl<S: EventStore> Ledger<S> {
  pub fn new(store: Arc<S>) -> Self { Self::with_clock(store, Arc::new(SystemClock)) }

  pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
    Self { store, clock, pre_commit: Vec::new(), post_commit: Vec::new() }
  }

  /// Register a pre-commit hook. Hooks run in registration order.
  pub fn pre_commit(mut self, hook: Arc<dyn PreCommitHook>) -> Self {
    self.pre_commit.push(hook);
    self
  }

  /// Register a post-commit hook. Hooks run in registration order.
  pub fn post_commit(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
    self.post_commit.push(hook);
    self
  }

  pub fn clock(&self) -> &Arc<dyn Clock> { &self.clock }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Record a new event for `subject`.
  ///
  /// Returns [`Appended::Cancelled`] if any pre-commit hook vetoes it.
  /// Post-commit hooks have all finished by the time this returns.
  pub async fn append(
    &self,
    subject: &str,
    issued_by: &str,
    kind: EventKind,
    reason: &str,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
  ) -> Result<Appended> {
    let pending = NewEvent {
      created_at: self.clock.now(),
      subject: subject.to_owned(),
      issued_by: issued_by.to_owned(),
      kind,
      reason: reason.to_owned(),
      expires_at,
    };

    if self
      .pre_commit
      .iter()
      .any(|hook| hook.pre_commit(&pending) == HookDecision::Cancel)
    {
      info!(%subject, %kind, "event cancelled by pre-commit hook");
      return Ok(Appended::Cancelled);
    }

    let id = self.store.insert(&pending).await.map_err(Error::storage)?;
    let event = pending.into_event(id);
    info!(
      id,
      subject = %event.subject,
      issued_by = %event.issued_by,
      kind = %event.kind,
      expires_at = ?event.expires_at,
      "event committed"
    );

    for hook in &self.post_commit {
      if let Err(e) = hook.post_commit(&event).await {
        warn!(id, error = %e, "post-commit hook failed");
      }
    }

    Ok(Appended::Committed(event))
  }

  pub async fn ban(&self, subject: &str, issued_by: &str, reason: &str) -> Result<Appended> {
    self.append(subject, issued_by, EventKind::Ban, reason, None).await
  }

  pub async fn unban(&self, subject: &str, issued_by: &str, reason: &str) -> Result<Appended> {
    self.append(subject, issued_by, EventKind::Unban, reason, None).await
  }

  /// Ban for the duration described by `duration` (see [`crate::timespec`]).
  /// A duration that sums to zero yields a permanent ban.
  pub async fn temp_ban(
    &self,
    subject: &str,
    issued_by: &str,
    reason: &str,
    duration: &str,
  ) -> Result<Appended> {
    let expires_at = parse_duration(duration, self.clock.now());
    self.append(subject, issued_by, EventKind::Ban, reason, expires_at).await
  }

  /// Unban for the duration described by `duration`; when it lapses, whatever
  /// event was active before applies again.
  pub async fn temp_unban(
    &self,
    subject: &str,
    issued_by: &str,
    reason: &str,
    duration: &str,
  ) -> Result<Appended> {
    let expires_at = parse_duration(duration, self.clock.now());
    self.append(subject, issued_by, EventKind::Unban, reason, expires_at).await
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  /// Every event for `subject`, oldest first, or `None` if there are none.
  pub async fn history(&self, subject: &str) -> Result<Option<Vec<Event>>> {
    let events = self.store.query_by_subject(subject).await.map_err(Error::storage)?;
    debug!(%subject, count = events.len(), "loaded history");
    Ok((!events.is_empty()).then_some(events))
  }

  /// The highest-id event for `subject` that is still active, of either kind.
  pub async fn active_event(&self, subject: &str) -> Result<Option<Event>> {
    self
      .store
      .query_active(subject, self.clock.now())
      .await
      .map_err(Error::storage)
  }
}
