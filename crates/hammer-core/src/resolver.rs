//! Ban status resolution across the local ledger and external authorities.
//!
//! Computing a verdict and remembering *why* are kept apart: every positive
//! check records its decisive event in a per-subject cache, which callers read
//! back through [`Resolver::decisive_event`] (e.g. to build a kick message)
//! without re-running the check.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  event::{Event, subject_key},
  hooks::ExternalAuthority,
  ledger::Ledger,
  store::EventStore,
};

pub const DEFAULT_AUTHORITY_TIMEOUT: Duration = Duration::from_secs(2);

/// Which side of the resolver produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictSource {
  Local,
  External,
}

/// The derived ban status for a subject; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVerdict {
  pub is_banned:      bool,
  pub decisive_event: Option<Event>,
  pub source:         Option<VerdictSource>,
}

pub struct Resolver<S> {
  ledger:            Arc<Ledger<S>>,
  authorities:       Vec<Arc<dyn ExternalAuthority>>,
  authority_timeout: Duration,
  decisions:         DashMap<String, Event>,
}

impl<S: EventStore> Resolver<S> {
  pub fn new(ledger: Arc<Ledger<S>>) -> Self {
    Self {
      ledger,
      authorities: Vec::new(),
      authority_timeout: DEFAULT_AUTHORITY_TIMEOUT,
      decisions: DashMap::new(),
    }
  }

  /// Register an external authority. Authorities are consulted in
  /// registration order.
  pub fn authority(mut self, authority: Arc<dyn ExternalAuthority>) -> Self {
    self.authorities.push(authority);
    self
  }

  /// Upper bound on how long a single authority may take to answer.
  pub fn authority_timeout(mut self, timeout: Duration) -> Self {
    self.authority_timeout = timeout;
    self
  }

  pub fn ledger(&self) -> &Arc<Ledger<S>> { &self.ledger }

  // ── Checks ──────────────────────────────────────────────────────────────

  /// Whether `subject` is banned locally or by any external authority.
  /// Authorities are not consulted when the local ledger already bans.
  pub async fn is_banned(&self, subject: &str) -> Result<bool> {
    Ok(self.verdict(subject).await?.is_banned)
  }

  /// Compute the full verdict for `subject`, updating the decision cache.
  /// A negative verdict clears any previously cached decisive event.
  pub async fn verdict(&self, subject: &str) -> Result<StatusVerdict> {
    let (source, decisive_event) = if let Some(event) = self.local_ban(subject).await? {
      (Some(VerdictSource::Local), Some(event))
    } else if let Some(event) = self.external_ban(subject).await {
      (Some(VerdictSource::External), Some(event))
    } else {
      self.record_decision(subject, None);
      (None, None)
    };

    Ok(StatusVerdict { is_banned: source.is_some(), decisive_event, source })
  }

  /// Whether the ledger's active event for `subject` is a ban.
  pub async fn is_banned_locally(&self, subject: &str) -> Result<bool> {
    Ok(self.local_ban(subject).await?.is_some())
  }

  /// Whether the first authority to supply an event for `subject` supplied a
  /// ban. Authorities that fail or time out count as having no verdict.
  pub async fn is_banned_externally(&self, subject: &str) -> bool {
    self.external_ban(subject).await.is_some()
  }

  async fn local_ban(&self, subject: &str) -> Result<Option<Event>> {
    let ban = self.ledger.active_event(subject).await?.filter(Event::is_ban);
    if let Some(event) = &ban {
      self.record_decision(subject, Some(event.clone()));
    }
    Ok(ban)
  }

  /// The ban supplied by the first answering authority, skipping the local
  /// ledger. Records the decision like [`Resolver::verdict`] does.
  pub async fn external_ban(&self, subject: &str) -> Option<Event> {
    let ban = self.external_event(subject).await.filter(Event::is_ban);
    if let Some(event) = &ban {
      self.record_decision(subject, Some(event.clone()));
    }
    ban
  }

  async fn external_event(&self, subject: &str) -> Option<Event> {
    for authority in &self.authorities {
      let name = authority.name();
      match tokio::time::timeout(self.authority_timeout, authority.verdict(subject)).await {
        Ok(Ok(Some(event))) => {
          debug!(authority = name, %subject, kind = %event.kind, "external verdict");
          return Some(event);
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => {
          warn!(authority = name, %subject, error = %e, "external authority failed");
        }
        Err(_) => {
          let e = Error::ExternalAuthorityTimeout {
            authority: name.to_owned(),
            timeout:   self.authority_timeout,
          };
          warn!(%subject, error = %e, "skipping external authority");
        }
      }
    }
    None
  }

  // ── Decision cache ──────────────────────────────────────────────────────

  /// Store, or clear when `event` is `None`, the decisive event for `subject`.
  pub fn record_decision(&self, subject: &str, event: Option<Event>) {
    let key = subject_key(subject);
    match event {
      Some(event) => {
        self.decisions.insert(key, event);
      }
      None => {
        self.decisions.remove(&key);
      }
    }
  }

  /// The event behind the last positive check for `subject`, if still cached.
  pub fn decisive_event(&self, subject: &str) -> Option<Event> {
    self.decisions.get(&subject_key(subject)).map(|e| e.value().clone())
  }

  /// Drop everything cached for `subject`; called when it disconnects.
  pub fn forget(&self, subject: &str) { self.record_decision(subject, None); }

  /// Number of subjects with a cached decisive event.
  pub fn cached_decisions(&self) -> usize { self.decisions.len() }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use async_trait::async_trait;
  use chrono::{DateTime, TimeDelta};

  use super::*;
  use crate::{BoxError, clock::ManualClock, event::EventKind, testing::MemoryStore};

  fn external(kind: EventKind, reason: &str) -> Event {
    Event {
      id:         900,
      created_at: DateTime::from_timestamp(0, 0).unwrap(),
      subject:    "x".into(),
      issued_by:  "proxy".into(),
      kind,
      reason:     reason.into(),
      expires_at: None,
    }
  }

  /// Records how often it is asked, and answers with a fixed event.
  struct Spy {
    name:   &'static str,
    answer: Option<Event>,
    calls:  AtomicUsize,
  }

  impl Spy {
    fn new(name: &'static str, answer: Option<Event>) -> Arc<Self> {
      Arc::new(Self { name, answer, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  #[async_trait]
  impl ExternalAuthority for Spy {
    fn name(&self) -> &str { self.name }

    async fn verdict(&self, _: &str) -> Result<Option<Event>, BoxError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(self.answer.clone())
    }
  }

  struct Stalled;

  #[async_trait]
  impl ExternalAuthority for Stalled {
    fn name(&self) -> &str { "stalled" }

    async fn verdict(&self, _: &str) -> Result<Option<Event>, BoxError> {
      tokio::time::sleep(Duration::from_secs(3_600)).await;
      Ok(Some(external(EventKind::Ban, "too late")))
    }
  }

  struct Broken;

  #[async_trait]
  impl ExternalAuthority for Broken {
    fn name(&self) -> &str { "broken" }

    async fn verdict(&self, _: &str) -> Result<Option<Event>, BoxError> {
      Err("connection refused".into())
    }
  }

  fn setup() -> (Arc<Ledger<MemoryStore>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at(1_700_000_000));
    let ledger = Ledger::with_clock(Arc::new(MemoryStore::default()), clock.clone());
    (Arc::new(ledger), clock)
  }

  #[tokio::test]
  async fn ban_then_unban_end_to_end() {
    let (ledger, _) = setup();
    let resolver = Resolver::new(ledger.clone());

    ledger.ban("X", "op", "spam").await.unwrap();
    assert!(resolver.is_banned("X").await.unwrap());
    assert_eq!(resolver.decisive_event("X").unwrap().reason, "spam");

    ledger.unban("X", "op", "").await.unwrap();
    assert!(!resolver.is_banned_locally("X").await.unwrap());
    assert!(!resolver.is_banned("X").await.unwrap());
    assert_eq!(resolver.decisive_event("X"), None);
  }

  #[tokio::test]
  async fn temp_ban_lapses_without_new_events() {
    let (ledger, clock) = setup();
    let resolver = Resolver::new(ledger.clone());

    ledger.temp_ban("X", "op", "", "1s").await.unwrap();
    assert!(resolver.is_banned("X").await.unwrap());

    clock.advance(TimeDelta::seconds(1));
    assert!(!resolver.is_banned("X").await.unwrap());
    assert_eq!(ledger.store().len(), 1);
  }

  #[tokio::test]
  async fn expired_temp_unban_restores_ban() {
    let (ledger, clock) = setup();
    let resolver = Resolver::new(ledger.clone());

    ledger.ban("X", "op", "perm").await.unwrap();
    ledger.temp_unban("X", "op", "", "1h").await.unwrap();
    assert!(!resolver.is_banned("X").await.unwrap());

    clock.advance(TimeDelta::hours(1));
    assert!(resolver.is_banned("X").await.unwrap());
    assert_eq!(resolver.decisive_event("x").unwrap().reason, "perm");
  }

  #[tokio::test]
  async fn local_ban_short_circuits_authorities() {
    let (ledger, _) = setup();
    let spy = Spy::new("spy", None);
    let resolver = Resolver::new(ledger.clone()).authority(spy.clone());

    ledger.ban("X", "op", "").await.unwrap();
    assert!(resolver.is_banned("X").await.unwrap());
    assert_eq!(spy.calls(), 0);
  }

  #[tokio::test]
  async fn external_ban_is_recorded() {
    let (ledger, _) = setup();
    let spy = Spy::new("spy", Some(external(EventKind::Ban, "global list")));
    let resolver = Resolver::new(ledger).authority(spy.clone());

    let verdict = resolver.verdict("X").await.unwrap();
    assert!(verdict.is_banned);
    assert_eq!(verdict.source, Some(VerdictSource::External));
    assert_eq!(verdict.decisive_event.unwrap().reason, "global list");
    assert_eq!(spy.calls(), 1);
  }

  #[tokio::test]
  async fn first_answering_authority_wins() {
    let (ledger, _) = setup();
    let silent = Spy::new("silent", None);
    let unban = Spy::new("unban", Some(external(EventKind::Unban, "")));
    let ban = Spy::new("ban", Some(external(EventKind::Ban, "")));
    let resolver = Resolver::new(ledger)
      .authority(silent.clone())
      .authority(unban.clone())
      .authority(ban.clone());

    assert!(!resolver.is_banned("X").await.unwrap());
    assert_eq!((silent.calls(), unban.calls(), ban.calls()), (1, 1, 0));
  }

  #[tokio::test]
  async fn slow_and_failing_authorities_are_skipped() {
    let (ledger, _) = setup();
    let ban = Spy::new("ban", Some(external(EventKind::Ban, "late but valid")));
    let resolver = Resolver::new(ledger)
      .authority(Arc::new(Broken))
      .authority(Arc::new(Stalled))
      .authority(ban.clone())
      .authority_timeout(Duration::from_millis(20));

    assert!(resolver.is_banned("X").await.unwrap());
    assert_eq!(resolver.decisive_event("X").unwrap().reason, "late but valid");
  }

  #[tokio::test]
  async fn local_unban_still_consults_authorities() {
    let (ledger, _) = setup();
    let spy = Spy::new("spy", Some(external(EventKind::Ban, "")));
    let resolver = Resolver::new(ledger.clone()).authority(spy.clone());

    ledger.unban("X", "op", "").await.unwrap();
    assert!(resolver.is_banned("X").await.unwrap());
    assert_eq!(spy.calls(), 1);
  }

  #[tokio::test]
  async fn forget_clears_decision() {
    let (ledger, _) = setup();
    let resolver = Resolver::new(ledger.clone());
    ledger.ban("X", "op", "").await.unwrap();
    resolver.is_banned("X").await.unwrap();
    assert_eq!(resolver.cached_decisions(), 1);

    resolver.forget("x");
    assert_eq!(resolver.decisive_event("X"), None);
    assert_eq!(resolver.cached_decisions(), 0);
  }

  #[tokio::test]
  async fn storage_failure_propagates() {
    let (ledger, _) = setup();
    let resolver = Resolver::new(ledger.clone());
    ledger.store().set_offline(true);
    assert!(matches!(resolver.is_banned("X").await, Err(Error::StorageUnavailable(_))));
  }
}
