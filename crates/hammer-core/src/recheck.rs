//! Login gate and periodic re-check for connected subjects.
//!
//! A subject that passes the login check gets a background task that re-runs
//! the resolver on a fixed interval, so a ban added by an external authority,
//! or a temporary unban that lapses, still disconnects them. The task is
//! cancelled when the subject disconnects.

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Result,
  event::{Event, subject_key},
  hooks::EnforcementSink,
  message::Messages,
  names::NameHistoryCache,
  resolver::{Resolver, StatusVerdict, VerdictSource},
  store::EventStore,
};

pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(60);

/// The answer to a login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum LoginVerdict {
  Allowed,
  Denied { message: String, event: Event },
}

struct Watch {
  id:    u64,
  token: CancellationToken,
}

pub struct SessionMonitor<S> {
  resolver: Arc<Resolver<S>>,
  sink:     Arc<dyn EnforcementSink>,
  messages: Arc<Messages>,
  names:    Option<Arc<NameHistoryCache>>,
  interval: Duration,
  sessions: DashMap<String, Watch>,
  next_id:  AtomicU64,
}

impl<S: EventStore + 'static> SessionMonitor<S> {
  pub fn new(
    resolver: Arc<Resolver<S>>,
    sink: Arc<dyn EnforcementSink>,
    messages: Arc<Messages>,
  ) -> Self {
    Self {
      resolver,
      sink,
      messages,
      names: None,
      interval: DEFAULT_RECHECK_INTERVAL,
      sessions: DashMap::new(),
      next_id: AtomicU64::new(0),
    }
  }

  pub fn interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  /// Check local bans against the connecting account's name history: a ban
  /// only applies if the account held the banned name when it was issued.
  pub fn identity_check(mut self, names: Arc<NameHistoryCache>) -> Self {
    self.names = Some(names);
    self
  }

  pub fn resolver(&self) -> &Arc<Resolver<S>> { &self.resolver }

  /// Decide whether `subject` may join. Allowed subjects are watched until
  /// [`SessionMonitor::disconnect`].
  pub async fn connect(self: &Arc<Self>, subject: &str, identity: Option<Uuid>) -> Result<LoginVerdict> {
    if let Some(event) = self.applicable_ban(subject, identity).await? {
      info!(%subject, id = event.id, "login denied");
      let message = self.messages.kick(&event);
      self.forget_unwatched(subject);
      return Ok(LoginVerdict::Denied { message, event });
    }

    self.watch(subject, identity);
    Ok(LoginVerdict::Allowed)
  }

  /// Stop watching `subject` and drop its cached decision.
  pub fn disconnect(&self, subject: &str) {
    if let Some((_, watch)) = self.sessions.remove(&subject_key(subject)) {
      watch.token.cancel();
      debug!(%subject, "stopped re-check");
    }
    self.resolver.forget(subject);
  }

  pub fn is_watching(&self, subject: &str) -> bool {
    self.sessions.contains_key(&subject_key(subject))
  }

  pub fn watched(&self) -> usize { self.sessions.len() }

  /// The resolver's verdict for `subject`. The decisive event stays cached
  /// only while `subject` is being watched.
  pub async fn status(&self, subject: &str) -> Result<StatusVerdict> {
    let verdict = self.resolver.verdict(subject).await?;
    self.forget_unwatched(subject);
    Ok(verdict)
  }

  fn forget_unwatched(&self, subject: &str) {
    if !self.is_watching(subject) {
      self.resolver.forget(subject);
    }
  }

  /// Cancel every re-check task.
  pub fn shutdown(&self) {
    for watch in self.sessions.iter() {
      watch.token.cancel();
    }
    self.sessions.clear();
  }

  /// The ban that keeps `subject` out, if any, after the identity check.
  async fn applicable_ban(&self, subject: &str, identity: Option<Uuid>) -> Result<Option<Event>> {
    let verdict = self.resolver.verdict(subject).await?;
    let Some(event) = verdict.decisive_event else {
      return Ok(None);
    };

    if let (Some(VerdictSource::Local), Some(names), Some(identity)) =
      (verdict.source, &self.names, identity)
    {
      let history = names.history(identity).await;
      let now = self.resolver.ledger().clock().now();
      if !history.is_empty() && !history.had_name_at(&event.subject, event.created_at, now) {
        info!(
          %subject,
          %identity,
          id = event.id,
          "ban predates this account holding the name; ignoring"
        );
        self.resolver.forget(subject);
        return Ok(self.resolver.external_ban(subject).await);
      }
    }

    Ok(Some(event))
  }

  fn watch(self: &Arc<Self>, subject: &str, identity: Option<Uuid>) {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let token = CancellationToken::new();
    let key = subject_key(subject);

    if let Some(previous) = self.sessions.insert(key.clone(), Watch { id, token: token.clone() }) {
      previous.token.cancel();
    }

    debug!(%subject, interval = ?self.interval, "started re-check");
    let monitor = self.clone();
    let subject = subject.to_owned();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval_at(Instant::now() + monitor.interval, monitor.interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        tokio::select! {
          _ = token.cancelled() => return,
          _ = ticker.tick() => {}
        }

        let found = monitor.applicable_ban(&subject, identity).await;
        if token.is_cancelled() {
          // Disconnected or replaced while checking; the result is stale.
          monitor.forget_unwatched(&subject);
          return;
        }

        match found {
          Ok(Some(event)) => {
            info!(%subject, id = event.id, "re-check found ban; kicking");
            match monitor.sink.kick(&subject, &monitor.messages.kick(&event)).await {
              Ok(()) => break,
              Err(e) => warn!(%subject, error = %e, "kick failed; retrying next tick"),
            }
          }
          Ok(None) => {}
          Err(e) => warn!(%subject, error = %e, "re-check failed"),
        }
      }

      monitor.sessions.remove_if(&key, |_, watch| watch.id == id);
    });
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use async_trait::async_trait;
  use chrono::{DateTime, TimeDelta};
  use tokio::sync::{Notify, mpsc};

  use super::*;
  use crate::{
    BoxError,
    clock::ManualClock,
    event::EventKind,
    hooks::ExternalAuthority,
    ledger::Ledger,
    names::{IdentityRegistry, NameChange},
    testing::MemoryStore,
  };

  struct ChannelSink(mpsc::UnboundedSender<(String, String)>);

  #[async_trait]
  impl EnforcementSink for ChannelSink {
    async fn kick(&self, subject: &str, message: &str) -> Result<(), BoxError> {
      self.0.send((subject.to_owned(), message.to_owned()))?;
      Ok(())
    }

    async fn broadcast(&self, _: &str) -> Result<(), BoxError> { Ok(()) }
  }

  struct Harness {
    ledger:  Arc<Ledger<MemoryStore>>,
    clock:   Arc<ManualClock>,
    monitor: Arc<SessionMonitor<MemoryStore>>,
    kicks:   mpsc::UnboundedReceiver<(String, String)>,
  }

  fn harness() -> Harness {
    let clock = Arc::new(ManualClock::at(1_700_000_000));
    let ledger = Arc::new(Ledger::with_clock(Arc::new(MemoryStore::default()), clock.clone()));
    let resolver = Arc::new(Resolver::new(ledger.clone()));
    let (tx, kicks) = mpsc::unbounded_channel();
    let monitor = SessionMonitor::new(resolver, Arc::new(ChannelSink(tx)), Arc::new(Messages::default()))
      .interval(Duration::from_millis(10));
    Harness { ledger, clock, monitor: Arc::new(monitor), kicks }
  }

  async fn next_kick(kicks: &mut mpsc::UnboundedReceiver<(String, String)>) -> (String, String) {
    tokio::time::timeout(Duration::from_secs(5), kicks.recv())
      .await
      .expect("kick within timeout")
      .expect("sink alive")
  }

  #[tokio::test]
  async fn banned_subject_is_denied_with_kick_message() {
    let h = harness();
    h.ledger.ban("Griefer", "op", "spam").await.unwrap();

    match h.monitor.connect("griefer", None).await.unwrap() {
      LoginVerdict::Denied { message, event } => {
        assert!(message.contains("spam"));
        assert_eq!(event.reason, "spam");
      }
      other => panic!("expected denial, got {other:?}"),
    }
    assert!(!h.monitor.is_watching("griefer"));
    assert_eq!(h.monitor.resolver().cached_decisions(), 0);
  }

  #[tokio::test]
  async fn allowed_subject_is_watched_until_disconnect() {
    let h = harness();
    assert_eq!(h.monitor.connect("Alice", None).await.unwrap(), LoginVerdict::Allowed);
    assert!(h.monitor.is_watching("alice"));

    h.monitor.disconnect("ALICE");
    assert!(!h.monitor.is_watching("alice"));
    assert_eq!(h.monitor.watched(), 0);
  }

  #[tokio::test]
  async fn recheck_kicks_when_temp_unban_lapses() {
    let mut h = harness();
    h.ledger.ban("alice", "op", "perm").await.unwrap();
    h.ledger.temp_unban("alice", "op", "", "1h").await.unwrap();
    assert_eq!(h.monitor.connect("alice", None).await.unwrap(), LoginVerdict::Allowed);

    h.clock.advance(TimeDelta::hours(1));
    let (subject, message) = next_kick(&mut h.kicks).await;
    assert_eq!(subject, "alice");
    assert!(message.contains("perm"));

    // The task ends itself after kicking.
    tokio::time::timeout(Duration::from_secs(5), async {
      while h.monitor.is_watching("alice") {
        tokio::task::yield_now().await;
      }
    })
    .await
    .unwrap();
  }

  #[tokio::test]
  async fn disconnect_cancels_recheck_and_clears_decision() {
    let mut h = harness();
    assert_eq!(h.monitor.connect("alice", None).await.unwrap(), LoginVerdict::Allowed);
    h.monitor.disconnect("alice");

    h.ledger.ban("alice", "op", "").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.kicks.try_recv().is_err());
    assert_eq!(h.monitor.resolver().decisive_event("alice"), None);
  }

  struct Renamed;

  #[async_trait]
  impl IdentityRegistry for Renamed {
    async fn name_history(&self, _: Uuid) -> Result<Vec<NameChange>, BoxError> {
      // Took the name "Alice" long after the ban was issued.
      Ok(vec![
        NameChange { name: "Carol".into(), changed_at: None },
        NameChange {
          name:       "Alice".into(),
          changed_at: DateTime::from_timestamp(1_800_000_000, 0),
        },
      ])
    }
  }

  #[tokio::test]
  async fn identity_check_ignores_bans_on_reused_names() {
    let h = harness();
    h.ledger.ban("Alice", "op", "").await.unwrap();
    h.clock.set(DateTime::from_timestamp(1_900_000_000, 0).unwrap());

    let names = Arc::new(NameHistoryCache::new(Arc::new(Renamed), h.clock.clone()));
    let monitor = Arc::new(
      SessionMonitor::new(
        h.monitor.resolver().clone(),
        Arc::new(ChannelSink(mpsc::unbounded_channel().0)),
        Arc::new(Messages::default()),
      )
      .identity_check(names),
    );

    let verdict = monitor.connect("Alice", Some(Uuid::new_v4())).await.unwrap();
    assert_eq!(verdict, LoginVerdict::Allowed);
    monitor.shutdown();

    // Without an identity the ban still applies.
    assert!(matches!(monitor.connect("Alice", None).await.unwrap(), LoginVerdict::Denied { .. }));
  }

  fn proxy_ban(reason: &str) -> Event {
    Event {
      id:         900,
      created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
      subject:    "Alice".into(),
      issued_by:  "proxy".into(),
      kind:       EventKind::Ban,
      reason:     reason.into(),
      expires_at: None,
    }
  }

  struct AlwaysBans;

  #[async_trait]
  impl ExternalAuthority for AlwaysBans {
    fn name(&self) -> &str { "global" }

    async fn verdict(&self, _: &str) -> Result<Option<Event>, BoxError> {
      Ok(Some(proxy_ban("global list")))
    }
  }

  #[tokio::test]
  async fn identity_check_still_honours_external_bans() {
    let h = harness();
    h.ledger.ban("Alice", "op", "local").await.unwrap();
    h.clock.set(DateTime::from_timestamp(1_900_000_000, 0).unwrap());

    let resolver = Arc::new(Resolver::new(h.ledger.clone()).authority(Arc::new(AlwaysBans)));
    let names = Arc::new(NameHistoryCache::new(Arc::new(Renamed), h.clock.clone()));
    let monitor = Arc::new(
      SessionMonitor::new(
        resolver,
        Arc::new(ChannelSink(mpsc::unbounded_channel().0)),
        Arc::new(Messages::default()),
      )
      .identity_check(names),
    );

    match monitor.connect("Alice", Some(Uuid::new_v4())).await.unwrap() {
      LoginVerdict::Denied { event, .. } => assert_eq!(event.reason, "global list"),
      other => panic!("expected external denial, got {other:?}"),
    }
    assert!(!monitor.is_watching("alice"));
  }

  /// Fails the first kick, then forwards the rest.
  struct FlakySink {
    attempts: AtomicUsize,
    kicks:    mpsc::UnboundedSender<String>,
  }

  #[async_trait]
  impl EnforcementSink for FlakySink {
    async fn kick(&self, subject: &str, _: &str) -> Result<(), BoxError> {
      if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
        return Err("game server unreachable".into());
      }
      self.kicks.send(subject.to_owned())?;
      Ok(())
    }

    async fn broadcast(&self, _: &str) -> Result<(), BoxError> { Ok(()) }
  }

  #[tokio::test]
  async fn failed_kick_is_retried_on_next_tick() {
    let h = harness();
    let (tx, mut kicks) = mpsc::unbounded_channel();
    let sink = Arc::new(FlakySink { attempts: AtomicUsize::new(0), kicks: tx });
    let monitor = Arc::new(
      SessionMonitor::new(h.monitor.resolver().clone(), sink.clone(), Arc::new(Messages::default()))
        .interval(Duration::from_millis(10)),
    );

    assert_eq!(monitor.connect("alice", None).await.unwrap(), LoginVerdict::Allowed);
    h.ledger.ban("alice", "op", "").await.unwrap();

    let kicked = tokio::time::timeout(Duration::from_secs(5), kicks.recv()).await.unwrap();
    assert_eq!(kicked.as_deref(), Some("alice"));
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
  }

  /// Answers the first query at once; later queries wait for `release`.
  struct Gate {
    calls:   AtomicUsize,
    entered: Notify,
    release: Notify,
  }

  #[async_trait]
  impl ExternalAuthority for Gate {
    fn name(&self) -> &str { "gate" }

    async fn verdict(&self, _: &str) -> Result<Option<Event>, BoxError> {
      if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return Ok(None);
      }
      self.entered.notify_one();
      self.release.notified().await;
      Ok(Some(proxy_ban("late")))
    }
  }

  #[tokio::test]
  async fn disconnect_during_check_skips_kick() {
    let mut h = harness();
    let gate = Arc::new(Gate { calls: AtomicUsize::new(0), entered: Notify::new(), release: Notify::new() });
    let resolver = Arc::new(Resolver::new(h.ledger.clone()).authority(gate.clone()));
    let (tx, kicks) = mpsc::unbounded_channel();
    h.kicks = kicks;
    let monitor = Arc::new(
      SessionMonitor::new(resolver.clone(), Arc::new(ChannelSink(tx)), Arc::new(Messages::default()))
        .interval(Duration::from_millis(10)),
    );

    assert_eq!(monitor.connect("alice", None).await.unwrap(), LoginVerdict::Allowed);
    tokio::time::timeout(Duration::from_secs(5), gate.entered.notified()).await.unwrap();

    monitor.disconnect("alice");
    gate.release.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.kicks.try_recv().is_err());
    assert_eq!(resolver.decisive_event("alice"), None);
  }

  #[tokio::test]
  async fn status_caches_decisions_only_for_watched_subjects() {
    let h = harness();
    let monitor = Arc::new(
      SessionMonitor::new(
        h.monitor.resolver().clone(),
        Arc::new(ChannelSink(mpsc::unbounded_channel().0)),
        Arc::new(Messages::default()),
      )
      .interval(Duration::from_secs(3_600)),
    );

    h.ledger.ban("bob", "op", "spam").await.unwrap();
    assert!(monitor.status("bob").await.unwrap().is_banned);
    assert_eq!(monitor.resolver().cached_decisions(), 0);

    assert_eq!(monitor.connect("alice", None).await.unwrap(), LoginVerdict::Allowed);
    h.ledger.ban("alice", "op", "grief").await.unwrap();
    assert!(monitor.status("alice").await.unwrap().is_banned);
    assert_eq!(monitor.resolver().decisive_event("alice").unwrap().reason, "grief");
    monitor.shutdown();
  }
}
