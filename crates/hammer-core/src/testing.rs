//! In-memory test doubles shared by the unit tests in this crate.

use std::sync::{
  Mutex,
  atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};

use crate::{
  event::{Event, NewEvent},
  store::EventStore,
};

#[derive(Debug, thiserror::Error)]
#[error("memory store is offline")]
pub struct Offline;

/// A `Vec`-backed [`EventStore`] that can be switched offline.
#[derive(Default)]
pub struct MemoryStore {
  events:  Mutex<Vec<Event>>,
  offline: AtomicBool,
}

impl MemoryStore {
  pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }

  pub fn len(&self) -> usize { self.events.lock().unwrap().len() }

  fn check(&self) -> Result<(), Offline> {
    if self.offline.load(Ordering::SeqCst) { Err(Offline) } else { Ok(()) }
  }
}

impl EventStore for MemoryStore {
  type Error = Offline;

  async fn create_schema(&self) -> Result<(), Offline> { self.check() }

  async fn insert(&self, event: &NewEvent) -> Result<i64, Offline> {
    self.check()?;
    let mut events = self.events.lock().unwrap();
    let id = events.len() as i64 + 1;
    events.push(event.clone().into_event(id));
    Ok(id)
  }

  async fn query_by_subject(&self, subject: &str) -> Result<Vec<Event>, Offline> {
    self.check()?;
    Ok(
      self
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.subject.eq_ignore_ascii_case(subject))
        .cloned()
        .collect(),
    )
  }

  async fn query_active(
    &self,
    subject: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<Event>, Offline> {
    self.check()?;
    Ok(
      self
        .events
        .lock()
        .unwrap()
        .iter()
        .rev()
        .find(|e| e.subject.eq_ignore_ascii_case(subject) && e.is_active_at(now))
        .cloned(),
    )
  }
}
