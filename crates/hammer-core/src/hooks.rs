//! Collaborator interfaces the ledger and resolver call out to.
//!
//! Each is registered in an ordered list at construction time; registration
//! order is significant wherever more than one collaborator answers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
  BoxError,
  event::{Event, NewEvent},
  message::Messages,
};

// ─── Pre-commit ──────────────────────────────────────────────────────────────

/// The answer a [`PreCommitHook`] gives for a pending event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
  Proceed,
  Cancel,
}

/// Policy consulted before an event is persisted. Any hook may veto.
pub trait PreCommitHook: Send + Sync {
  fn pre_commit(&self, pending: &NewEvent) -> HookDecision;
}

impl<F> PreCommitHook for F
where
  F: Fn(&NewEvent) -> HookDecision + Send + Sync,
{
  fn pre_commit(&self, pending: &NewEvent) -> HookDecision { self(pending) }
}

// ─── Post-commit ─────────────────────────────────────────────────────────────

/// Side effects run after an event is persisted and before `append` returns.
/// A failure here is logged; the event stays committed.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
  async fn post_commit(&self, event: &Event) -> Result<(), BoxError>;
}

// ─── External authorities ────────────────────────────────────────────────────

/// Another ban authority (a proxy, a network-wide ban list, …) that can
/// supply its own verdict for a subject.
#[async_trait]
pub trait ExternalAuthority: Send + Sync {
  /// Short name used in logs.
  fn name(&self) -> &str;

  /// The event this authority holds for `subject`, if any.
  async fn verdict(&self, subject: &str) -> Result<Option<Event>, BoxError>;
}

// ─── Enforcement ─────────────────────────────────────────────────────────────

/// The hosting game server, as seen from the ledger.
#[async_trait]
pub trait EnforcementSink: Send + Sync {
  /// Disconnect `subject` with `message` if currently connected.
  async fn kick(&self, subject: &str, message: &str) -> Result<(), BoxError>;

  /// Announce `message` to staff.
  async fn broadcast(&self, message: &str) -> Result<(), BoxError>;
}

/// Kicks the subject of every newly-committed active ban.
pub struct KickOnCommit {
  sink:     Arc<dyn EnforcementSink>,
  messages: Arc<Messages>,
}

impl KickOnCommit {
  pub fn new(sink: Arc<dyn EnforcementSink>, messages: Arc<Messages>) -> Self {
    Self { sink, messages }
  }
}

#[async_trait]
impl PostCommitHook for KickOnCommit {
  async fn post_commit(&self, event: &Event) -> Result<(), BoxError> {
    if !event.is_ban() || !event.is_active_at(event.created_at) {
      return Ok(());
    }
    debug!(subject = %event.subject, id = event.id, "kicking newly banned subject");
    self.sink.kick(&event.subject, &self.messages.kick(event)).await
  }
}
