//! JSON REST API for Hammer.
//!
//! Exposes an axum [`Router`] over a [`Ledger`], [`Resolver`] and
//! [`SessionMonitor`] backed by any [`EventStore`]. TLS and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", hammer_api::api_router(state))
//! ```

pub mod auth;
pub mod commands;
pub mod error;
pub mod identities;
pub mod sessions;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use hammer_core::{
  hooks::EnforcementSink,
  ledger::Ledger,
  message::Messages,
  names::NameHistoryCache,
  recheck::SessionMonitor,
  resolver::Resolver,
  store::EventStore,
};

pub use auth::{AuthConfig, Operator, OperatorCredentials};
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub ledger:   Arc<Ledger<S>>,
  pub resolver: Arc<Resolver<S>>,
  pub sessions: Arc<SessionMonitor<S>>,
  /// Present only when the identity check is enabled.
  pub names:    Option<Arc<NameHistoryCache>>,
  pub messages: Arc<Messages>,
  pub sink:     Arc<dyn EnforcementSink>,
  pub auth:     Arc<AuthConfig>,
}

impl<S: EventStore + 'static> ApiState<S> {
  /// Assemble state around an existing session monitor; the resolver and
  /// ledger are taken from it.
  pub fn new(
    sessions: Arc<SessionMonitor<S>>,
    sink: Arc<dyn EnforcementSink>,
    messages: Arc<Messages>,
    auth: AuthConfig,
  ) -> Self {
    let resolver = sessions.resolver().clone();
    Self {
      ledger: resolver.ledger().clone(),
      resolver,
      sessions,
      names: None,
      messages,
      sink,
      auth: Arc::new(auth),
    }
  }

  pub fn names(mut self, names: Arc<NameHistoryCache>) -> Self {
    self.names = Some(names);
    self
  }
}

// `derive(Clone)` would demand `S: Clone`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      ledger:   self.ledger.clone(),
      resolver: self.resolver.clone(),
      sessions: self.sessions.clone(),
      names:    self.names.clone(),
      messages: self.messages.clone(),
      sink:     self.sink.clone(),
      auth:     self.auth.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: EventStore + 'static,
{
  Router::new()
    // Commands
    .route("/bans", post(commands::ban::<S>))
    .route("/unbans", post(commands::unban::<S>))
    // Subjects
    .route("/subjects/{subject}/history", get(subjects::history::<S>))
    .route("/subjects/{subject}/status", get(subjects::status::<S>))
    // Session gate
    .route(
      "/sessions/{subject}",
      post(sessions::connect::<S>).delete(sessions::disconnect::<S>),
    )
    // Identities
    .route(
      "/identities/{id}/names",
      get(identities::names::<S>).delete(identities::invalidate::<S>),
    )
    .route("/identities/{id}/held", get(identities::held::<S>))
    .with_state(state)
}
