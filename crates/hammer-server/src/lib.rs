//! Hammer server: configuration and wiring.
//!
//! [`assemble`] turns a [`ServerConfig`] and an opened [`SqliteStore`] into the
//! HTTP application: ledger with immediate enforcement, resolver with the
//! configured external authorities, and the session gate, all served under
//! `/api`.

pub mod authority;
pub mod error;
pub mod registry;
pub mod webhook;

#[cfg(test)]
mod testing;

use std::{
  ffi::OsStr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use hammer_api::{ApiState, AuthConfig, OperatorCredentials, api_router};
use hammer_core::{
  hooks::{EnforcementSink, KickOnCommit},
  ledger::Ledger,
  message::Messages,
  names::NameHistoryCache,
  recheck::SessionMonitor,
  resolver::Resolver,
};
use hammer_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::{Error, Result};

use authority::{AuthorityConfig, HttpAuthority};
use registry::HttpRegistry;
use webhook::{LogSink, WebhookSink};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `HAMMER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                  String,
  #[serde(default = "defaults::port")]
  pub port:                  u16,
  #[serde(default = "defaults::store_path")]
  pub store_path:            PathBuf,
  #[serde(default)]
  pub operators:             Vec<OperatorCredentials>,
  #[serde(default = "defaults::recheck_interval_secs")]
  pub recheck_interval_secs: u64,
  #[serde(default = "defaults::authority_timeout_ms")]
  pub authority_timeout_ms:  u64,
  /// Timeout for webhook and registry requests.
  #[serde(default = "defaults::http_timeout_ms")]
  pub http_timeout_ms:       u64,
  /// Consulted in order after the local ledger.
  #[serde(default)]
  pub authorities:           Vec<AuthorityConfig>,
  pub enforcement_url:       Option<String>,
  pub registry_url:          Option<String>,
  /// Requires `registry_url`.
  #[serde(default)]
  pub identity_check:        bool,
  #[serde(default)]
  pub messages:              Messages,
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String { "127.0.0.1".to_string() }
  pub fn port() -> u16 { 8420 }
  pub fn store_path() -> PathBuf { PathBuf::from("hammer.db") }
  pub fn recheck_interval_secs() -> u64 { 60 }
  pub fn authority_timeout_ms() -> u64 { 2_000 }
  pub fn http_timeout_ms() -> u64 { 10_000 }
}

impl ServerConfig {
  /// Read `path`, if it exists, overridden by `HAMMER_*` environment
  /// variables. A leading `~` in `store_path` is resolved against `$HOME`.
  pub fn load(path: &Path) -> Result<Self> {
    let mut cfg: Self = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("HAMMER").try_parsing(true))
      .build()
      .and_then(|c| c.try_deserialize())
      .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    cfg.store_path = under_home(&cfg.store_path, std::env::var_os("HOME").as_deref());
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn under_home(path: &Path, home: Option<&OsStr>) -> PathBuf {
  match (path.strip_prefix("~"), home) {
    (Ok(rest), Some(home)) => Path::new(home).join(rest),
    _ => path.to_path_buf(),
  }
}

// ─── Wiring ───────────────────────────────────────────────────────────────────

/// The assembled application.
pub struct Hammer {
  pub router:   Router,
  /// Kept so the binary can cancel re-check tasks on shutdown.
  pub sessions: Arc<SessionMonitor<SqliteStore>>,
}

/// Build the application for `config` on top of `store`.
pub fn assemble(config: &ServerConfig, store: SqliteStore) -> Result<Hammer> {
  let http_timeout = Duration::from_millis(config.http_timeout_ms);
  let authority_timeout = Duration::from_millis(config.authority_timeout_ms);
  let messages = Arc::new(config.messages.clone());

  let sink: Arc<dyn EnforcementSink> = match &config.enforcement_url {
    Some(url) => Arc::new(WebhookSink::new(url, http_timeout)?),
    None => {
      warn!("no enforcement_url configured; kicks and broadcasts are only logged");
      Arc::new(LogSink)
    }
  };

  let ledger = Arc::new(
    Ledger::new(Arc::new(store))
      .post_commit(Arc::new(KickOnCommit::new(sink.clone(), messages.clone()))),
  );

  let mut resolver = Resolver::new(ledger.clone()).authority_timeout(authority_timeout);
  for authority in &config.authorities {
    resolver = resolver.authority(Arc::new(HttpAuthority::new(authority, authority_timeout)?));
    info!(name = %authority.name, url = %authority.url, "registered external authority");
  }
  let resolver = Arc::new(resolver);

  let names = match (config.identity_check, &config.registry_url) {
    (false, _) => None,
    (true, Some(url)) => Some(Arc::new(NameHistoryCache::new(
      Arc::new(HttpRegistry::new(url, http_timeout)?),
      ledger.clock().clone(),
    ))),
    (true, None) => {
      return Err(Error::Config("identity_check requires registry_url".into()));
    }
  };

  let mut sessions = SessionMonitor::new(resolver, sink.clone(), messages.clone())
    .interval(Duration::from_secs(config.recheck_interval_secs));
  if let Some(names) = &names {
    sessions = sessions.identity_check(names.clone());
  }
  let sessions = Arc::new(sessions);

  if config.operators.is_empty() {
    warn!("no operators configured; every API request will be rejected");
  }
  let mut state = ApiState::new(
    sessions.clone(),
    sink,
    messages,
    AuthConfig::new(config.operators.iter().cloned()),
  );
  if let Some(names) = names {
    state = state.names(names);
  }

  let router = Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http());

  Ok(Hammer { router, sessions })
}
