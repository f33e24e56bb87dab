//! Account name history and point-in-time identity checks.
//!
//! Player names can change, and a released name can be claimed by a different
//! account. [`NameHistoryCache::had_name_at_time`] answers "did this account
//! hold this name at that moment", so an event recorded against a name can be
//! tied to the account that held it when the event was created.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{BoxError, Error, clock::Clock};

/// One entry from an identity registry: the account switched to `name` at
/// `changed_at`, or held it since creation when `changed_at` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameChange {
  pub name:       String,
  pub changed_at: Option<DateTime<Utc>>,
}

/// Source of truth for account name histories (e.g. the game's profile API).
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
  async fn name_history(&self, identity: Uuid) -> Result<Vec<NameChange>, BoxError>;
}

/// Name history for one account, keyed by the instant each name was taken.
/// The Unix epoch stands in for "since account creation".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameHistory {
  entries: BTreeMap<DateTime<Utc>, String>,
}

impl NameHistory {
  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &String)> { self.entries.iter() }

  /// Whether the account held `name` at `at`, judged at `now`.
  ///
  /// Each matching entry is valid over `[taken, next)`, where `next` is the
  /// earliest later change that happened before `now`, or `now` itself.
  pub fn had_name_at(&self, name: &str, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    self
      .entries
      .iter()
      .filter(|(_, held)| held.eq_ignore_ascii_case(name))
      .any(|(&from, _)| {
        let until = self
          .entries
          .range(from..)
          .map(|(&ts, _)| ts)
          .find(|&ts| ts > from && ts < now)
          .unwrap_or(now);
        from <= at && at < until
      })
  }
}

impl FromIterator<NameChange> for NameHistory {
  fn from_iter<I: IntoIterator<Item = NameChange>>(iter: I) -> Self {
    Self {
      entries: iter
        .into_iter()
        .map(|c| (c.changed_at.unwrap_or(DateTime::UNIX_EPOCH), c.name))
        .collect(),
    }
  }
}

/// Process-lifetime cache in front of an [`IdentityRegistry`].
///
/// Each identity is fetched at most once, even under concurrent lookups. A
/// failed fetch is cached as an empty history and never retried, unless
/// [`NameHistoryCache::invalidate`] is called.
pub struct NameHistoryCache {
  registry: Arc<dyn IdentityRegistry>,
  clock:    Arc<dyn Clock>,
  entries:  DashMap<Uuid, Arc<OnceCell<Arc<NameHistory>>>>,
}

impl NameHistoryCache {
  pub fn new(registry: Arc<dyn IdentityRegistry>, clock: Arc<dyn Clock>) -> Self {
    Self { registry, clock, entries: DashMap::new() }
  }

  /// The name history for `identity`, fetching it on first use.
  pub async fn history(&self, identity: Uuid) -> Arc<NameHistory> {
    // Clone the cell out so the map shard is not locked across the fetch.
    let cell = self.entries.entry(identity).or_default().value().clone();

    cell
      .get_or_init(|| async {
        match self.registry.name_history(identity).await {
          Ok(changes) => {
            debug!(%identity, count = changes.len(), "fetched name history");
            Arc::new(changes.into_iter().collect())
          }
          Err(source) => {
            let e = Error::IdentityRegistryUnavailable { identity, source };
            warn!(error = %e, "caching empty name history");
            Arc::new(NameHistory::default())
          }
        }
      })
      .await
      .clone()
  }

  /// Whether `identity` held `name` at `at`.
  pub async fn had_name_at_time(&self, identity: Uuid, name: &str, at: DateTime<Utc>) -> bool {
    self.history(identity).await.had_name_at(name, at, self.clock.now())
  }

  /// Forget the cached history for `identity`; the next lookup refetches.
  pub fn invalidate(&self, identity: Uuid) { self.entries.remove(&identity); }
}
