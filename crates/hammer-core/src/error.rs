//! Error types for `hammer-core`.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Type-erased error returned by collaborators (stores, sinks, authorities).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("storage unavailable: {0}")]
  StorageUnavailable(#[source] BoxError),

  #[error("external authority {authority:?} did not answer within {timeout:?}")]
  ExternalAuthorityTimeout {
    authority: String,
    timeout:   Duration,
  },

  #[error("identity registry unavailable for {identity}: {source}")]
  IdentityRegistryUnavailable {
    identity: Uuid,
    #[source]
    source:   BoxError,
  },
}

impl Error {
  /// Wrap a backend error as [`Error::StorageUnavailable`].
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::StorageUnavailable(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
