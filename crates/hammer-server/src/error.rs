//! Error type for `hammer-server`'s HTTP collaborators and wiring.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{url} answered {status}")]
  Status { url: String, status: StatusCode },

  #[error("invalid base url {0:?}")]
  InvalidUrl(String),

  #[error("configuration error: {0}")]
  Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
