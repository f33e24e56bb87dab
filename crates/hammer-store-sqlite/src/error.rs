//! Error type for `hammer-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("unknown event kind in row {id}: {kind:?}")]
  UnknownKind { id: i64, kind: String },

  #[error("timestamp out of range in row {id}: {secs}")]
  Timestamp { id: i64, secs: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
