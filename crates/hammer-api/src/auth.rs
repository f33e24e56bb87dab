//! HTTP Basic-auth extractor for operators.
//!
//! Every route is operator-only. The authenticated username becomes the
//! `issued_by` of any event the request creates.

use std::collections::HashMap;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

/// One operator account, as written in the server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorCredentials {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Operators accepted by this server instance, keyed by username.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  operators: HashMap<String, String>,
}

impl AuthConfig {
  pub fn new(operators: impl IntoIterator<Item = OperatorCredentials>) -> Self {
    Self {
      operators: operators
        .into_iter()
        .map(|op| (op.username, op.password_hash))
        .collect(),
    }
  }

  pub fn is_empty(&self) -> bool { self.operators.is_empty() }
}

/// The operator a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(pub String);

/// Verify credentials from headers, returning the operator's username.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<String, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let stored = config
    .operators
    .get(username)
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(stored).map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(username.to_owned())
}

impl<S> FromRequestParts<ApiState<S>> for Operator
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth).map(Operator)
  }
}
