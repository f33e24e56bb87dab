//! The session gate: called by the game server when a player joins or quits.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/sessions/{subject}` | Body: [`ConnectBody`]; returns a [`LoginVerdict`] |
//! | `DELETE` | `/sessions/{subject}` | Stops the re-check; 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use hammer_core::{recheck::LoginVerdict, store::EventStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, auth::Operator, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ConnectBody {
  /// Account UUID of the joining player, enabling the identity check.
  #[serde(default)]
  pub identity: Option<Uuid>,
}

/// `POST /sessions/{subject}`
pub async fn connect<S>(
  State(state): State<ApiState<S>>,
  _: Operator,
  Path(subject): Path<String>,
  Json(body): Json<ConnectBody>,
) -> Result<Json<LoginVerdict>, ApiError>
where
  S: EventStore + 'static,
{
  Ok(Json(state.sessions.connect(&subject, body.identity).await?))
}

/// `DELETE /sessions/{subject}`
pub async fn disconnect<S>(
  State(state): State<ApiState<S>>,
  _: Operator,
  Path(subject): Path<String>,
) -> StatusCode
where
  S: EventStore + 'static,
{
  state.sessions.disconnect(&subject);
  StatusCode::NO_CONTENT
}
