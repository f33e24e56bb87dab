//! Handlers for the moderation commands.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/bans`   | Body: [`CommandBody`]; 409 if already banned |
//! | `POST` | `/unbans` | Body: [`CommandBody`]; 409 if not banned |
//!
//! A `duration` makes the command temporary. A committed event returns 201
//! and is broadcast through the enforcement sink; a vetoed one returns 200
//! with `{"outcome":"cancelled"}`.

use axum::{Json, extract::State, http::StatusCode};
use hammer_core::{
  event::{Event, EventKind},
  ledger::Appended,
  store::EventStore,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{ApiState, auth::Operator, error::ApiError};

/// JSON body accepted by `POST /bans` and `POST /unbans`.
#[derive(Debug, Deserialize)]
pub struct CommandBody {
  pub subject:  String,
  #[serde(default)]
  pub reason:   String,
  /// A duration spec such as `2d12h`. Absent means permanent.
  pub duration: Option<String>,
}

/// Result of a moderation command.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
  Committed { event: Event },
  Cancelled,
}

/// `POST /bans`
pub async fn ban<S>(
  State(state): State<ApiState<S>>,
  Operator(op): Operator,
  Json(body): Json<CommandBody>,
) -> Result<(StatusCode, Json<CommandOutcome>), ApiError>
where
  S: EventStore + 'static,
{
  run(&state, &op, EventKind::Ban, body).await
}

/// `POST /unbans`
pub async fn unban<S>(
  State(state): State<ApiState<S>>,
  Operator(op): Operator,
  Json(body): Json<CommandBody>,
) -> Result<(StatusCode, Json<CommandOutcome>), ApiError>
where
  S: EventStore + 'static,
{
  run(&state, &op, EventKind::Unban, body).await
}

async fn run<S>(
  state: &ApiState<S>,
  op: &str,
  kind: EventKind,
  body: CommandBody,
) -> Result<(StatusCode, Json<CommandOutcome>), ApiError>
where
  S: EventStore + 'static,
{
  let subject = body.subject.trim();
  if subject.is_empty() {
    return Err(ApiError::BadRequest("subject must not be empty".into()));
  }

  let banned = state.sessions.status(subject).await?.is_banned;
  match kind {
    EventKind::Ban if banned => return Err(ApiError::Conflict("already banned".into())),
    EventKind::Unban if !banned => return Err(ApiError::Conflict("not banned".into())),
    _ => {}
  }

  let ledger = &state.ledger;
  let appended = match (kind, body.duration.as_deref()) {
    (EventKind::Ban, None) => ledger.ban(subject, op, &body.reason).await?,
    (EventKind::Ban, Some(d)) => ledger.temp_ban(subject, op, &body.reason, d).await?,
    (EventKind::Unban, None) => ledger.unban(subject, op, &body.reason).await?,
    (EventKind::Unban, Some(d)) => ledger.temp_unban(subject, op, &body.reason, d).await?,
  };

  match appended {
    Appended::Committed(event) => {
      if let Err(e) = state.sink.broadcast(&state.messages.broadcast(&event)).await {
        warn!(id = event.id, error = %e, "broadcast failed");
      }
      Ok((StatusCode::CREATED, Json(CommandOutcome::Committed { event })))
    }
    Appended::Cancelled => Ok((StatusCode::OK, Json(CommandOutcome::Cancelled))),
  }
}
