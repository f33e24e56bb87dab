//! Handlers for `/subjects/{subject}` endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use hammer_core::{event::Event, resolver::StatusVerdict, store::EventStore};
use serde::Serialize;

use crate::{ApiState, auth::Operator, error::ApiError};

/// One row of a subject's history.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
  #[serde(flatten)]
  pub event:   Event,
  /// Whether the event had already lapsed when the history was read.
  pub expired: bool,
}

/// `GET /subjects/{subject}/history`: every event, oldest first.
pub async fn history<S>(
  State(state): State<ApiState<S>>,
  _: Operator,
  Path(subject): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: EventStore + 'static,
{
  let events = state
    .ledger
    .history(&subject)
    .await?
    .ok_or_else(|| ApiError::NotFound("no history".into()))?;

  let now = state.ledger.clock().now();
  Ok(Json(
    events
      .into_iter()
      .map(|event| HistoryEntry { expired: !event.is_active_at(now), event })
      .collect(),
  ))
}

/// `GET /subjects/{subject}/status`: the resolver's current verdict.
pub async fn status<S>(
  State(state): State<ApiState<S>>,
  _: Operator,
  Path(subject): Path<String>,
) -> Result<Json<StatusVerdict>, ApiError>
where
  S: EventStore + 'static,
{
  Ok(Json(state.sessions.status(&subject).await?))
}
