//! Handlers for `/identities/{id}` endpoints, backed by the name-history
//! cache. All of them answer 404 when the identity check is disabled.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use chrono::{DateTime, Utc};
use hammer_core::{
  names::{NameChange, NameHistoryCache},
  store::EventStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, auth::Operator, error::ApiError};

fn cache<S>(state: &ApiState<S>) -> Result<&Arc<NameHistoryCache>, ApiError> {
  state
    .names
    .as_ref()
    .ok_or_else(|| ApiError::NotFound("identity check disabled".into()))
}

/// `GET /identities/{id}/names`: the cached name history, oldest first.
pub async fn names<S>(
  State(state): State<ApiState<S>>,
  _: Operator,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<NameChange>>, ApiError>
where
  S: EventStore + 'static,
{
  let history = cache(&state)?.history(id).await;
  Ok(Json(
    history
      .iter()
      .map(|(&at, name)| NameChange {
        name:       name.clone(),
        changed_at: (at != DateTime::UNIX_EPOCH).then_some(at),
      })
      .collect(),
  ))
}

/// `DELETE /identities/{id}/names`: drop the cached history.
pub async fn invalidate<S>(
  State(state): State<ApiState<S>>,
  _: Operator,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: EventStore + 'static,
{
  cache(&state)?.invalidate(id);
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct HeldParams {
  pub name: String,
  pub at:   DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Held {
  pub held: bool,
}

/// `GET /identities/{id}/held?name=<name>&at=<rfc3339>`
pub async fn held<S>(
  State(state): State<ApiState<S>>,
  _: Operator,
  Path(id): Path<Uuid>,
  Query(params): Query<HeldParams>,
) -> Result<Json<Held>, ApiError>
where
  S: EventStore + 'static,
{
  let held = cache(&state)?
    .had_name_at_time(id, &params.name, params.at)
    .await;
  Ok(Json(Held { held }))
}
