//! Rating session endpoints
//!
//! Thin handlers over the engine: extract identity and path parameters,
//! delegate, and let [`ApiError`](super::ApiError) map failures onto
//! status codes.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use matchup_common::db::models::Candidate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::grid::GridPair;
use crate::engine::{ChoiceView, ChooseView, SessionView, StartView};
use crate::AppState;

use super::auth::UserId;
use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
pub struct ChooseRequest {
    pub winner_id: Uuid,
}

/// POST /api/rating/start/:competition_id
///
/// Start a session and return its first pairing.
pub async fn start(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(competition_id): Path<Uuid>,
) -> Result<Json<StartView>, ApiError> {
    let view = state.engine.start(user_id, competition_id).await?;
    Ok(Json(view))
}

/// POST /api/rating/:id/choose/:choice_id
///
/// Record a decision; returns the next pairing or the end of the
/// tournament.
pub async fn choose(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path((session_id, choice_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ChooseRequest>,
) -> Result<Json<ChooseView>, ApiError> {
    let view = state
        .engine
        .choose(user_id, session_id, choice_id, payload.winner_id)
        .await?;
    Ok(Json(view))
}

/// POST /api/rating/:id/refresh/:choice_id
///
/// Redo the open pairing (once per stage).
pub async fn refresh(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path((session_id, choice_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ChoiceView>, ApiError> {
    let view = state.engine.refresh(user_id, session_id, choice_id).await?;
    Ok(Json(view))
}

/// GET /api/rating/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let view = state.engine.session_view(session_id).await?;
    Ok(Json(view))
}

/// GET /api/rating/:id/grid
pub async fn get_grid(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<Vec<GridPair>>>, ApiError> {
    let grid = state.engine.grid(session_id).await?;
    Ok(Json(grid))
}

/// GET /api/rating/:id/rounds_total
pub async fn rounds_total(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<i64>, ApiError> {
    let rounds = state.engine.rounds_total(user_id, session_id).await?;
    Ok(Json(rounds))
}

/// GET /api/rating/:id/choice/last
pub async fn last_choice(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ChoiceView>, ApiError> {
    let view = state.engine.last_choice(session_id).await?;
    Ok(Json(view))
}

/// GET /api/rating/:id/choice/:choice_id
pub async fn get_choice(
    State(state): State<AppState>,
    Path((session_id, choice_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ChoiceView>, ApiError> {
    let view = state.engine.choice(session_id, choice_id).await?;
    Ok(Json(view))
}

/// GET /api/rating/:id/items
///
/// Candidate records participating in the current stage.
pub async fn stage_items(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<Candidate>>, ApiError> {
    let items = state.engine.stage_items(session_id).await?;
    Ok(Json(items))
}

/// GET /api/rating/:id/items/ids
///
/// Ids of candidates still eligible to be drawn this stage.
pub async fn pool_ids(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    let ids = state.engine.pool_ids(session_id).await?;
    Ok(Json(ids))
}
