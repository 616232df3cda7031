//! Competition endpoints consumed by tournament clients

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::AppState;

use super::ApiError;

/// GET /api/competition/:id/stages_total
///
/// Number of stages a full tournament of this competition takes:
/// `ceil(log2(candidate_count))`.
pub async fn stages_total(
    State(state): State<AppState>,
    Path(competition_id): Path<Uuid>,
) -> Result<Json<u32>, ApiError> {
    let stages = state.engine.stages_total(competition_id).await?;
    Ok(Json(stages))
}
