//! matchup-api library - pairwise tournament rating service
//!
//! Exposes the rating engine over an Axum HTTP API. All `/api/*` routes
//! require a caller identity; `/health` does not.

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod engine;

pub use engine::RatingEngine;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The tournament engine (database pool, cache, session locks)
    pub engine: RatingEngine,
}

impl AppState {
    pub fn new(engine: RatingEngine) -> Self {
        Self { engine }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Protected routes (require caller identity)
    let protected = Router::new()
        .route("/api/rating/start/:competition_id", post(api::rating::start))
        .route("/api/rating/:id", get(api::rating::get_session))
        .route("/api/rating/:id/choose/:choice_id", post(api::rating::choose))
        .route("/api/rating/:id/refresh/:choice_id", post(api::rating::refresh))
        .route("/api/rating/:id/grid", get(api::rating::get_grid))
        .route("/api/rating/:id/rounds_total", get(api::rating::rounds_total))
        .route("/api/rating/:id/choice/last", get(api::rating::last_choice))
        .route("/api/rating/:id/choice/:choice_id", get(api::rating::get_choice))
        .route("/api/rating/:id/items", get(api::rating::stage_items))
        .route("/api/rating/:id/items/ids", get(api::rating::pool_ids))
        .route(
            "/api/competition/:id/stages_total",
            get(api::competition::stages_total),
        )
        .layer(middleware::from_fn(api::auth::require_identity));

    // Public routes (no identity)
    let public = api::health::health_routes();

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
