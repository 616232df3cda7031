//! Pool resolver
//!
//! Computes the candidates still eligible to be paired:
//! all candidates of the session's competition, minus winners of the
//! given stage (they already advanced this round), minus losers of any
//! stage (elimination is permanent). The result has no defined order.
//!
//! The stage is an explicit parameter so a stage-advance pool can be
//! computed before the session row is rewritten.

use matchup_common::db::models::parse_uuid;
use matchup_common::{Cache, Result};
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use uuid::Uuid;

/// Cache lifetime for pool and grid entries.
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

pub fn pool_key(session_id: Uuid) -> String {
    format!("pool:{}", session_id)
}

pub fn grid_key(session_id: Uuid) -> String {
    format!("grid:{}", session_id)
}

/// Resolve the eligible pool for a session at the given stage.
///
/// With `use_cache`, a live `pool:{session}` entry is returned as-is;
/// a miss (or `use_cache = false`) recomputes from the store. Reads never
/// write the cache; mutation sites refill it with [`cache_pool`].
pub async fn resolve(
    db: &Pool<Sqlite>,
    cache: &Cache,
    session_id: Uuid,
    stage: i64,
    use_cache: bool,
) -> Result<Vec<Uuid>> {
    if use_cache {
        if let Some(cached) = cache.get(&pool_key(session_id)).await {
            if let Ok(ids) = serde_json::from_str::<Vec<Uuid>>(&cached) {
                return Ok(ids);
            }
            // Unreadable entry: fall through to recompute
            cache.delete(&pool_key(session_id)).await;
        }
    }

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT c.id FROM candidates c
        JOIN sessions s ON s.competition_id = c.competition_id
        WHERE s.id = ?1
          AND c.id NOT IN (
            SELECT ch.winner_id FROM choices ch
            WHERE ch.session_id = ?1 AND ch.stage = ?2
            UNION
            SELECT ch.loser_id FROM choices ch
            WHERE ch.session_id = ?1 AND ch.loser_id IS NOT NULL
          )
        "#,
    )
    .bind(session_id.to_string())
    .bind(stage)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|(id,)| parse_uuid(id, "candidates.id"))
        .collect()
}

/// Refill the pool cache with the post-draw remainder.
pub async fn cache_pool(cache: &Cache, session_id: Uuid, ids: &[Uuid]) {
    if let Ok(json) = serde_json::to_string(ids) {
        cache.set_with_ttl(pool_key(session_id), json, CACHE_TTL).await;
    }
}

/// Drop both cached views of a session. Called at every choice mutation.
pub async fn invalidate(cache: &Cache, session_id: Uuid) {
    cache.delete(&pool_key(session_id)).await;
    cache.delete(&grid_key(session_id)).await;
}
