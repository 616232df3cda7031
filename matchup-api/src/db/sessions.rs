//! Session row queries
//!
//! The ordered choice-id list travels with the session row as JSON
//! (`choice_order`); every progress update rewrites it together with the
//! stage/flag columns so a session row is always self-consistent.

use matchup_common::db::models::{choice_order_json, session_from_row, SessionRecord};
use matchup_common::Result;
use sqlx::{Pool, Sqlite, Transaction};
use uuid::Uuid;

/// Fetch a session by id.
pub async fn get(db: &Pool<Sqlite>, id: Uuid) -> Result<Option<SessionRecord>> {
    let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Fetch a session by id, filtered to the owning user. A foreign session
/// is indistinguishable from a missing one.
pub async fn get_owned(db: &Pool<Sqlite>, id: Uuid, user_id: Uuid) -> Result<Option<SessionRecord>> {
    let row = sqlx::query("SELECT * FROM sessions WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Insert a new session row.
pub async fn insert(tx: &mut Transaction<'_, Sqlite>, session: &SessionRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, competition_id, user_id, stage, choice_order,
                              ended, is_refreshed)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(session.competition_id.to_string())
    .bind(session.user_id.to_string())
    .bind(session.stage)
    .bind(choice_order_json(&session.choice_order))
    .bind(session.ended)
    .bind(session.is_refreshed)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Rewrite a session's progress columns: stage, ordered choice list,
/// refresh flag, ended flag.
pub async fn update_progress(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
    stage: i64,
    choice_order: &[Uuid],
    is_refreshed: bool,
    ended: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sessions
        SET stage = ?, choice_order = ?, is_refreshed = ?, ended = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ?
        "#,
    )
    .bind(stage)
    .bind(choice_order_json(choice_order))
    .bind(is_refreshed)
    .bind(ended)
    .bind(id.to_string())
    .execute(&mut **tx)
    .await?;

    Ok(())
}
