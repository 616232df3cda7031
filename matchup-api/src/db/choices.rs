//! Choice row queries
//!
//! Chronological order is `ORDER BY created_at, rowid`: rowid breaks
//! same-timestamp ties, and a refresh rewrites its row in place so the
//! choice keeps its position in the chronology.

use matchup_common::db::models::{choice_from_row, ChoiceRecord};
use matchup_common::Result;
use sqlx::{Pool, Sqlite, Transaction};
use uuid::Uuid;

/// Fetch a choice by id, scoped to its session.
pub async fn get(db: &Pool<Sqlite>, session_id: Uuid, id: Uuid) -> Result<Option<ChoiceRecord>> {
    let row = sqlx::query("SELECT * FROM choices WHERE id = ? AND session_id = ?")
        .bind(id.to_string())
        .bind(session_id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(choice_from_row).transpose()
}

/// Insert a new choice row.
pub async fn insert(tx: &mut Transaction<'_, Sqlite>, choice: &ChoiceRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO choices (id, session_id, winner_id, loser_id, stage, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(choice.id.to_string())
    .bind(choice.session_id.to_string())
    .bind(choice.winner_id.to_string())
    .bind(choice.loser_id.map(|id| id.to_string()))
    .bind(choice.stage)
    .bind(&choice.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Rewrite a choice's outcome in place. Used by the winner/loser swap in
/// `choose` and by the in-place redraw in `refresh`; generic over the
/// executor so the redraw can join the refresh transaction.
pub async fn set_outcome<'e, E>(
    db: E,
    id: Uuid,
    winner_id: Uuid,
    loser_id: Option<Uuid>,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE choices SET winner_id = ?, loser_id = ? WHERE id = ?")
        .bind(winner_id.to_string())
        .bind(loser_id.map(|id| id.to_string()))
        .bind(id.to_string())
        .execute(db)
        .await?;

    Ok(())
}

/// Delete a set of choices belonging to a session.
pub async fn delete_many(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: Uuid,
    ids: &[Uuid],
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    // UUIDs are typed, so formatting them into the IN list is injection-safe.
    let id_list = ids
        .iter()
        .map(|id| format!("'{}'", id))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "DELETE FROM choices WHERE session_id = ? AND id IN ({})",
        id_list
    );

    sqlx::query(&sql)
        .bind(session_id.to_string())
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Every candidate already paired in the given stage: winners plus
/// non-null losers.
pub async fn stage_participants(
    db: &Pool<Sqlite>,
    session_id: Uuid,
    stage: i64,
) -> Result<Vec<Uuid>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT winner_id FROM choices WHERE session_id = ?1 AND stage = ?2
        UNION
        SELECT loser_id FROM choices
        WHERE session_id = ?1 AND stage = ?2 AND loser_id IS NOT NULL
        "#,
    )
    .bind(session_id.to_string())
    .bind(stage)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|(id,)| matchup_common::db::models::parse_uuid(id, "choices participant"))
        .collect()
}

/// All (stage, winner, loser) rows of a session in creation order, the
/// grid reconstructor's input.
pub async fn grid_rows(
    db: &Pool<Sqlite>,
    session_id: Uuid,
) -> Result<Vec<(i64, Uuid, Option<Uuid>)>> {
    let rows: Vec<(i64, String, Option<String>)> = sqlx::query_as(
        "SELECT stage, winner_id, loser_id FROM choices
         WHERE session_id = ?
         ORDER BY created_at, rowid",
    )
    .bind(session_id.to_string())
    .fetch_all(db)
    .await?;

    rows.into_iter()
        .map(|(stage, winner, loser)| {
            let winner = matchup_common::db::models::parse_uuid(&winner, "choices.winner_id")?;
            let loser = loser
                .map(|l| matchup_common::db::models::parse_uuid(&l, "choices.loser_id"))
                .transpose()?;
            Ok((stage, winner, loser))
        })
        .collect()
}

/// Winner of the chronologically last persisted choice. For an ended
/// session this is the champion.
pub async fn last_winner(db: &Pool<Sqlite>, session_id: Uuid) -> Result<Option<Uuid>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT winner_id FROM choices
         WHERE session_id = ?
         ORDER BY stage DESC, created_at DESC, rowid DESC
         LIMIT 1",
    )
    .bind(session_id.to_string())
    .fetch_optional(db)
    .await?;

    row.map(|(winner,)| matchup_common::db::models::parse_uuid(&winner, "choices.winner_id"))
        .transpose()
}

/// 1-based chronological position of a choice within its own stage.
/// Fallback for viewing choices that predate the current stage.
pub async fn stage_position(db: &Pool<Sqlite>, choice: &ChoiceRecord) -> Result<i64> {
    let position: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM choices
        WHERE session_id = ? AND stage = ?
          AND (created_at < ?
               OR (created_at = ? AND rowid <= (SELECT rowid FROM choices WHERE id = ?)))
        "#,
    )
    .bind(choice.session_id.to_string())
    .bind(choice.stage)
    .bind(&choice.created_at)
    .bind(&choice.created_at)
    .bind(choice.id.to_string())
    .fetch_one(db)
    .await?;

    Ok(position)
}

/// Count every choice of a session, across all stages.
pub async fn count_for_session(db: &Pool<Sqlite>, session_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM choices WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(db)
        .await?;

    Ok(count)
}
