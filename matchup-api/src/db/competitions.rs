//! Competition and candidate queries
//!
//! The provider side of the engine's Competition/Candidate capability:
//! published-competition lookup, candidate listing in creation order, and
//! candidate counting. Insertion helpers exist for seeding and tests; the
//! service itself exposes no competition CRUD.

use matchup_common::db::models::{candidate_from_row, competition_from_row, Candidate, Competition};
use matchup_common::Result;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// Fetch a competition only if it exists and is published.
pub async fn get_published(db: &Pool<Sqlite>, id: Uuid) -> Result<Option<Competition>> {
    let row = sqlx::query("SELECT * FROM competitions WHERE id = ? AND published = 1")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(competition_from_row).transpose()
}

/// List candidate ids of a competition in creation order.
pub async fn candidate_ids(db: &Pool<Sqlite>, competition_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT id FROM candidates WHERE competition_id = ? ORDER BY created_at, rowid",
    )
    .bind(competition_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|(id,)| matchup_common::db::models::parse_uuid(id, "candidates.id"))
        .collect()
}

/// Count candidates of a competition.
pub async fn candidate_count(db: &Pool<Sqlite>, competition_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candidates WHERE competition_id = ?")
        .bind(competition_id.to_string())
        .fetch_one(db)
        .await?;

    Ok(count)
}

/// Fetch full candidate records by id, in candidate creation order.
pub async fn candidates_by_ids(
    db: &Pool<Sqlite>,
    competition_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Candidate>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    // UUIDs are typed, so formatting them into the IN list is injection-safe.
    let id_list = ids
        .iter()
        .map(|id| format!("'{}'", id))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT * FROM candidates
         WHERE competition_id = ? AND id IN ({})
         ORDER BY created_at, rowid",
        id_list
    );

    let rows = sqlx::query(&sql)
        .bind(competition_id.to_string())
        .fetch_all(db)
        .await?;

    rows.iter().map(candidate_from_row).collect()
}

/// Insert a competition. Used by seeding and tests.
pub async fn insert(db: &Pool<Sqlite>, id: Uuid, title: &str, published: bool) -> Result<()> {
    sqlx::query("INSERT INTO competitions (id, title, published) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(title)
        .bind(published)
        .execute(db)
        .await?;

    Ok(())
}

/// Insert a candidate. Used by seeding and tests.
pub async fn insert_candidate(
    db: &Pool<Sqlite>,
    id: Uuid,
    competition_id: Uuid,
    title: &str,
) -> Result<()> {
    sqlx::query("INSERT INTO candidates (id, competition_id, title) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(competition_id.to_string())
        .bind(title)
        .execute(db)
        .await?;

    Ok(())
}
