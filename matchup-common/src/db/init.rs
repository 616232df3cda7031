//! Database schema initialization
//!
//! Creates the four tables the rating service uses. UUIDs are stored as
//! hyphenated TEXT, booleans as INTEGER 0/1, timestamps as RFC 3339 TEXT.
//! `sessions.choice_order` holds the ordered choice-id list for the
//! session's current stage as a JSON array; it is reset to `[]` on every
//! stage advance.

use crate::Result;
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Create all required tables and indexes if they do not exist.
/// Safe to call on every startup.
pub async fn initialize_schema(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS competitions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            id TEXT PRIMARY KEY,
            competition_id TEXT NOT NULL
                REFERENCES competitions(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            competition_id TEXT NOT NULL
                REFERENCES competitions(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            stage INTEGER NOT NULL DEFAULT 1,
            choice_order TEXT NOT NULL DEFAULT '[]',
            ended INTEGER NOT NULL DEFAULT 0,
            is_refreshed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS choices (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL
                REFERENCES sessions(id) ON DELETE CASCADE,
            winner_id TEXT NOT NULL,
            loser_id TEXT,
            stage INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_candidates_competition
         ON candidates(competition_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_choices_session
         ON choices(session_id, stage)",
    )
    .execute(pool)
    .await?;

    info!("Database schema initialization complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> Pool<Sqlite> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn creates_all_tables() {
        let pool = setup_pool().await;
        initialize_schema(&pool).await.unwrap();

        for table in ["competitions", "candidates", "sessions", "choices"] {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert!(exists, "table {} should exist", table);
        }
    }

    #[tokio::test]
    async fn initialization_is_idempotent() {
        let pool = setup_pool().await;
        initialize_schema(&pool).await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='sessions'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn session_defaults_apply() {
        let pool = setup_pool().await;
        initialize_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO competitions (id, title, published) VALUES ('c1', 'Test', 1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO sessions (id, competition_id, user_id) VALUES ('s1', 'c1', 'u1')")
            .execute(&pool)
            .await
            .unwrap();

        let (stage, choice_order, ended): (i64, String, bool) = sqlx::query_as(
            "SELECT stage, choice_order, ended FROM sessions WHERE id = 's1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(stage, 1);
        assert_eq!(choice_order, "[]");
        assert!(!ended);
    }
}
