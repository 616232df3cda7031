//! Row types shared between the service's query modules
//!
//! UUID columns are stored as hyphenated TEXT and parsed on read; a parse
//! failure means the row was written by something other than this service
//! and surfaces as an internal error rather than a panic.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// A competition: the provider-side container of candidates.
/// Only `published` and the candidate listing matter to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    pub id: Uuid,
    pub title: String,
    pub published: bool,
    pub created_at: String,
}

/// A candidate item; immutable for the engine's purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub title: String,
    pub created_at: String,
}

/// One tournament run. `choice_order` lists the choice ids of the
/// *current* stage in creation order; it is reset on stage advance.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub user_id: Uuid,
    pub stage: i64,
    pub choice_order: Vec<Uuid>,
    pub ended: bool,
    pub is_refreshed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One pairwise matchup. `loser_id` is absent for a bye.
#[derive(Debug, Clone)]
pub struct ChoiceRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub winner_id: Uuid,
    pub loser_id: Option<Uuid>,
    pub stage: i64,
    pub created_at: String,
}

pub fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in column {}: {}", column, e)))
}

pub fn competition_from_row(row: &SqliteRow) -> Result<Competition> {
    Ok(Competition {
        id: parse_uuid(&row.try_get::<String, _>("id")?, "competitions.id")?,
        title: row.try_get("title")?,
        published: row.try_get("published")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn candidate_from_row(row: &SqliteRow) -> Result<Candidate> {
    Ok(Candidate {
        id: parse_uuid(&row.try_get::<String, _>("id")?, "candidates.id")?,
        competition_id: parse_uuid(
            &row.try_get::<String, _>("competition_id")?,
            "candidates.competition_id",
        )?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn session_from_row(row: &SqliteRow) -> Result<SessionRecord> {
    let order_json: String = row.try_get("choice_order")?;
    let choice_order: Vec<Uuid> = serde_json::from_str(&order_json)
        .map_err(|e| Error::Internal(format!("Invalid choice_order JSON: {}", e)))?;

    Ok(SessionRecord {
        id: parse_uuid(&row.try_get::<String, _>("id")?, "sessions.id")?,
        competition_id: parse_uuid(
            &row.try_get::<String, _>("competition_id")?,
            "sessions.competition_id",
        )?,
        user_id: parse_uuid(&row.try_get::<String, _>("user_id")?, "sessions.user_id")?,
        stage: row.try_get("stage")?,
        choice_order,
        ended: row.try_get("ended")?,
        is_refreshed: row.try_get("is_refreshed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn choice_from_row(row: &SqliteRow) -> Result<ChoiceRecord> {
    let loser: Option<String> = row.try_get("loser_id")?;

    Ok(ChoiceRecord {
        id: parse_uuid(&row.try_get::<String, _>("id")?, "choices.id")?,
        session_id: parse_uuid(
            &row.try_get::<String, _>("session_id")?,
            "choices.session_id",
        )?,
        winner_id: parse_uuid(&row.try_get::<String, _>("winner_id")?, "choices.winner_id")?,
        loser_id: loser
            .map(|l| parse_uuid(&l, "choices.loser_id"))
            .transpose()?,
        stage: row.try_get("stage")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Serialize an ordered choice-id list for the `choice_order` column.
pub fn choice_order_json(order: &[Uuid]) -> String {
    serde_json::to_string(order).unwrap_or_else(|_| "[]".to_string())
}
