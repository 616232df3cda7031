//! Rating/Tournament engine
//!
//! Owns the session lifecycle: `start` creates a session and its first
//! pairing, `choose` records a decision and draws the next pairing
//! (advancing the stage when the pool runs dry, ending the tournament
//! when a post-advance pool holds one candidate), `refresh` redoes the
//! open pairing once per stage. Read views never reveal the winner of the
//! still-open choice.
//!
//! Mutations serialize on a per-session lock and write multi-row changes
//! inside a transaction; the pool/grid caches are refilled or dropped at
//! every mutation site, never left to expire.

use chrono::{SecondsFormat, Utc};
use matchup_common::db::models::{Candidate, ChoiceRecord, SessionRecord};
use matchup_common::{Cache, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{choices, competitions, sessions};

pub mod draw;
pub mod grid;
pub mod locks;
pub mod pool;

use draw::Pairing;
use locks::SessionLocks;

// ============================================================================
// View types
// ============================================================================

/// One matchup as shown to the caller. `items` is sorted lexicographically
/// so the stored winner position leaks nothing about an undecided pairing;
/// `winner_id` is present only for historical (already-advanced) choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceView {
    pub id: Uuid,
    pub items: Vec<Uuid>,
    pub stage: i64,
    pub round: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartView {
    pub session_id: Uuid,
    pub current_choice: ChoiceView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_choice: Option<ChoiceView>,
    pub ended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub user_id: Uuid,
    pub stage: i64,
    pub choices: Vec<Uuid>,
    pub ended: bool,
    pub is_refreshed: bool,
    pub is_refreshable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub champion_id: Option<Uuid>,
}

// ============================================================================
// Engine
// ============================================================================

/// The tournament engine. Cheap to clone; clones share the pool, cache,
/// and lock registry.
#[derive(Clone)]
pub struct RatingEngine {
    db: SqlitePool,
    cache: Cache,
    locks: SessionLocks,
}

/// Draw with the thread-local RNG. Kept synchronous so the RNG never
/// lives across an await point.
fn draw_now(ids: &mut Vec<Uuid>) -> Option<Pairing> {
    draw::draw(ids, &mut rand::thread_rng())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl RatingEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            cache: Cache::new(),
            locks: SessionLocks::new(),
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Start a new rating session for a published competition: create the
    /// session at stage 1, draw the first pairing from the full candidate
    /// pool, and prime the pool cache with the remainder.
    pub async fn start(&self, user_id: Uuid, competition_id: Uuid) -> Result<StartView> {
        let competition = competitions::get_published(&self.db, competition_id)
            .await?
            .ok_or_else(|| Error::NotFound("Competition not found".to_string()))?;

        let mut pool_ids = competitions::candidate_ids(&self.db, competition_id).await?;
        if pool_ids.is_empty() {
            return Err(Error::NotFound(
                "Competition has no candidates".to_string(),
            ));
        }

        let pairing = draw_now(&mut pool_ids)
            .ok_or_else(|| Error::Internal("Draw from non-empty pool failed".to_string()))?;

        let session_id = Uuid::new_v4();
        let choice = ChoiceRecord {
            id: Uuid::new_v4(),
            session_id,
            winner_id: pairing.winner,
            loser_id: pairing.loser,
            stage: 1,
            created_at: now_rfc3339(),
        };
        let session = SessionRecord {
            id: session_id,
            competition_id,
            user_id,
            stage: 1,
            choice_order: vec![choice.id],
            ended: false,
            is_refreshed: false,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        };

        let mut tx = self.db.begin().await?;
        sessions::insert(&mut tx, &session).await?;
        choices::insert(&mut tx, &choice).await?;
        tx.commit().await?;

        pool::cache_pool(&self.cache, session_id, &pool_ids).await;

        info!(
            session_id = %session_id,
            competition_id = %competition_id,
            competition = %competition.title,
            "Started rating session"
        );

        let view = self.choice_view(&choice, &session.choice_order).await?;
        Ok(StartView {
            session_id,
            current_choice: view,
        })
    }

    /// Record the caller's decision on a pairing and hand back the next
    /// one. Re-submitting a decision on an already-resolved pairing is a
    /// no-op that returns the existing successor.
    pub async fn choose(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        choice_id: Uuid,
        winner_id: Uuid,
    ) -> Result<ChooseView> {
        let _guard = self.locks.acquire(session_id).await;

        let session = sessions::get_owned(&self.db, session_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        if session.ended {
            return Err(Error::Forbidden("Session has ended".to_string()));
        }

        let mut choice = choices::get(&self.db, session_id, choice_id)
            .await?
            .ok_or_else(|| Error::NotFound("Choice not found".to_string()))?;
        let index = session
            .choice_order
            .iter()
            .position(|id| *id == choice_id)
            .ok_or_else(|| {
                Error::NotFound("Choice is not part of the session's current stage".to_string())
            })?;

        if winner_id != choice.winner_id && Some(winner_id) != choice.loser_id {
            return Err(Error::InvalidChoice(
                "Declared winner is not part of this pairing".to_string(),
            ));
        }

        // The stored winner always reflects the user's latest decision.
        if choice.winner_id != winner_id {
            let demoted = choice.winner_id;
            choice.winner_id = winner_id;
            choice.loser_id = Some(demoted);
            choices::set_outcome(&self.db, choice_id, choice.winner_id, choice.loser_id).await?;
            // The swap moved a candidate into the losers-ever set.
            pool::invalidate(&self.cache, session_id).await;
            debug!(session_id = %session_id, choice_id = %choice_id, "Swapped pairing outcome");
        }

        if index + 1 < session.choice_order.len() {
            // Already-resolved pairing: the next choice is the existing
            // successor, nothing is drawn.
            let next_id = session.choice_order[index + 1];
            let next = choices::get(&self.db, session_id, next_id)
                .await?
                .ok_or_else(|| {
                    Error::Internal("Ordered list references a missing choice".to_string())
                })?;
            let view = self.choice_view(&next, &session.choice_order).await?;
            return Ok(ChooseView {
                next_choice: Some(view),
                ended: false,
            });
        }

        // The just-resolved choice was the last of its stage's list:
        // draw the next pairing from the remaining pool.
        let mut ids =
            pool::resolve(&self.db, &self.cache, session_id, session.stage, true).await?;

        if let Some(pairing) = draw_now(&mut ids) {
            let next =
                self.persist_next_choice(&session, session.stage, pairing, &ids, false).await?;
            let mut order = session.choice_order.clone();
            order.push(next.id);
            let view = self.choice_view(&next, &order).await?;
            return Ok(ChooseView {
                next_choice: Some(view),
                ended: false,
            });
        }

        // Stage pool exhausted: advance. Winners of the finished stage
        // are eligible again at the new stage number.
        let new_stage = session.stage + 1;
        let mut ids =
            pool::resolve(&self.db, &self.cache, session_id, new_stage, false).await?;
        let pairing = draw_now(&mut ids)
            .ok_or_else(|| Error::Internal("Stage advance found an empty pool".to_string()))?;

        if pairing.loser.is_none() {
            // One candidate left: the tournament is over and that
            // candidate is the champion. The bye itself is not persisted.
            let mut tx = self.db.begin().await?;
            sessions::update_progress(&mut tx, session_id, new_stage, &[], false, true).await?;
            tx.commit().await?;
            pool::invalidate(&self.cache, session_id).await;

            info!(
                session_id = %session_id,
                champion_id = %pairing.winner,
                stage = new_stage,
                "Tournament ended"
            );
            return Ok(ChooseView {
                next_choice: None,
                ended: true,
            });
        }

        let next = self.persist_next_choice(&session, new_stage, pairing, &ids, true).await?;
        let order = vec![next.id];
        info!(session_id = %session_id, stage = new_stage, "Stage advanced");
        let view = self.choice_view(&next, &order).await?;
        Ok(ChooseView {
            next_choice: Some(view),
            ended: false,
        })
    }

    /// Redo the open pairing once per stage: drop every choice after the
    /// target, return the target's candidates to the pool, and redraw the
    /// pairing in place. Elimination history before the target is kept.
    pub async fn refresh(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        choice_id: Uuid,
    ) -> Result<ChoiceView> {
        let _guard = self.locks.acquire(session_id).await;

        let session = sessions::get_owned(&self.db, session_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        if session.ended {
            return Err(Error::Forbidden("Session has ended".to_string()));
        }
        if session.is_refreshed {
            return Err(Error::Forbidden(
                "Session is already refreshed".to_string(),
            ));
        }

        let choice = choices::get(&self.db, session_id, choice_id)
            .await?
            .ok_or_else(|| Error::NotFound("Choice not found".to_string()))?;
        let index = session
            .choice_order
            .iter()
            .position(|id| *id == choice_id)
            .ok_or_else(|| {
                Error::NotFound("Choice is not part of the session's current stage".to_string())
            })?;

        // Drop everything drawn after the target choice.
        let mut order = session.choice_order.clone();
        let removed = order.split_off(index + 1);
        if !removed.is_empty() {
            let mut tx = self.db.begin().await?;
            choices::delete_many(&mut tx, session_id, &removed).await?;
            sessions::update_progress(&mut tx, session_id, session.stage, &order, false, false)
                .await?;
            tx.commit().await?;
            debug!(
                session_id = %session_id,
                dropped = removed.len(),
                "Dropped choices after refresh target"
            );
        }

        // The target's candidates go back into the pool before the redraw.
        let mut ids =
            pool::resolve(&self.db, &self.cache, session_id, session.stage, false).await?;
        ids.push(choice.winner_id);
        if let Some(loser) = choice.loser_id {
            ids.push(loser);
        }

        let pairing = draw_now(&mut ids)
            .ok_or_else(|| Error::Internal("Redraw from non-empty pool failed".to_string()))?;

        let mut tx = self.db.begin().await?;
        choices::set_outcome(&mut *tx, choice_id, pairing.winner, pairing.loser).await?;
        sessions::update_progress(&mut tx, session_id, session.stage, &order, true, false).await?;
        tx.commit().await?;

        pool::cache_pool(&self.cache, session_id, &ids).await;
        self.cache.delete(&pool::grid_key(session_id)).await;

        info!(session_id = %session_id, choice_id = %choice_id, "Refreshed pairing");

        let refreshed = ChoiceRecord {
            winner_id: pairing.winner,
            loser_id: pairing.loser,
            ..choice
        };
        self.choice_view(&refreshed, &order).await
    }

    // ------------------------------------------------------------------
    // Read views
    // ------------------------------------------------------------------

    /// Session state, including the derived refreshability flag and the
    /// champion once the tournament has ended.
    pub async fn session_view(&self, session_id: Uuid) -> Result<SessionView> {
        let session = sessions::get(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        let champion_id = if session.ended {
            choices::last_winner(&self.db, session_id).await?
        } else {
            None
        };

        Ok(SessionView {
            id: session.id,
            competition_id: session.competition_id,
            user_id: session.user_id,
            stage: session.stage,
            choices: session.choice_order.clone(),
            ended: session.ended,
            is_refreshed: session.is_refreshed,
            is_refreshable: !session.is_refreshed && !session.ended,
            champion_id,
        })
    }

    /// The still-open (most recent) choice of the current stage.
    pub async fn last_choice(&self, session_id: Uuid) -> Result<ChoiceView> {
        let session = sessions::get(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        let last_id = *session.choice_order.last().ok_or_else(|| {
            Error::NotFound("Session has no open choice".to_string())
        })?;
        let choice = choices::get(&self.db, session_id, last_id)
            .await?
            .ok_or_else(|| {
                Error::Internal("Ordered list references a missing choice".to_string())
            })?;

        self.choice_view(&choice, &session.choice_order).await
    }

    /// A specific choice of the session, current stage or historical.
    pub async fn choice(&self, session_id: Uuid, choice_id: Uuid) -> Result<ChoiceView> {
        let session = sessions::get(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        let choice = choices::get(&self.db, session_id, choice_id)
            .await?
            .ok_or_else(|| Error::NotFound("Choice not found".to_string()))?;

        self.choice_view(&choice, &session.choice_order).await
    }

    /// Remaining matches in the current stage:
    /// `ceil(candidate_count / 2^stage)`.
    pub async fn rounds_total(&self, user_id: Uuid, session_id: Uuid) -> Result<i64> {
        let session = sessions::get_owned(&self.db, session_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        let total = competitions::candidate_count(&self.db, session.competition_id).await?;
        let rounds = (total as f64 / 2f64.powi(session.stage as i32)).ceil() as i64;
        Ok(rounds)
    }

    /// Number of stages a full tournament of this competition takes:
    /// `ceil(log2(candidate_count))`.
    pub async fn stages_total(&self, competition_id: Uuid) -> Result<u32> {
        let count = competitions::candidate_count(&self.db, competition_id).await?;
        if count <= 0 {
            return Err(Error::NotFound(
                "Competition has no candidates".to_string(),
            ));
        }

        let n = count as u64;
        Ok(n.next_power_of_two().trailing_zeros())
    }

    /// Candidate records participating in the session's current stage:
    /// the eligible pool plus everyone already paired this stage.
    pub async fn stage_items(&self, session_id: Uuid) -> Result<Vec<Candidate>> {
        let session = sessions::get(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        let mut ids =
            pool::resolve(&self.db, &self.cache, session_id, session.stage, true).await?;
        ids.extend(choices::stage_participants(&self.db, session_id, session.stage).await?);
        ids.sort();
        ids.dedup();

        competitions::candidates_by_ids(&self.db, session.competition_id, &ids).await
    }

    /// Ids of the candidates still eligible to be drawn this stage.
    pub async fn pool_ids(&self, session_id: Uuid) -> Result<Vec<Uuid>> {
        let session = sessions::get(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        pool::resolve(&self.db, &self.cache, session_id, session.stage, true).await
    }

    /// The tree-ordered bracket of every stage so far.
    pub async fn grid(&self, session_id: Uuid) -> Result<Vec<Vec<grid::GridPair>>> {
        let key = pool::grid_key(session_id);
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(grid) = serde_json::from_str(&cached) {
                return Ok(grid);
            }
            self.cache.delete(&key).await;
        }

        // Missing session and empty history are indistinguishable in the
        // choices table; check the session first.
        sessions::get(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

        let rows = choices::grid_rows(&self.db, session_id).await?;
        let grid = grid::reconstruct(&rows)?;

        if let Ok(json) = serde_json::to_string(&grid) {
            self.cache.set_with_ttl(key, json, pool::CACHE_TTL).await;
        }

        Ok(grid)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Persist a freshly drawn choice together with the session-progress
    /// rewrite, then refill the pool cache with the post-draw remainder
    /// and drop the stale grid.
    async fn persist_next_choice(
        &self,
        session: &SessionRecord,
        stage: i64,
        pairing: Pairing,
        remainder: &[Uuid],
        stage_advanced: bool,
    ) -> Result<ChoiceRecord> {
        let next = ChoiceRecord {
            id: Uuid::new_v4(),
            session_id: session.id,
            winner_id: pairing.winner,
            loser_id: pairing.loser,
            stage,
            created_at: now_rfc3339(),
        };

        let (order, is_refreshed) = if stage_advanced {
            (vec![next.id], false)
        } else {
            let mut order = session.choice_order.clone();
            order.push(next.id);
            (order, session.is_refreshed)
        };

        let mut tx = self.db.begin().await?;
        choices::insert(&mut tx, &next).await?;
        sessions::update_progress(&mut tx, session.id, stage, &order, is_refreshed, false).await?;
        tx.commit().await?;

        pool::cache_pool(&self.cache, session.id, remainder).await;
        self.cache.delete(&pool::grid_key(session.id)).await;

        debug!(
            session_id = %session.id,
            choice_id = %next.id,
            stage,
            bye = pairing.loser.is_none(),
            "Drew next choice"
        );

        Ok(next)
    }

    /// Build the caller-facing view of a choice. For a choice of the
    /// current stage, `round`/`prev`/`next` come from the ordered list
    /// and the winner stays hidden while the choice is the open one; a
    /// historical choice falls back to its chronological position within
    /// its own stage.
    async fn choice_view(&self, choice: &ChoiceRecord, order: &[Uuid]) -> Result<ChoiceView> {
        let mut items = vec![choice.winner_id];
        items.extend(choice.loser_id);
        items.sort_by_key(|id| id.to_string());

        let view = match order.iter().position(|id| *id == choice.id) {
            Some(index) => {
                let is_open = index + 1 == order.len();
                ChoiceView {
                    id: choice.id,
                    items,
                    stage: choice.stage,
                    round: index as i64 + 1,
                    prev: (index > 0).then(|| order[index - 1]),
                    next: order.get(index + 1).copied(),
                    winner_id: (!is_open).then_some(choice.winner_id),
                }
            }
            None => {
                let round = choices::stage_position(&self.db, choice).await?;
                ChoiceView {
                    id: choice.id,
                    items,
                    stage: choice.stage,
                    round,
                    prev: None,
                    next: None,
                    winner_id: Some(choice.winner_id),
                }
            }
        };

        Ok(view)
    }
}
