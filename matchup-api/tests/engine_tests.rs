//! Engine-level tournament tests against an in-memory database
//!
//! Drives the rating engine directly (no HTTP) through full tournaments
//! and checks the elimination invariants: winners advance once per stage,
//! losers never return, refresh permutes without changing membership, and
//! the reconstructed grid nests recursively.

use matchup_api::db::{choices, competitions};
use matchup_api::engine::{ChooseView, RatingEngine};
use matchup_common::{db, Error};
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

async fn setup(candidates: usize) -> (RatingEngine, SqlitePool, Uuid, Vec<Uuid>) {
    let pool = db::connect_memory().await.unwrap();
    db::initialize_schema(&pool).await.unwrap();

    let competition_id = Uuid::new_v4();
    competitions::insert(&pool, competition_id, "Test competition", true)
        .await
        .unwrap();

    let mut ids = Vec::new();
    for i in 0..candidates {
        let id = Uuid::new_v4();
        competitions::insert_candidate(&pool, id, competition_id, &format!("Candidate {}", i))
            .await
            .unwrap();
        ids.push(id);
    }

    let engine = RatingEngine::new(pool.clone());
    (engine, pool, competition_id, ids)
}

/// Resolve the session to completion, always declaring the first listed
/// item the winner. Returns the number of `choose` calls made.
async fn play_to_end(engine: &RatingEngine, user: Uuid, session_id: Uuid) -> usize {
    let mut current = engine.last_choice(session_id).await.unwrap();
    let mut steps = 0;

    loop {
        let outcome: ChooseView = engine
            .choose(user, session_id, current.id, current.items[0])
            .await
            .unwrap();
        steps += 1;
        assert!(steps < 64, "tournament did not converge");

        if outcome.ended {
            return steps;
        }
        current = outcome.next_choice.expect("not ended but no next choice");
    }
}

#[tokio::test]
async fn four_candidate_tournament_runs_to_champion() {
    let (engine, pool, competition_id, _) = setup(4).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    assert_eq!(started.current_choice.stage, 1);
    assert_eq!(started.current_choice.round, 1);
    assert_eq!(started.current_choice.items.len(), 2);
    // The open choice never reveals its stored winner
    assert!(started.current_choice.winner_id.is_none());

    // Pairing 1 resolved: pairing 2 of stage 1 is drawn
    let first_winner = started.current_choice.items[0];
    let outcome = engine
        .choose(user, started.session_id, started.current_choice.id, first_winner)
        .await
        .unwrap();
    let second = outcome.next_choice.unwrap();
    assert!(!outcome.ended);
    assert_eq!(second.stage, 1);
    assert_eq!(second.round, 2);
    assert_eq!(second.prev, Some(started.current_choice.id));

    // Pairing 2 resolved: stage 1 pool is exhausted, stage 2 begins
    let second_winner = second.items[0];
    let outcome = engine
        .choose(user, started.session_id, second.id, second_winner)
        .await
        .unwrap();
    let final_pair = outcome.next_choice.unwrap();
    assert!(!outcome.ended);
    assert_eq!(final_pair.stage, 2);
    assert_eq!(final_pair.round, 1);

    // The stage-2 pool is exactly the two stage-1 winners
    let mut expected: Vec<Uuid> = vec![first_winner, second_winner];
    expected.sort_by_key(|id| id.to_string());
    assert_eq!(final_pair.items, expected);

    // Final pairing resolved: pool shrinks to one, tournament ends
    let champion = final_pair.items[0];
    let outcome = engine
        .choose(user, started.session_id, final_pair.id, champion)
        .await
        .unwrap();
    assert!(outcome.ended);
    assert!(outcome.next_choice.is_none());

    let session = engine.session_view(started.session_id).await.unwrap();
    assert!(session.ended);
    assert_eq!(session.stage, 3);
    assert!(session.choices.is_empty());
    assert_eq!(session.champion_id, Some(champion));
    assert!(!session.is_refreshable);

    // The champion bye is not persisted: 2 + 1 choices in total
    let count = choices::count_for_session(&pool, started.session_id)
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn elimination_invariants_hold_for_odd_pools() {
    // Nine candidates force byes at several stages.
    let (engine, pool, competition_id, _) = setup(9).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    play_to_end(&engine, user, started.session_id).await;

    let rows = choices::grid_rows(&pool, started.session_id).await.unwrap();

    // No candidate wins twice within one stage
    let mut per_stage: std::collections::HashMap<i64, HashSet<Uuid>> =
        std::collections::HashMap::new();
    for &(stage, winner, _) in &rows {
        assert!(
            per_stage.entry(stage).or_default().insert(winner),
            "candidate won twice in stage {}",
            stage
        );
    }

    // Once a loser, never seen again in later-created choices
    for (i, &(_, _, loser)) in rows.iter().enumerate() {
        let Some(loser) = loser else { continue };
        for &(_, later_winner, later_loser) in &rows[i + 1..] {
            assert_ne!(later_winner, loser, "eliminated candidate reappeared");
            assert_ne!(later_loser, Some(loser), "eliminated candidate reappeared");
        }
    }

    // The reconstructed grid nests recursively
    let grid = engine.grid(started.session_id).await.unwrap();
    for s in 1..grid.len() {
        for (i, &(winner, loser)) in grid[s].iter().enumerate() {
            assert_eq!(grid[s - 1][2 * i].0, winner);
            if let Some(loser) = loser {
                assert_eq!(grid[s - 1][2 * i + 1].0, loser);
            }
        }
    }
}

#[tokio::test]
async fn three_candidates_draw_a_bye_within_stage_one() {
    let (engine, _, competition_id, _) = setup(3).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    let outcome = engine
        .choose(
            user,
            started.session_id,
            started.current_choice.id,
            started.current_choice.items[0],
        )
        .await
        .unwrap();

    // One candidate was left over: the second stage-1 choice is a bye.
    let bye = outcome.next_choice.unwrap();
    assert_eq!(bye.stage, 1);
    assert_eq!(bye.items.len(), 1);

    // Resolving the bye advances to a two-candidate stage 2.
    let outcome = engine
        .choose(user, started.session_id, bye.id, bye.items[0])
        .await
        .unwrap();
    let final_pair = outcome.next_choice.unwrap();
    assert_eq!(final_pair.stage, 2);
    assert_eq!(final_pair.items.len(), 2);
}

#[tokio::test]
async fn resubmitting_a_decision_is_idempotent() {
    let (engine, pool, competition_id, _) = setup(4).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    let winner = started.current_choice.items[0];

    let first = engine
        .choose(user, started.session_id, started.current_choice.id, winner)
        .await
        .unwrap();
    let next_id = first.next_choice.unwrap().id;

    // Same decision again: same successor, no extra draw
    let second = engine
        .choose(user, started.session_id, started.current_choice.id, winner)
        .await
        .unwrap();
    assert_eq!(second.next_choice.unwrap().id, next_id);

    let count = choices::count_for_session(&pool, started.session_id)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn changing_a_decision_swaps_in_place() {
    let (engine, pool, competition_id, _) = setup(4).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    let choice_id = started.current_choice.id;
    let [a, b]: [Uuid; 2] = started.current_choice.items.clone().try_into().unwrap();

    engine.choose(user, started.session_id, choice_id, a).await.unwrap();
    // The user changes their mind before anything else happens
    engine.choose(user, started.session_id, choice_id, b).await.unwrap();

    // Now historical: the view reveals the latest decision
    let view = engine.choice(started.session_id, choice_id).await.unwrap();
    assert_eq!(view.winner_id, Some(b));

    let count = choices::count_for_session(&pool, started.session_id)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn declared_winner_must_be_a_pairing_member() {
    let (engine, _, competition_id, _) = setup(4).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    let err = engine
        .choose(user, started.session_id, started.current_choice.id, Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidChoice(_)));
}

#[tokio::test]
async fn foreign_sessions_are_invisible() {
    let (engine, _, competition_id, _) = setup(4).await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let started = engine.start(owner, competition_id).await.unwrap();
    let err = engine
        .choose(
            stranger,
            started.session_id,
            started.current_choice.id,
            started.current_choice.items[0],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn ended_sessions_reject_mutation() {
    let (engine, _, competition_id, _) = setup(2).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    play_to_end(&engine, user, started.session_id).await;

    let err = engine
        .choose(
            user,
            started.session_id,
            started.current_choice.id,
            started.current_choice.items[0],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let err = engine
        .refresh(user, started.session_id, started.current_choice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    // No open choice remains on an ended session
    let err = engine.last_choice(started.session_id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn refresh_preserves_pool_membership() {
    let (engine, _, competition_id, _) = setup(6).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();

    // Alive set before: open pairing members plus the unresolved pool
    let mut alive_before: HashSet<Uuid> =
        started.current_choice.items.iter().copied().collect();
    alive_before.extend(engine.pool_ids(started.session_id).await.unwrap());

    let refreshed = engine
        .refresh(user, started.session_id, started.current_choice.id)
        .await
        .unwrap();
    assert_eq!(refreshed.id, started.current_choice.id);
    assert!(refreshed.winner_id.is_none());

    let mut alive_after: HashSet<Uuid> = refreshed.items.iter().copied().collect();
    alive_after.extend(engine.pool_ids(started.session_id).await.unwrap());

    assert_eq!(alive_before, alive_after);
}

#[tokio::test]
async fn refresh_drops_later_choices() {
    let (engine, pool, competition_id, _) = setup(6).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    let first_id = started.current_choice.id;
    engine
        .choose(user, started.session_id, first_id, started.current_choice.items[0])
        .await
        .unwrap();
    assert_eq!(
        choices::count_for_session(&pool, started.session_id).await.unwrap(),
        2
    );

    // Refreshing the first choice truncates the stage back to one pairing
    engine.refresh(user, started.session_id, first_id).await.unwrap();

    assert_eq!(
        choices::count_for_session(&pool, started.session_id).await.unwrap(),
        1
    );
    let session = engine.session_view(started.session_id).await.unwrap();
    assert_eq!(session.choices, vec![first_id]);
    assert!(session.is_refreshed);
    assert!(!session.is_refreshable);
}

#[tokio::test]
async fn refresh_is_single_use_per_stage() {
    let (engine, _, competition_id, _) = setup(4).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();
    engine
        .refresh(user, started.session_id, started.current_choice.id)
        .await
        .unwrap();

    let current = engine.last_choice(started.session_id).await.unwrap();
    let err = engine
        .refresh(user, started.session_id, current.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    // Finishing the stage resets the flag: stage 2 may refresh again
    let outcome = engine
        .choose(user, started.session_id, current.id, current.items[0])
        .await
        .unwrap();
    let second = outcome.next_choice.unwrap();
    let outcome = engine
        .choose(user, started.session_id, second.id, second.items[0])
        .await
        .unwrap();
    let stage_two = outcome.next_choice.unwrap();
    assert_eq!(stage_two.stage, 2);

    engine
        .refresh(user, started.session_id, stage_two.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn totals_follow_the_bracket_arithmetic() {
    let (engine, _, competition_id, _) = setup(6).await;
    let user = Uuid::new_v4();

    // ceil(log2(6)) = 3 stages
    assert_eq!(engine.stages_total(competition_id).await.unwrap(), 3);

    let started = engine.start(user, competition_id).await.unwrap();
    // Stage 1: ceil(6 / 2) = 3 pairings
    assert_eq!(
        engine.rounds_total(user, started.session_id).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn stage_items_cover_pool_and_participants() {
    let (engine, _, competition_id, candidates) = setup(4).await;
    let user = Uuid::new_v4();

    let started = engine.start(user, competition_id).await.unwrap();

    // At stage 1 every candidate is either pooled or already paired
    let items = engine.stage_items(started.session_id).await.unwrap();
    let ids: HashSet<Uuid> = items.iter().map(|c| c.id).collect();
    assert_eq!(ids, candidates.iter().copied().collect());

    // Two candidates remain un-drawn after the first pairing
    let pool_ids = engine.pool_ids(started.session_id).await.unwrap();
    assert_eq!(pool_ids.len(), 2);
}

#[tokio::test]
async fn unpublished_competitions_cannot_start() {
    let pool = db::connect_memory().await.unwrap();
    db::initialize_schema(&pool).await.unwrap();

    let competition_id = Uuid::new_v4();
    competitions::insert(&pool, competition_id, "Draft", false)
        .await
        .unwrap();
    competitions::insert_candidate(&pool, Uuid::new_v4(), competition_id, "Only one")
        .await
        .unwrap();

    let engine = RatingEngine::new(pool);
    let err = engine.start(Uuid::new_v4(), competition_id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn empty_competitions_cannot_start() {
    let (engine, pool, _, _) = setup(4).await;

    // Published but without a single candidate
    let empty_id = Uuid::new_v4();
    competitions::insert(&pool, empty_id, "Empty", true)
        .await
        .unwrap();

    let err = engine.start(Uuid::new_v4(), empty_id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Unknown competitions are indistinguishable from absent ones
    let err = engine.start(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
