//! Bracket grid reconstruction
//!
//! Choices are persisted in creation order, but pairings within a stage
//! are drawn randomly, so a stage's list does not align positionally with
//! the stage above it. The reconstructor fixes this top-down: iterating
//! stages from last to first, each pair `(w, l)` of stage `s+1` pulls the
//! stage-`s` pair won by `w` into the next unfilled slot, then the pair
//! won by `l` into the slot after it. Afterwards pair `i` of stage `s+1`
//! sits directly above pairs `2i` and `2i+1` of stage `s`.

use matchup_common::{Error, Result};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One rendered pair: winner plus optional loser (absent for a bye).
pub type GridPair = (Uuid, Option<Uuid>);

/// Reorder the chronological `(stage, winner, loser)` rows into a
/// tree-ordered bracket, one inner vec per stage, ascending.
pub fn reconstruct(rows: &[(i64, Uuid, Option<Uuid>)]) -> Result<Vec<Vec<GridPair>>> {
    let mut by_stage: BTreeMap<i64, Vec<GridPair>> = BTreeMap::new();
    for &(stage, winner, loser) in rows {
        by_stage.entry(stage).or_default().push((winner, loser));
    }
    let mut grid: Vec<Vec<GridPair>> = by_stage.into_values().collect();

    for i in (1..grid.len()).rev() {
        let (head, tail) = grid.split_at_mut(i);
        let prev_stage = &mut head[i - 1];
        let cur_stage = &tail[0];

        let mut slot = 0;
        for &(winner, loser) in cur_stage {
            let winner_index = feeder_index(prev_stage, winner)?;
            prev_stage.swap(slot, winner_index);
            slot += 1;

            if let Some(loser) = loser {
                let loser_index = feeder_index(prev_stage, loser)?;
                prev_stage.swap(slot, loser_index);
                slot += 1;
            }
        }
    }

    Ok(grid)
}

/// Index of the previous-stage pair won by `candidate`. Every member of a
/// stage-`s+1` pair advanced out of stage `s`, so a missing feeder means
/// the stored history is corrupt.
fn feeder_index(stage: &[GridPair], candidate: Uuid) -> Result<usize> {
    stage
        .iter()
        .position(|&(winner, _)| winner == candidate)
        .ok_or_else(|| {
            Error::Internal(format!(
                "Grid reconstruction: no feeder pair won by {}",
                candidate
            ))
        })
}
