//! Move outcome bookkeeping: swap counters, per-type move statistics and
//! abort reasons.

use super::MoveType;
use crate::ids::BlockTypeId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Result of evaluating one proposed move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MoveResult {
    /// The move was committed.
    Accepted,
    /// The move was evaluated and reverted.
    Rejected,
    /// The move was illegal and never applied.
    Aborted,
}

/// Cost breakdown of one evaluated move, used as the generator learning signal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveOutcomeStats {
    /// Combined normalized cost change.
    pub delta_cost_norm: f64,
    /// Normalized wiring cost change.
    pub delta_bb_cost_norm: f64,
    /// Normalized timing cost change.
    pub delta_timing_cost_norm: f64,
    /// Raw wiring cost change.
    pub delta_bb_cost_abs: f64,
    /// Raw timing cost change.
    pub delta_timing_cost_abs: f64,
    /// How the move ended.
    pub outcome: MoveResult,
}

impl Default for MoveOutcomeStats {
    fn default() -> Self {
        Self {
            delta_cost_norm: f64::NAN,
            delta_bb_cost_norm: f64::NAN,
            delta_timing_cost_norm: f64::NAN,
            delta_bb_cost_abs: f64::NAN,
            delta_timing_cost_abs: f64::NAN,
            outcome: MoveResult::Aborted,
        }
    }
}

/// Swap counters over a whole placement run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SwapStats {
    /// Committed moves.
    pub num_swap_accepted: usize,
    /// Evaluated and reverted moves.
    pub num_swap_rejected: usize,
    /// Illegal proposals.
    pub num_swap_aborted: usize,
    /// Number of `try_swap` calls, probes included.
    pub num_ts_called: usize,
}

impl SwapStats {
    /// Counts the outcome of one move.
    pub fn record(&mut self, result: MoveResult) {
        match result {
            MoveResult::Accepted => self.num_swap_accepted += 1,
            MoveResult::Rejected => self.num_swap_rejected += 1,
            MoveResult::Aborted => self.num_swap_aborted += 1,
        }
    }

    /// Moves that were evaluated or aborted.
    pub fn total(&self) -> usize {
        self.num_swap_accepted + self.num_swap_rejected + self.num_swap_aborted
    }
}

/// Proposed/accepted/rejected counts per (block type, move type).
#[derive(Clone, Debug, Default)]
pub struct MoveTypeStats {
    blk_type_moves: BTreeMap<(BlockTypeId, MoveType), usize>,
    accepted_moves: BTreeMap<(BlockTypeId, MoveType), usize>,
    rejected_moves: BTreeMap<(BlockTypeId, MoveType), usize>,
}

impl MoveTypeStats {
    /// Creates empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a proposal of `move_type` on a block of `block_type`.
    pub fn incr_blk_type_moves(&mut self, block_type: BlockTypeId, move_type: MoveType) {
        *self.blk_type_moves.entry((block_type, move_type)).or_default() += 1;
    }

    /// Counts the outcome of an evaluated proposal. Aborts are not counted.
    pub fn incr_accept_reject(
        &mut self,
        block_type: BlockTypeId,
        move_type: MoveType,
        result: MoveResult,
    ) {
        let key = (block_type, move_type);
        match result {
            MoveResult::Accepted => *self.accepted_moves.entry(key).or_default() += 1,
            MoveResult::Rejected => *self.rejected_moves.entry(key).or_default() += 1,
            MoveResult::Aborted => {}
        }
    }

    /// Proposals of `move_type` on blocks of `block_type`.
    pub fn proposed(&self, block_type: BlockTypeId, move_type: MoveType) -> usize {
        self.blk_type_moves
            .get(&(block_type, move_type))
            .copied()
            .unwrap_or(0)
    }

    /// Accepted proposals of `move_type` on blocks of `block_type`.
    pub fn accepted(&self, block_type: BlockTypeId, move_type: MoveType) -> usize {
        self.accepted_moves
            .get(&(block_type, move_type))
            .copied()
            .unwrap_or(0)
    }

    /// Rejected proposals of `move_type` on blocks of `block_type`.
    pub fn rejected(&self, block_type: BlockTypeId, move_type: MoveType) -> usize {
        self.rejected_moves
            .get(&(block_type, move_type))
            .copied()
            .unwrap_or(0)
    }

    /// Logs one line per (block type, move type) pair that saw a proposal.
    pub fn log_summary(&self, type_name: impl Fn(BlockTypeId) -> String) {
        for (&(block_type, move_type), &proposed) in &self.blk_type_moves {
            let accepted = self.accepted(block_type, move_type);
            let rejected = self.rejected(block_type, move_type);
            let aborted = proposed.saturating_sub(accepted + rejected);
            log::info!(
                "{:>12} {:>16}: proposed {proposed} ({:.1}% accepted, {:.1}% rejected, {:.1}% aborted)",
                type_name(block_type),
                move_type.to_string(),
                percent(accepted, proposed),
                percent(rejected, proposed),
                percent(aborted, proposed),
            );
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Counts why proposed moves were aborted.
#[derive(Clone, Debug, Default)]
pub struct MoveAbortionLogger {
    reasons: BTreeMap<&'static str, usize>,
}

impl MoveAbortionLogger {
    /// Records one abort for `reason`.
    pub fn log_move_abort(&mut self, reason: &'static str) {
        log::trace!("move aborted: {reason}");
        *self.reasons.entry(reason).or_default() += 1;
    }

    /// Number of aborts recorded for `reason`.
    pub fn count(&self, reason: &str) -> usize {
        self.reasons.get(reason).copied().unwrap_or(0)
    }

    /// All reasons with their counts.
    pub fn report(&self) -> BTreeMap<String, usize> {
        self.reasons
            .iter()
            .map(|(reason, &count)| ((*reason).to_owned(), count))
            .collect()
    }
}
