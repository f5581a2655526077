//! Best-placement checkpoint for the late anneal.
//!
//! Once the anneal runs with its second move generator, the placement with
//! the best critical path delay is kept. If the anneal ends worse on delay
//! without a large wiring gain, the checkpoint is restored.

use crate::costs::PlacerCosts;
use crate::device::PlLoc;

/// Wiring cost slack allowed when deciding to restore a checkpoint.
const RESTORE_BB_COST_MARGIN: f64 = 1.05;

/// A saved placement and its costs.
#[derive(Clone, Debug, Default)]
pub struct PlacementCheckpoint {
    block_locs: Vec<PlLoc>,
    costs: PlacerCosts,
    cpd: f32,
    valid: bool,
}

impl PlacementCheckpoint {
    /// Creates an empty, invalid checkpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a placement has been saved.
    pub fn cp_is_valid(&self) -> bool {
        self.valid
    }

    /// Critical path delay of the saved placement.
    pub fn get_cp_cpd(&self) -> f32 {
        self.cpd
    }

    /// Wiring cost of the saved placement.
    pub fn get_cp_bb_cost(&self) -> f64 {
        self.costs.bb_cost
    }

    /// Saved block locations.
    pub fn block_locs(&self) -> &[PlLoc] {
        &self.block_locs
    }

    /// Stores a snapshot.
    pub fn save_placement(&mut self, block_locs: &[PlLoc], costs: &PlacerCosts, cpd: f32) {
        self.block_locs = block_locs.to_vec();
        self.costs = *costs;
        self.cpd = cpd;
        self.valid = true;
    }

    /// Returns the saved locations and costs.
    pub fn restore_placement(&self) -> (&[PlLoc], PlacerCosts) {
        (&self.block_locs, self.costs)
    }

    /// Whether the current placement should replace the checkpoint: there is
    /// none yet, or delay improves without a wiring regression.
    pub fn should_save(&self, cpd: f32, costs: &PlacerCosts) -> bool {
        !self.valid || (cpd < self.cpd && costs.bb_cost <= self.costs.bb_cost)
    }

    /// Whether the checkpoint should replace the final placement: delay
    /// regressed and the wiring cost is not more than 5% better than saved.
    pub fn should_restore(&self, cpd: f32, costs: &PlacerCosts) -> bool {
        self.valid && cpd > self.cpd && costs.bb_cost * RESTORE_BB_COST_MARGIN > self.costs.bb_cost
    }
}

/// Saves the placement into `checkpoint` if it improves on it.
///
/// Returns `true` if a snapshot was taken.
pub fn save_placement_checkpoint_if_needed(
    checkpoint: &mut PlacementCheckpoint,
    block_locs: &[PlLoc],
    costs: &PlacerCosts,
    cpd: f32,
) -> bool {
    if !checkpoint.should_save(cpd, costs) {
        return false;
    }
    checkpoint.save_placement(block_locs, costs, cpd);
    log::info!(
        "Checkpoint saved: bb_cost={:.6}, timing_cost={:.6}, CPD={:.3}",
        costs.bb_cost,
        costs.timing_cost,
        cpd
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn costs(bb_cost: f64, timing_cost: f64) -> PlacerCosts {
        PlacerCosts {
            bb_cost,
            timing_cost,
            ..PlacerCosts::default()
        }
    }

    #[test]
    fn first_save_always_happens() {
        let mut cp = PlacementCheckpoint::new();
        assert!(!cp.cp_is_valid());
        let locs = [PlLoc::new(1, 1, 0)];
        assert!(save_placement_checkpoint_if_needed(&mut cp, &locs, &costs(10.0, 1.0), 5.0));
        assert!(cp.cp_is_valid());
        assert_eq!(cp.get_cp_cpd(), 5.0);
        assert_eq!(cp.get_cp_bb_cost(), 10.0);
    }

    #[test]
    fn save_requires_better_delay_and_no_wiring_regression() {
        let mut cp = PlacementCheckpoint::new();
        cp.save_placement(&[], &costs(10.0, 1.0), 5.0);
        assert!(!cp.should_save(4.0, &costs(10.5, 1.0)));
        assert!(!cp.should_save(5.0, &costs(9.0, 1.0)));
        assert!(cp.should_save(4.0, &costs(10.0, 1.0)));
    }

    #[test]
    fn restore_conditions() {
        let mut cp = PlacementCheckpoint::new();
        assert!(!cp.should_restore(10.0, &costs(10.0, 1.0)));
        cp.save_placement(&[], &costs(10.0, 1.0), 5.0);
        assert!(cp.should_restore(6.0, &costs(10.0, 1.0)));
        assert!(!cp.should_restore(5.0, &costs(10.0, 1.0)));
        // Much better wiring keeps the current placement.
        assert!(!cp.should_restore(6.0, &costs(9.0, 1.0)));
    }

    #[test]
    fn round_trip_keeps_locations_and_costs() {
        let mut cp = PlacementCheckpoint::new();
        let locs = vec![PlLoc::new(1, 2, 0), PlLoc::new(3, 1, 0)];
        let saved = costs(12.5, 3.25);
        cp.save_placement(&locs, &saved, 7.0);
        let (restored_locs, restored_costs) = cp.restore_placement();
        assert_eq!(restored_locs, locs.as_slice());
        assert_eq!(restored_costs, saved);
    }
}
