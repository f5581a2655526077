//! Placement cost terms and their normalization.

use serde::Serialize;
use strix_config::PlaceAlgorithm;

/// Relative tolerance between incrementally maintained and recomputed costs.
pub const PL_INCREMENTAL_COST_TOLERANCE: f64 = 0.01;

/// Upper bound of a normalization factor, reached when a cost term is 0.
const MAX_INV_COST: f64 = 1.0e12;

/// Current cost terms of the placement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PlacerCosts {
    /// Normalized total cost.
    pub cost: f64,
    /// Total bounding-box wiring cost.
    pub bb_cost: f64,
    /// Total `criticality * delay` over all connections.
    pub timing_cost: f64,
    /// `1 / bb_cost`, refreshed once per temperature.
    pub bb_cost_norm: f64,
    /// `1 / timing_cost`, refreshed once per temperature.
    pub timing_cost_norm: f64,
    /// Additive NoC cost term.
    pub noc_cost: f64,
}

impl Default for PlacerCosts {
    fn default() -> Self {
        Self {
            cost: 0.0,
            bb_cost: 0.0,
            timing_cost: 0.0,
            bb_cost_norm: 0.0,
            timing_cost_norm: 0.0,
            noc_cost: 0.0,
        }
    }
}

impl PlacerCosts {
    /// Refreshes the normalization factors from the current cost terms.
    pub fn update_norm_factors(&mut self, algorithm: PlaceAlgorithm) {
        self.bb_cost_norm = (1.0 / self.bb_cost).min(MAX_INV_COST);
        if algorithm.is_timing_driven() {
            self.timing_cost_norm = (1.0 / self.timing_cost).min(MAX_INV_COST);
        }
    }

    /// Normalized total cost for `algorithm`.
    pub fn get_total_cost(&self, algorithm: PlaceAlgorithm, timing_tradeoff: f64) -> f64 {
        let mut total = match algorithm {
            PlaceAlgorithm::BoundingBox => self.bb_cost * self.bb_cost_norm,
            PlaceAlgorithm::CriticalityTiming | PlaceAlgorithm::SlackTiming => {
                (1.0 - timing_tradeoff) * self.bb_cost * self.bb_cost_norm
                    + timing_tradeoff * self.timing_cost * self.timing_cost_norm
            }
        };
        total += self.noc_cost;
        total
    }
}

/// Returns `true` if `a` and `b` differ by at most `rel_tol` of the larger magnitude.
pub fn isclose(a: f64, b: f64, rel_tol: f64) -> bool {
    a == b || (a - b).abs() <= rel_tol * a.abs().max(b.abs())
}
