//! Annealing schedule: temperature, range limit and criticality exponent.
//!
//! The [`AnnealingState`] is created with a tiny probe temperature, receives
//! an estimated starting temperature, and is updated once per outer
//! iteration from the success rate of the previous temperature. The
//! acceptance rule is the Metropolis criterion implemented by [`assess_swap`].

use crate::costs::PlacerCosts;
use crate::move_gen::MoveResult;
use rand::Rng;
use serde::Serialize;
use strix_config::{EffortScaling, PlacerOpts, ScheduleType};

/// Probe temperature used before the starting temperature is known.
pub const EPSILON: f32 = 1.0e-15;

/// Smallest range limit.
pub const FINAL_RLIM: f32 = 1.0;

/// Bisection iterations of the equilibrium temperature search.
const MAX_EQUILIBRIUM_ITERATIONS: usize = 100;

/// Relative precision at which the equilibrium search stops.
const EQUILIBRIUM_PRECISION: f64 = 1.0e-6;

/// Schedule variables mutated between temperatures.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnealingState {
    /// Current temperature.
    pub t: f32,
    /// Current range limit.
    pub rlim: f32,
    /// Decay factor chosen at the last outer update.
    pub alpha: f32,
    /// Current criticality exponent.
    pub crit_exponent: f32,
    /// Move budget of a full temperature.
    pub move_lim_max: i32,
    /// Move budget of the current temperature.
    pub move_lim: i32,
    /// Temperatures completed so far.
    pub num_temps: usize,
    inverse_delta_rlim: f32,
    upper_rlim: f32,
}

impl AnnealingState {
    /// Creates the state for a `width` x `height` device.
    pub fn new(
        first_t: f32,
        first_rlim: f32,
        first_move_lim: i32,
        first_crit_exponent: f32,
        width: usize,
        height: usize,
    ) -> Self {
        let inverse_delta_rlim = if first_rlim > FINAL_RLIM {
            1.0 / (first_rlim - FINAL_RLIM)
        } else {
            0.0
        };
        Self {
            t: first_t,
            rlim: first_rlim,
            alpha: 1.0,
            crit_exponent: first_crit_exponent,
            move_lim_max: first_move_lim,
            move_lim: first_move_lim,
            num_temps: 0,
            inverse_delta_rlim,
            upper_rlim: width.max(height).saturating_sub(1) as f32,
        }
    }

    /// Largest range limit, bounded by the device size.
    pub fn upper_rlim(&self) -> f32 {
        self.upper_rlim
    }

    /// Advances to the next temperature.
    ///
    /// Returns `false` once the anneal should stop and the quench begin.
    pub fn outer_loop_update(
        &mut self,
        success_rate: f32,
        costs: &PlacerCosts,
        opts: &PlacerOpts,
        num_nets: usize,
    ) -> bool {
        if opts.anneal_sched.schedule_type == ScheduleType::User {
            self.t *= opts.anneal_sched.alpha_t;
            return self.t >= opts.anneal_sched.exit_t;
        }

        let t_exit = 0.005 * costs.cost / num_nets as f64;

        self.alpha = if success_rate > 0.96 {
            0.5
        } else if success_rate > 0.8 {
            0.9
        } else if success_rate > 0.15 || self.rlim > 1.0 {
            0.95
        } else {
            0.8
        };
        self.t *= self.alpha;
        if f64::from(self.t) < t_exit || t_exit.is_nan() {
            return false;
        }

        self.update_rlim(success_rate);
        if opts.place_algorithm.is_timing_driven() {
            self.update_crit_exponent(opts);
        }
        true
    }

    fn update_rlim(&mut self, success_rate: f32) {
        self.rlim *= 1.0 - 0.44 + success_rate;
        self.rlim = self.rlim.min(self.upper_rlim).max(FINAL_RLIM);
    }

    /// Interpolates the exponent between its first and last value as the
    /// range limit shrinks; it reaches the last value at `FINAL_RLIM`.
    fn update_crit_exponent(&mut self, opts: &PlacerOpts) {
        let scale = 1.0 - (self.rlim - FINAL_RLIM) * self.inverse_delta_rlim;
        self.crit_exponent =
            scale * (opts.td_place_exp_last - opts.td_place_exp_first) + opts.td_place_exp_first;
    }

    /// Freezes the temperature at zero and restores the full move budget.
    pub fn start_quench(&mut self) {
        self.t = 0.0;
        self.move_lim = self.move_lim_max;
    }
}

/// Metropolis acceptance rule.
pub fn assess_swap(delta_c: f64, t: f32, rng: &mut impl Rng) -> MoveResult {
    if delta_c <= 0.0 {
        return MoveResult::Accepted;
    }
    if t == 0.0 {
        return MoveResult::Rejected;
    }
    let fnum: f32 = rng.gen();
    let prob_fac = (-delta_c / f64::from(t)).exp() as f32;
    if prob_fac > fnum {
        MoveResult::Accepted
    } else {
        MoveResult::Rejected
    }
}

/// Move budget per temperature for `num_blocks` blocks on `num_tiles` tiles.
pub fn get_initial_move_lim(opts: &PlacerOpts, num_blocks: usize, num_tiles: usize) -> i32 {
    let inner_num = f64::from(opts.anneal_sched.inner_num);
    let move_lim = match opts.effort_scaling {
        EffortScaling::Circuit => inner_num * (num_blocks as f64).powf(4.0 / 3.0),
        EffortScaling::DeviceCircuit => {
            inner_num * (num_tiles as f64).powf(2.0 / 3.0) * (num_blocks as f64).powf(2.0 / 3.0)
        }
    };
    (move_lim as i32).max(1)
}

/// Moves between two timing updates within a temperature.
///
/// A `divider` of 0 disables the extra updates.
pub fn get_place_inner_loop_num_cost_recompute(move_lim: i32, divider: u32) -> i32 {
    if divider == 0 {
        move_lim + 1
    } else {
        (0.5 + move_lim as f32 / divider as f32) as i32
    }
}

/// Sample standard deviation of `n` values with sum of squares
/// `sum_x_squared` and mean `av_x`.
pub fn get_std_dev(n: usize, sum_x_squared: f64, av_x: f64) -> f64 {
    let variance = if n <= 1 {
        0.0
    } else {
        (sum_x_squared - n as f64 * av_x * av_x) / (n - 1) as f64
    };
    // Small variances can round negative.
    if variance > 0.0 {
        variance.sqrt()
    } else {
        variance
    }
}

/// Temperature at which the expected cost increase of the `rejected` probe
/// moves offsets the realized decrease of the `accepted` ones.
///
/// Bisects `f(T) = sum(d * exp(-d / T) for rejected) + sum(accepted)` over
/// `[0, 3 * max |rejected|]`. Returns 0 when nothing was rejected.
pub fn equilibrium_temperature(accepted: &[f64], rejected: &[f64]) -> f64 {
    let max_rejected = rejected.iter().fold(0.0f64, |m, d| m.max(d.abs()));
    if rejected.is_empty() || max_rejected == 0.0 {
        return 0.0;
    }
    let realized: f64 = accepted.iter().sum();
    let balance = |t: f64| -> f64 {
        rejected.iter().map(|&d| d * (-d / t).exp()).sum::<f64>() + realized
    };

    let mut lo = 0.0;
    let mut hi = 3.0 * max_rejected;
    if balance(hi) < 0.0 {
        return hi;
    }
    for _ in 0..MAX_EQUILIBRIUM_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if balance(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= EQUILIBRIUM_PRECISION * hi {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Statistics of the accepted moves of one temperature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PlacerStatistics {
    /// Mean total cost over accepted moves.
    pub av_cost: f64,
    /// Mean wiring cost over accepted moves.
    pub av_bb_cost: f64,
    /// Mean timing cost over accepted moves.
    pub av_timing_cost: f64,
    /// Sum of squared total costs.
    pub sum_of_squares: f64,
    /// Accepted moves.
    pub success_num: usize,
    /// `success_num / move_lim`.
    pub success_rate: f32,
    /// Standard deviation of the total cost over accepted moves.
    pub std_dev: f64,
}

impl PlacerStatistics {
    /// Clears the accumulators for a new temperature.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Accumulates the costs after an accepted move.
    pub fn single_swap_update(&mut self, costs: &PlacerCosts) {
        self.success_num += 1;
        self.av_cost += costs.cost;
        self.av_bb_cost += costs.bb_cost;
        self.av_timing_cost += costs.timing_cost;
        self.sum_of_squares += costs.cost * costs.cost;
    }

    /// Turns the accumulators into averages after `move_lim` moves.
    pub fn calc_iteration_stats(&mut self, costs: &PlacerCosts, move_lim: i32) {
        if self.success_num == 0 {
            self.av_cost = costs.cost;
            self.av_bb_cost = costs.bb_cost;
            self.av_timing_cost = costs.timing_cost;
        } else {
            let n = self.success_num as f64;
            self.av_cost /= n;
            self.av_bb_cost /= n;
            self.av_timing_cost /= n;
        }
        self.success_rate = self.success_num as f32 / move_lim as f32;
        self.std_dev = get_std_dev(self.success_num, self.sum_of_squares, self.av_cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn costs(cost: f64) -> PlacerCosts {
        PlacerCosts {
            cost,
            ..PlacerCosts::default()
        }
    }

    #[test]
    fn alpha_follows_success_rate() {
        let opts = PlacerOpts::bounding_box(1);
        let mut state = AnnealingState::new(1.0, 9.0, 100, 0.0, 10, 10);
        let cases = [(0.97, 0.5), (0.85, 0.9), (0.5, 0.95), (0.1, 0.95)];
        for (success, alpha) in cases {
            state.t = 1.0;
            assert!(state.outer_loop_update(success, &costs(1.0), &opts, 10));
            assert_eq!(state.alpha, alpha);
        }
        state.rlim = 1.0;
        state.t = 1.0;
        state.outer_loop_update(0.1, &costs(1.0), &opts, 10);
        assert_eq!(state.alpha, 0.8);
    }

    #[test]
    fn rlim_is_clamped() {
        let opts = PlacerOpts::bounding_box(1);
        let mut state = AnnealingState::new(1.0, 9.0, 100, 0.0, 10, 8);
        state.outer_loop_update(1.0, &costs(1.0), &opts, 10);
        assert_eq!(state.rlim, 9.0);
        for _ in 0..20 {
            state.t = 1.0;
            state.outer_loop_update(0.0, &costs(1.0), &opts, 10);
        }
        assert_eq!(state.rlim, FINAL_RLIM);
    }

    #[test]
    fn crit_exponent_reaches_last_at_final_rlim() {
        let opts = PlacerOpts::default();
        let mut state = AnnealingState::new(1.0, 9.0, 100, opts.td_place_exp_first, 10, 10);
        state.outer_loop_update(1.0, &costs(1.0), &opts, 10);
        assert_eq!(state.rlim, 9.0);
        assert_eq!(state.crit_exponent, opts.td_place_exp_first);
        for _ in 0..20 {
            state.t = 1.0;
            state.outer_loop_update(0.0, &costs(1.0), &opts, 10);
        }
        assert_eq!(state.crit_exponent, opts.td_place_exp_last);
    }

    #[test]
    fn auto_schedule_converges() {
        let opts = PlacerOpts::bounding_box(1);
        let mut state = AnnealingState::new(100.0, 9.0, 100, 0.0, 10, 10);
        let mut iterations = 0;
        while state.outer_loop_update(0.0, &costs(1.0), &opts, 10) {
            iterations += 1;
            assert!(iterations < 10_000);
        }
        assert!(f64::from(state.t) < 0.005 * 1.0 / 10.0);
    }

    #[test]
    fn no_nets_exits_immediately() {
        let opts = PlacerOpts::bounding_box(1);
        let mut state = AnnealingState::new(100.0, 9.0, 100, 0.0, 10, 10);
        assert!(!state.outer_loop_update(0.5, &costs(0.0), &opts, 0));
    }

    #[test]
    fn user_schedule_uses_fixed_alpha() {
        let mut opts = PlacerOpts::bounding_box(1);
        opts.anneal_sched.schedule_type = ScheduleType::User;
        opts.anneal_sched.alpha_t = 0.5;
        opts.anneal_sched.exit_t = 1.0;
        let mut state = AnnealingState::new(4.0, 9.0, 100, 0.0, 10, 10);
        assert!(state.outer_loop_update(0.0, &costs(1.0), &opts, 10));
        assert_eq!(state.t, 2.0);
        assert!(state.outer_loop_update(0.0, &costs(1.0), &opts, 10));
        assert!(!state.outer_loop_update(0.0, &costs(1.0), &opts, 10));
        assert_eq!(state.rlim, 9.0);
    }

    #[test]
    fn metropolis_rule() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(assess_swap(-1.0, 0.0, &mut rng), MoveResult::Accepted);
        assert_eq!(assess_swap(0.0, 0.0, &mut rng), MoveResult::Accepted);
        assert_eq!(assess_swap(1e-9, 0.0, &mut rng), MoveResult::Rejected);

        let accept_rate = |delta: f64| {
            let mut rng = StdRng::seed_from_u64(42);
            (0..2000)
                .filter(|_| assess_swap(delta, 1.0, &mut rng) == MoveResult::Accepted)
                .count()
        };
        let small = accept_rate(0.1);
        let large = accept_rate(2.0);
        assert!(small >= large);
        assert_eq!(accept_rate(1000.0), 0);
    }

    #[test]
    fn quench_freezes_temperature() {
        let mut state = AnnealingState::new(3.0, 5.0, 400, 1.0, 6, 6);
        state.move_lim = 10;
        state.start_quench();
        assert_eq!(state.t, 0.0);
        assert_eq!(state.move_lim, 400);
    }

    #[test]
    fn move_limits() {
        let mut opts = PlacerOpts::default();
        opts.anneal_sched.inner_num = 1.0;
        // Truncation may land one below the exact power.
        assert!((15..=16).contains(&get_initial_move_lim(&opts, 8, 100)));
        opts.effort_scaling = EffortScaling::DeviceCircuit;
        assert!((35..=36).contains(&get_initial_move_lim(&opts, 8, 27)));
        opts.anneal_sched.inner_num = 0.0;
        assert_eq!(get_initial_move_lim(&opts, 8, 27), 1);

        assert_eq!(get_place_inner_loop_num_cost_recompute(100, 0), 101);
        assert_eq!(get_place_inner_loop_num_cost_recompute(100, 3), 33);
        assert_eq!(get_place_inner_loop_num_cost_recompute(100, 8), 13);
    }

    #[test]
    fn std_dev_of_samples() {
        assert_eq!(get_std_dev(1, 4.0, 2.0), 0.0);
        // Samples 1, 2, 3.
        assert!((get_std_dev(3, 14.0, 2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn equilibrium_balances_costs() {
        assert_eq!(equilibrium_temperature(&[-1.0], &[]), 0.0);
        let accepted = [-0.5, -0.25];
        let rejected = [1.0, 2.0];
        let t = equilibrium_temperature(&accepted, &rejected);
        assert!(t > 0.0 && t <= 6.0);
        let balance: f64 = rejected.iter().map(|d| d * (-d / t).exp()).sum::<f64>() - 0.75;
        assert!(balance.abs() < 1e-4);
    }

    #[test]
    fn iteration_stats() {
        let mut stats = PlacerStatistics::default();
        stats.single_swap_update(&PlacerCosts {
            cost: 1.0,
            bb_cost: 10.0,
            timing_cost: 2.0,
            ..PlacerCosts::default()
        });
        stats.single_swap_update(&PlacerCosts {
            cost: 3.0,
            bb_cost: 20.0,
            timing_cost: 4.0,
            ..PlacerCosts::default()
        });
        stats.calc_iteration_stats(&PlacerCosts::default(), 4);
        assert_eq!(stats.av_cost, 2.0);
        assert_eq!(stats.av_bb_cost, 15.0);
        assert_eq!(stats.success_rate, 0.5);
        assert!((stats.std_dev - 2f64.sqrt()).abs() < 1e-12);

        stats.reset();
        stats.calc_iteration_stats(&costs(7.0), 4);
        assert_eq!(stats.av_cost, 7.0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
