//! The simulated annealing engine.
//!
//! [`PlacementAnnealer`] owns the mutable placement state of one run and
//! drives it through temperatures. Each move goes through the same
//! transaction: propose, apply, stage incremental cost changes, decide with
//! the Metropolis criterion, then commit or revert every store together so
//! that the incremental costs never drift from a recomputation.

use crate::block_loc::BlocksToBeMoved;
use crate::checkpoint::{save_placement_checkpoint_if_needed, PlacementCheckpoint};
use crate::costs::{isclose, PlacerCosts, PL_INCREMENTAL_COST_TOLERANCE};
use crate::criticalities::PlaceCritParams;
use crate::device::{CompressedBlockGrids, DeviceGrid, PlLoc};
use crate::error::PlaceError;
use crate::move_gen::{
    use_second_generator, AgentState, CreateMove, MovableBlocks, MoveAbortionLogger, MoveContext,
    MoveGenerator, MoveGenerators, MoveOutcomeStats, MoveResult, MoveTypeStats, ProposedAction,
    SwapStats, UniformMoveGenerator,
};
use crate::net_cost::{CostMethod, NetCostHandler, TimingDeltaInputs};
use crate::netlist::ClusteredNetlist;
use crate::noc::NocCostHandler;
use crate::placer_timing::comp_td_single_connection_delay;
use crate::schedule::{
    assess_swap, equilibrium_temperature, get_initial_move_lim,
    get_place_inner_loop_num_cost_recompute, get_std_dev, AnnealingState, PlacerStatistics,
    EPSILON,
};
use crate::state::PlacerState;
use crate::timing_update::PlacerTiming;
use rand::rngs::StdRng;
use rand::Rng;
use strix_common::{Category, Diagnostic, DiagnosticCode, DiagnosticSink, InternalError};
use strix_config::{PlaceAlgorithm, PlacerOpts, ScheduleType, StartingTemperature};

/// Moves between two from-scratch cost recomputations.
const MAX_MOVES_BEFORE_RECOMPUTE: usize = 500_000;

/// Weight between wiring and timing in the biased reward.
const REWARD_BB_TIMING_RELATIVE_WEIGHT: f64 = 0.4;

/// Success rate window in which the agent switches to its late phase.
const AGENT_LATE_ALPHA_MIN: f32 = 0.6;
const AGENT_LATE_ALPHA_MAX: f32 = 0.85;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GeneratorSlot {
    First,
    Second,
}

/// How the delta of a move is combined from its cost terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeltaMode {
    BoundingBox,
    Criticality,
    Slack,
}

/// Simulated annealing over one placement.
pub struct PlacementAnnealer<'a> {
    opts: &'a PlacerOpts,
    netlist: &'a ClusteredNetlist,
    grid: &'a DeviceGrid,
    sink: &'a DiagnosticSink,
    timing: Option<PlacerTiming<'a>>,
    noc: Option<&'a mut dyn NocCostHandler>,

    state: PlacerState,
    blocks_affected: BlocksToBeMoved,
    costs: PlacerCosts,
    net_cost_handler: NetCostHandler,
    compressed: CompressedBlockGrids,
    movable: MovableBlocks,
    move_generator_1: Box<dyn MoveGenerator + 'a>,
    move_generator_2: Box<dyn MoveGenerator + 'a>,
    rng: StdRng,

    annealing_state: AnnealingState,
    agent_state: AgentState,
    placer_stats: PlacerStatistics,
    swap_stats: SwapStats,
    move_type_stats: MoveTypeStats,

    outer_crit_iter_count: u32,
    moves_since_cost_recompute: usize,
    tot_iter: usize,
    inner_recompute_limit: i32,
    quench_recompute_limit: i32,
    quench_started: bool,
}

impl<'a> PlacementAnnealer<'a> {
    /// Sets up a run from a legal starting placement.
    ///
    /// `move_generators` propose the moves of the anneal; forced router
    /// swaps use a uniform generator of their own and are never reported to
    /// them. Computes the initial costs and normalization factors (running the
    /// first timing analysis when `timing` is given) and estimates the
    /// starting temperature, which consumes moves.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        opts: &'a PlacerOpts,
        netlist: &'a ClusteredNetlist,
        grid: &'a DeviceGrid,
        block_locs: Vec<PlLoc>,
        timing: Option<PlacerTiming<'a>>,
        noc: Option<&'a mut dyn NocCostHandler>,
        move_generators: MoveGenerators<'a>,
        rng: StdRng,
        sink: &'a DiagnosticSink,
    ) -> Self {
        let state = PlacerState::new(netlist, grid, block_locs);
        let first_crit_exponent = if opts.place_algorithm.is_timing_driven() {
            opts.td_place_exp_first
        } else {
            0.0
        };
        let move_lim = get_initial_move_lim(opts, netlist.block_count(), grid.num_tiles());
        let first_rlim = grid.width().max(grid.height()).saturating_sub(1) as f32;

        let mut annealer = Self {
            opts,
            netlist,
            grid,
            sink,
            timing,
            noc,
            state,
            blocks_affected: BlocksToBeMoved::new(),
            costs: PlacerCosts::default(),
            net_cost_handler: NetCostHandler::new(netlist),
            compressed: CompressedBlockGrids::new(grid, netlist.block_type_count()),
            movable: MovableBlocks::new(netlist),
            move_generator_1: move_generators.first,
            move_generator_2: move_generators.second,
            rng,
            annealing_state: AnnealingState::new(
                EPSILON,
                first_rlim,
                move_lim,
                first_crit_exponent,
                grid.width(),
                grid.height(),
            ),
            agent_state: AgentState::Early,
            placer_stats: PlacerStatistics::default(),
            swap_stats: SwapStats::default(),
            move_type_stats: MoveTypeStats::new(),
            outer_crit_iter_count: 1,
            moves_since_cost_recompute: 0,
            tot_iter: 0,
            inner_recompute_limit: get_place_inner_loop_num_cost_recompute(
                move_lim,
                opts.inner_loop_recompute_divider,
            ),
            quench_recompute_limit: get_place_inner_loop_num_cost_recompute(
                move_lim,
                opts.quench_recompute_divider,
            ),
            quench_started: false,
        };

        annealer.init_costs();
        annealer.annealing_state.t = annealer.estimate_starting_temperature();
        log::info!(
            "Initial placement cost: {:.6} bb_cost: {:.6} td_cost: {:.6e}",
            annealer.costs.cost,
            annealer.costs.bb_cost,
            annealer.costs.timing_cost
        );
        log::info!(
            "Starting temperature {:.6e}, {} moves per temperature",
            annealer.annealing_state.t,
            annealer.annealing_state.move_lim
        );
        annealer
    }

    fn init_costs(&mut self) {
        self.costs.bb_cost = self.net_cost_handler.comp_bb_cost(
            CostMethod::Normal,
            self.netlist,
            self.state.blk_loc_registry.block_locs(),
        );

        let crit_params = self.crit_params();
        if let Some(timing) = self.timing.as_mut() {
            self.state.timing.comp_td_connection_delays(
                self.netlist,
                self.state.blk_loc_registry.block_locs(),
                timing.delay_model,
            );
            timing.initialize(&crit_params, self.netlist, &mut self.state.timing, &mut self.costs);
        }

        if let Some(noc) = self.noc.as_mut() {
            self.costs.noc_cost =
                noc.recompute_costs_from_scratch(self.state.blk_loc_registry.block_locs());
        }

        self.costs.update_norm_factors(self.opts.place_algorithm);
        self.costs.cost = self
            .costs
            .get_total_cost(self.opts.place_algorithm, f64::from(self.opts.timing_tradeoff));
    }

    fn crit_params(&self) -> PlaceCritParams {
        PlaceCritParams {
            crit_exponent: self.annealing_state.crit_exponent,
            crit_limit: self.opts.place_crit_limit,
        }
    }

    fn delta_mode(&self, algorithm: PlaceAlgorithm) -> DeltaMode {
        match (algorithm, self.timing.is_some()) {
            (PlaceAlgorithm::CriticalityTiming, true) => DeltaMode::Criticality,
            (PlaceAlgorithm::SlackTiming, true) => DeltaMode::Slack,
            _ => DeltaMode::BoundingBox,
        }
    }

    fn estimate_starting_temperature(&mut self) -> f32 {
        if self.opts.anneal_sched.schedule_type == ScheduleType::User {
            return self.opts.anneal_sched.init_t;
        }

        let move_lim = self
            .annealing_state
            .move_lim_max
            .min(i32::try_from(self.netlist.block_count()).unwrap_or(i32::MAX));
        let algorithm = self.opts.place_algorithm;

        match self.opts.starting_temperature {
            StartingTemperature::StdDev => {
                let mut num_accepted = 0usize;
                let mut av = 0.0;
                let mut sum_of_squares = 0.0;
                for _ in 0..move_lim {
                    let stats = self.try_swap(GeneratorSlot::First, algorithm);
                    if stats.outcome == MoveResult::Accepted {
                        num_accepted += 1;
                        av += self.costs.cost;
                        sum_of_squares += self.costs.cost * self.costs.cost;
                    }
                }
                if num_accepted > 0 {
                    av /= num_accepted as f64;
                }
                let std_dev = get_std_dev(num_accepted, sum_of_squares, av);

                if num_accepted != move_lim as usize {
                    log::warn!(
                        "Starting t: {num_accepted} of {move_lim} configurations accepted"
                    );
                    self.sink.emit(Diagnostic::warning(
                        DiagnosticCode::new(Category::Placement, 101),
                        format!(
                            "only {num_accepted} of {move_lim} probe moves were accepted \
                             while estimating the starting temperature"
                        ),
                    ));
                }
                (std_dev / 64.0) as f32
            }
            StartingTemperature::Equilibrium => {
                let probe_t = self.annealing_state.t;
                self.annealing_state.t = 0.0;
                let mut accepted = Vec::new();
                let mut rejected = Vec::new();
                for _ in 0..move_lim {
                    let stats = self.try_swap(GeneratorSlot::First, algorithm);
                    match stats.outcome {
                        MoveResult::Accepted => accepted.push(stats.delta_cost_norm),
                        MoveResult::Rejected => rejected.push(stats.delta_cost_norm),
                        MoveResult::Aborted => {}
                    }
                }
                self.annealing_state.t = probe_t;
                equilibrium_temperature(&accepted, &rejected) as f32
            }
        }
    }

    /// Proposes, evaluates and commits or reverts one move.
    fn try_swap(&mut self, slot: GeneratorSlot, algorithm: PlaceAlgorithm) -> MoveOutcomeStats {
        self.swap_stats.num_ts_called += 1;

        let crit_params = self.crit_params();
        let mode = self.delta_mode(algorithm);
        let mut stats = MoveOutcomeStats::default();
        let mut action = ProposedAction::any();

        let rlim = if self.opts.rlim_escape_fraction > 0.0
            && self.rng.gen::<f32>() < self.opts.rlim_escape_fraction
        {
            f32::INFINITY
        } else {
            self.annealing_state.rlim
        };

        let router_type = match self.noc.as_ref() {
            Some(noc) if self.rng.gen_range(0..100) < self.opts.noc_swap_percentage => {
                Some(noc.router_block_type())
            }
            _ => None,
        };

        let create_move_outcome = {
            let ctx = MoveContext {
                netlist: self.netlist,
                grid: self.grid,
                compressed: &self.compressed,
                registry: &self.state.blk_loc_registry,
                criticalities: self.timing.as_ref().map(|t| &t.criticalities),
                movable: &self.movable,
            };
            match router_type {
                Some(router_type) => {
                    action = ProposedAction::of_type(router_type);
                    UniformMoveGenerator::new().propose_move(
                        &mut self.blocks_affected,
                        &mut action,
                        rlim,
                        &ctx,
                        &mut self.rng,
                    )
                }
                None => {
                    let generator = match slot {
                        GeneratorSlot::First => &mut self.move_generator_1,
                        GeneratorSlot::Second => &mut self.move_generator_2,
                    };
                    generator.propose_move(
                        &mut self.blocks_affected,
                        &mut action,
                        rlim,
                        &ctx,
                        &mut self.rng,
                    )
                }
            }
        };

        if let Some(block_type) = action.block_type {
            self.move_type_stats
                .incr_blk_type_moves(block_type, action.move_type);
        }

        let mut delta_c = 0.0;
        let mut bb_delta_c = 0.0;
        let mut timing_delta_c = 0.0;

        let outcome = if create_move_outcome == CreateMove::Abort {
            MoveResult::Aborted
        } else {
            self.state
                .blk_loc_registry
                .apply_move_blocks(&self.blocks_affected);

            let timing_inputs = self.timing.as_ref().map(|t| TimingDeltaInputs {
                timing_ctx: &mut self.state.timing,
                criticalities: &t.criticalities,
                delay_model: t.delay_model,
            });
            (bb_delta_c, timing_delta_c) = self.net_cost_handler.find_affected_nets_and_update_costs(
                self.netlist,
                self.state.blk_loc_registry.block_locs(),
                &mut self.blocks_affected,
                timing_inputs,
            );

            let tradeoff = f64::from(self.opts.timing_tradeoff);
            delta_c = match (mode, self.timing.as_mut()) {
                (DeltaMode::Criticality, Some(_)) => {
                    (1.0 - tradeoff) * bb_delta_c * self.costs.bb_cost_norm
                        + tradeoff * timing_delta_c * self.costs.timing_cost_norm
                }
                (DeltaMode::Slack, Some(timing)) => {
                    // Slack analysis needs the proposed delays in the committed
                    // store; they are recomputed if the move is rejected.
                    timing.invalidate_affected_connections(&self.blocks_affected.affected_pins);
                    self.state
                        .timing
                        .commit_td_cost(self.netlist, &self.blocks_affected.affected_pins);
                    timing.criticalities.disable_update();
                    timing.setup_slacks.enable_update();
                    timing.update_timing_classes(&crit_params, self.netlist, &self.state.timing);
                    timing.analyze_setup_slack_cost(self.netlist, &self.state.timing)
                        * self.costs.timing_cost_norm
                }
                _ => bb_delta_c * self.costs.bb_cost_norm,
            };

            let mut noc_delta_c = 0.0;
            if let Some(noc) = self.noc.as_mut() {
                noc_delta_c = noc.find_affected_noc_routers_and_update_noc_costs(
                    &self.blocks_affected,
                    self.state.blk_loc_registry.block_locs(),
                );
                delta_c += noc_delta_c;
            }

            let outcome = assess_swap(delta_c, self.annealing_state.t, &mut self.rng);
            if outcome == MoveResult::Accepted {
                self.commit_move(mode, delta_c, bb_delta_c, timing_delta_c, noc_delta_c);
            } else {
                self.revert_move(mode, &crit_params);
            }
            outcome
        };

        if let Some(block_type) = action.block_type {
            self.move_type_stats
                .incr_accept_reject(block_type, action.move_type, outcome);
        }
        self.swap_stats.record(outcome);

        stats.delta_cost_norm = delta_c;
        stats.delta_bb_cost_norm = bb_delta_c * self.costs.bb_cost_norm;
        stats.delta_timing_cost_norm = timing_delta_c * self.costs.timing_cost_norm;
        stats.delta_bb_cost_abs = bb_delta_c;
        stats.delta_timing_cost_abs = timing_delta_c;
        stats.outcome = outcome;

        // Forced router swaps are not the generator's decision.
        if router_type.is_none() {
            let generator = match slot {
                GeneratorSlot::First => &mut self.move_generator_1,
                GeneratorSlot::Second => &mut self.move_generator_2,
            };
            generator.calculate_reward_and_process_outcome(
                &stats,
                delta_c,
                REWARD_BB_TIMING_RELATIVE_WEIGHT,
            );
        }

        self.blocks_affected.clear_move_blocks();
        stats
    }

    fn commit_move(
        &mut self,
        mode: DeltaMode,
        delta_c: f64,
        bb_delta_c: f64,
        timing_delta_c: f64,
        noc_delta_c: f64,
    ) {
        self.costs.cost += delta_c;
        self.costs.bb_cost += bb_delta_c;

        if let Some(timing) = self.timing.as_mut() {
            self.costs.timing_cost += timing_delta_c;
            if mode == DeltaMode::Slack {
                self.state
                    .timing
                    .commit_setup_slacks(self.netlist, &timing.setup_slacks);
            } else {
                timing.invalidate_affected_connections(&self.blocks_affected.affected_pins);
                self.state
                    .timing
                    .commit_td_cost(self.netlist, &self.blocks_affected.affected_pins);
            }
        }

        self.net_cost_handler.update_move_nets(self.netlist);
        self.state
            .blk_loc_registry
            .commit_move_blocks(&self.blocks_affected);

        if let Some(noc) = self.noc.as_mut() {
            noc.commit_noc_costs();
            self.costs.noc_cost += noc_delta_c;
        }
    }

    fn revert_move(&mut self, mode: DeltaMode, crit_params: &PlaceCritParams) {
        self.net_cost_handler.reset_move_nets();
        self.state
            .blk_loc_registry
            .revert_move_blocks(&self.blocks_affected);

        if let Some(timing) = self.timing.as_mut() {
            if mode == DeltaMode::Slack {
                self.state.timing.comp_td_connection_delays(
                    self.netlist,
                    self.state.blk_loc_registry.block_locs(),
                    timing.delay_model,
                );
                self.costs.timing_cost = self
                    .state
                    .timing
                    .comp_td_costs(self.netlist, &timing.criticalities);
                timing.invalidate_affected_connections(&self.blocks_affected.affected_pins);
                timing.update_timing_classes(crit_params, self.netlist, &self.state.timing);
                debug_assert!(
                    self.state
                        .timing
                        .verify_connection_setup_slacks(self.netlist, &timing.setup_slacks),
                    "setup slacks diverged after reverting a move"
                );
            } else {
                self.state
                    .timing
                    .revert_td_cost(self.netlist, &self.blocks_affected.affected_pins);
            }
        }

        if let Some(noc) = self.noc.as_mut() {
            noc.revert_noc_traffic_flow_routes(&self.blocks_affected);
        }
    }

    fn perform_full_timing_update(&mut self) {
        let crit_params = self.crit_params();
        if let Some(timing) = self.timing.as_mut() {
            timing.perform_full_timing_update(
                &crit_params,
                self.netlist,
                &mut self.state.timing,
                &mut self.costs,
            );
        }
    }

    /// Refreshes timing information between temperatures, then the
    /// normalization factors and the total cost.
    pub fn outer_loop_update_timing_info(&mut self) {
        if self.timing.is_some() && self.opts.place_algorithm.is_timing_driven() {
            if self.outer_crit_iter_count >= self.opts.recompute_crit_iter
                || self.opts.inner_loop_recompute_divider != 0
            {
                self.perform_full_timing_update();
                self.outer_crit_iter_count = 0;
            }
            self.outer_crit_iter_count += 1;
        }

        self.costs.update_norm_factors(self.opts.place_algorithm);
        self.costs.cost = self
            .costs
            .get_total_cost(self.opts.place_algorithm, f64::from(self.opts.timing_tradeoff));
    }

    /// Runs the moves of one temperature.
    pub fn placement_inner_loop(&mut self) -> Result<(), PlaceError> {
        self.placer_stats.reset();

        let slot = if use_second_generator(self.opts, self.agent_state, self.quench_started) {
            GeneratorSlot::Second
        } else {
            GeneratorSlot::First
        };
        let algorithm = if self.quench_started {
            self.opts.place_quench_algorithm
        } else {
            self.opts.place_algorithm
        };
        let recompute_limit = if self.quench_started {
            self.quench_recompute_limit
        } else {
            self.inner_recompute_limit
        };
        let timing_driven = self.timing.is_some() && algorithm.is_timing_driven();
        let move_lim = self.annealing_state.move_lim;

        let mut inner_crit_iter_count = 1;
        for inner_iter in 0..move_lim {
            let stats = self.try_swap(slot, algorithm);
            if stats.outcome == MoveResult::Accepted {
                self.placer_stats.single_swap_update(&self.costs);
            }

            if timing_driven {
                // The outer loop analyzes right after the last move.
                if inner_crit_iter_count >= recompute_limit && inner_iter != move_lim - 1 {
                    inner_crit_iter_count = 0;
                    self.perform_full_timing_update();
                }
                inner_crit_iter_count += 1;
            }

            self.moves_since_cost_recompute += 1;
            if self.moves_since_cost_recompute > MAX_MOVES_BEFORE_RECOMPUTE {
                self.recompute_costs_from_scratch()?;
                self.moves_since_cost_recompute = 0;
            }
        }

        self.placer_stats.calc_iteration_stats(&self.costs, move_lim);

        if !self.quench_started
            && self.opts.place_algorithm.is_timing_driven()
            && self.opts.place_agent_multistate
            && self.agent_state == AgentState::Early
            && self.annealing_state.alpha > AGENT_LATE_ALPHA_MIN
            && self.annealing_state.alpha < AGENT_LATE_ALPHA_MAX
        {
            self.agent_state = AgentState::Late;
            log::info!(
                "Agent's 2nd state at temperature {}: t={:.6e}",
                self.annealing_state.num_temps,
                self.annealing_state.t
            );
        }

        self.tot_iter += move_lim.max(0) as usize;
        self.annealing_state.num_temps += 1;
        Ok(())
    }

    /// Replaces the incremental costs with recomputed ones after checking
    /// that they agree.
    fn recompute_costs_from_scratch(&mut self) -> Result<(), PlaceError> {
        let new_bb_cost = self.net_cost_handler.recompute_bb_cost(self.netlist);
        check_cost("bb_cost", new_bb_cost, self.costs.bb_cost)?;
        self.costs.bb_cost = new_bb_cost;

        if let Some(timing) = self.timing.as_ref() {
            let new_timing_cost = self
                .state
                .timing
                .comp_td_costs(self.netlist, &timing.criticalities);
            check_cost("timing_cost", new_timing_cost, self.costs.timing_cost)?;
            self.costs.timing_cost = new_timing_cost;
        }

        if let Some(noc) = self.noc.as_mut() {
            self.costs.noc_cost =
                noc.recompute_costs_from_scratch(self.state.blk_loc_registry.block_locs());
        }

        if !self.opts.place_algorithm.is_timing_driven() {
            self.costs.cost = self
                .costs
                .get_total_cost(PlaceAlgorithm::BoundingBox, 0.0);
        }
        Ok(())
    }

    /// Advances the schedule. Returns `false` when annealing should stop.
    pub fn outer_loop_update_state(&mut self) -> bool {
        self.annealing_state.outer_loop_update(
            self.placer_stats.success_rate,
            &self.costs,
            self.opts,
            self.netlist.net_count(),
        )
    }

    /// Drops the temperature to zero for the final greedy pass.
    pub fn start_quench(&mut self) {
        self.quench_started = true;
        self.annealing_state.start_quench();
    }

    /// Runs a last full timing analysis on the final placement.
    pub fn final_timing_update(&mut self) {
        self.perform_full_timing_update();
    }

    /// Saves the placement into `checkpoint` once the agent is in its late
    /// phase and the placement improves on the saved one.
    pub fn save_checkpoint_if_needed(&self, checkpoint: &mut PlacementCheckpoint) -> bool {
        if !self.opts.place_checkpointing || self.agent_state != AgentState::Late {
            return false;
        }
        let Some(cpd) = self.critical_path_delay() else {
            return false;
        };
        save_placement_checkpoint_if_needed(
            checkpoint,
            self.state.blk_loc_registry.block_locs(),
            &self.costs,
            cpd,
        )
    }

    /// Restores `checkpoint` if it is better than the final placement.
    ///
    /// Returns `true` if the placement was replaced.
    pub fn restore_checkpoint_if_better(&mut self, checkpoint: &PlacementCheckpoint) -> bool {
        let Some(final_cpd) = self.critical_path_delay() else {
            return false;
        };
        if !checkpoint.should_restore(final_cpd, &self.costs) {
            return false;
        }

        let (block_locs, costs) = checkpoint.restore_placement();
        self.state.blk_loc_registry.set_all_locations(block_locs);
        self.costs = costs;

        if let Some(timing) = self.timing.as_mut() {
            timing.criticalities.set_recompute_required();
            timing.setup_slacks.set_recompute_required();
            self.state.timing.comp_td_connection_delays(
                self.netlist,
                self.state.blk_loc_registry.block_locs(),
                timing.delay_model,
            );
        }
        self.costs.bb_cost = self.net_cost_handler.comp_bb_cost(
            CostMethod::Normal,
            self.netlist,
            self.state.blk_loc_registry.block_locs(),
        );
        if let Some(timing) = self.timing.as_mut() {
            timing.invalidate_all_connections(self.netlist);
        }
        self.perform_full_timing_update();
        if let Some(noc) = self.noc.as_mut() {
            self.costs.noc_cost =
                noc.recompute_costs_from_scratch(self.state.blk_loc_registry.block_locs());
        }
        self.costs.update_norm_factors(self.opts.place_algorithm);
        self.costs.cost = self
            .costs
            .get_total_cost(self.opts.place_algorithm, f64::from(self.opts.timing_tradeoff));

        let restored_cpd = self.critical_path_delay().unwrap_or(f32::NAN);
        log::info!(
            "Placement restored from checkpoint: CPD {final_cpd:.3} -> {restored_cpd:.3}"
        );
        self.sink.emit(Diagnostic::note(
            DiagnosticCode::new(Category::Placement, 102),
            format!(
                "restored checkpointed placement (critical path {final_cpd:.3} -> {restored_cpd:.3})"
            ),
        ));
        true
    }

    /// Recomputes every cost from scratch and checks the final placement.
    pub fn check_place(&mut self) -> Result<(), PlaceError> {
        let bb_cost_check = self.net_cost_handler.comp_bb_cost(
            CostMethod::Check,
            self.netlist,
            self.state.blk_loc_registry.block_locs(),
        );
        check_cost("bb_cost", bb_cost_check, self.costs.bb_cost)?;

        if let Some(timing) = self.timing.as_ref() {
            let block_locs = self.state.blk_loc_registry.block_locs();
            let mut timing_cost_check = 0.0;
            for net in self.netlist.nets().iter().filter(|n| !n.is_ignored) {
                for ipin in 1..net.pins.len() {
                    let delay = comp_td_single_connection_delay(
                        self.netlist,
                        block_locs,
                        timing.delay_model,
                        net.id,
                        ipin,
                    );
                    timing_cost_check +=
                        f64::from(timing.criticalities.criticality(net.id, ipin) * delay);
                }
            }
            check_cost("timing_cost", timing_cost_check, self.costs.timing_cost)?;
        }

        if !self
            .state
            .blk_loc_registry
            .is_consistent(self.netlist, self.grid)
        {
            return Err(InternalError::new("block locations and site occupancy disagree").into());
        }
        Ok(())
    }

    /// Logs the statistics of the temperature just completed.
    pub fn log_iteration_status(&self) {
        let stats = &self.placer_stats;
        let state = &self.annealing_state;
        log::info!(
            "{:4} {:9.3e} {:9.6} {:11.6} {:11.5e} {:8.3} {:6.3} {:9.3e} {:6.2} {:5.2} {:8}",
            state.num_temps,
            state.t,
            stats.av_cost,
            stats.av_bb_cost,
            stats.av_timing_cost,
            self.critical_path_delay().unwrap_or(f32::NAN),
            stats.success_rate,
            stats.std_dev,
            state.rlim,
            state.crit_exponent,
            self.tot_iter
        );
    }

    /// Logs per block type and move type counts.
    pub fn log_move_stats(&self) {
        self.move_type_stats
            .log_summary(|t| self.netlist.block_type(t).name.clone());
    }

    /// Critical path delay of the last analysis, in timing-driven runs.
    pub fn critical_path_delay(&self) -> Option<f32> {
        self.timing.as_ref().map(PlacerTiming::critical_path_delay)
    }

    /// Worst and total negative setup slack of the last analysis.
    pub fn setup_negative_slack(&self) -> Option<(f32, f32)> {
        self.timing.as_ref().map(|t| {
            (
                t.info.setup_worst_negative_slack(),
                t.info.setup_total_negative_slack(),
            )
        })
    }

    /// Current block locations.
    pub fn block_locs(&self) -> &[PlLoc] {
        self.state.blk_loc_registry.block_locs()
    }

    /// Current costs.
    pub fn costs(&self) -> &PlacerCosts {
        &self.costs
    }

    /// Schedule variables.
    pub fn annealing_state(&self) -> &AnnealingState {
        &self.annealing_state
    }

    /// Statistics of the last temperature.
    pub fn placer_stats(&self) -> &PlacerStatistics {
        &self.placer_stats
    }

    /// Current phase of the generator-selection agent.
    pub fn agent_state(&self) -> AgentState {
        self.agent_state
    }

    /// Swap counters, probe moves included.
    pub fn swap_stats(&self) -> SwapStats {
        self.swap_stats
    }

    /// Per-type move statistics.
    pub fn move_type_stats(&self) -> &MoveTypeStats {
        &self.move_type_stats
    }

    /// Reasons of aborted proposals.
    pub fn move_abortion_logger(&self) -> &MoveAbortionLogger {
        &self.blocks_affected.move_abortion_logger
    }

    /// Moves evaluated by the inner loops, probes excluded.
    pub fn tot_iter(&self) -> usize {
        self.tot_iter
    }
}

fn check_cost(name: &str, from_scratch: f64, incremental: f64) -> Result<(), PlaceError> {
    if isclose(from_scratch, incremental, PL_INCREMENTAL_COST_TOLERANCE) {
        Ok(())
    } else {
        Err(InternalError::new(format!(
            "{name} recomputed from scratch is {from_scratch}, incremental value is {incremental}"
        ))
        .into())
    }
}
