//! Placement entry point.
//!
//! [`place`] validates the inputs, builds a legal random starting placement
//! and runs the anneal: temperatures until the schedule exits, a zero
//! temperature quench, an optional checkpoint restore and a final
//! consistency check.

use crate::annealer::PlacementAnnealer;
use crate::checkpoint::PlacementCheckpoint;
use crate::costs::PlacerCosts;
use crate::delay_model::DelayModel;
use crate::device::{DeviceGrid, PlLoc};
use crate::error::PlaceError;
use crate::initial::initial_placement;
use crate::move_gen::{MoveGenerators, SwapStats};
use crate::netlist::ClusteredNetlist;
use crate::noc::NocCostHandler;
use crate::timing_info::SetupTimingInfo;
use crate::timing_update::PlacerTiming;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use strix_common::DiagnosticSink;
use strix_config::{validate_opts, PlacerOpts};

/// External collaborators of a placement run.
///
/// Timing-driven algorithms need both a timing analyzer and a delay model.
/// Without `move_generators` the generators named in the options are used.
#[derive(Default)]
pub struct PlacerCollaborators<'a> {
    /// Estimates connection delays from block locations.
    pub delay_model: Option<&'a dyn DelayModel>,
    /// Incremental setup timing analyzer.
    pub timing_info: Option<&'a mut dyn SetupTimingInfo>,
    /// Network-on-chip cost term.
    pub noc: Option<&'a mut dyn NocCostHandler>,
    /// Move generators replacing the built-in ones.
    pub move_generators: Option<MoveGenerators<'a>>,
}

/// Result of a placement run.
#[derive(Clone, Debug, Serialize)]
pub struct PlacementReport {
    /// Final location of every block, indexed by block id.
    pub block_locs: Vec<PlLoc>,
    /// Final costs.
    pub costs: PlacerCosts,
    /// Final critical path delay, in timing-driven runs.
    pub critical_path_delay: Option<f32>,
    /// Final worst negative setup slack, in timing-driven runs.
    pub setup_wns: Option<f32>,
    /// Final total negative setup slack, in timing-driven runs.
    pub setup_tns: Option<f32>,
    /// Temperatures run, quench included.
    pub num_temps: usize,
    /// Moves run by the inner loops.
    pub total_moves: usize,
    /// Swap counters, starting temperature probes included.
    pub swap_stats: SwapStats,
    /// Count of aborted proposals per reason.
    pub move_aborts: BTreeMap<String, usize>,
    /// Whether the final placement was replaced by a checkpoint.
    pub checkpoint_restored: bool,
}

/// Places `netlist` on `grid`.
///
/// Errors are also reported into `sink` as diagnostics.
pub fn place<'a>(
    netlist: &'a ClusteredNetlist,
    grid: &'a DeviceGrid,
    opts: &'a PlacerOpts,
    collaborators: PlacerCollaborators<'a>,
    sink: &'a DiagnosticSink,
) -> Result<PlacementReport, PlaceError> {
    run(netlist, grid, opts, collaborators, sink).map_err(|err| {
        sink.emit(err.to_diagnostic());
        err
    })
}

fn run<'a>(
    netlist: &'a ClusteredNetlist,
    grid: &'a DeviceGrid,
    opts: &'a PlacerOpts,
    collaborators: PlacerCollaborators<'a>,
    sink: &'a DiagnosticSink,
) -> Result<PlacementReport, PlaceError> {
    validate_opts(opts)?;

    let PlacerCollaborators {
        delay_model,
        timing_info,
        noc,
        move_generators,
    } = collaborators;

    let timing = if opts.needs_timing() {
        let info = timing_info.ok_or(PlaceError::MissingTimingAnalyzer(opts.place_algorithm))?;
        let delay_model = delay_model.ok_or(PlaceError::MissingDelayModel(opts.place_algorithm))?;
        Some(PlacerTiming::new(info, delay_model, netlist))
    } else {
        None
    };

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let block_locs = initial_placement(netlist, grid, &mut rng)?;
    log::info!(
        "Placing {} blocks and {} nets on a {}x{} grid",
        netlist.block_count(),
        netlist.net_count(),
        grid.width(),
        grid.height()
    );

    let move_generators =
        move_generators.unwrap_or_else(|| MoveGenerators::from_opts(&opts.moves));
    let mut annealer = PlacementAnnealer::new(
        opts,
        netlist,
        grid,
        block_locs,
        timing,
        noc,
        move_generators,
        rng,
        sink,
    );
    let mut checkpoint = PlacementCheckpoint::new();

    log::info!(
        "Tnum      Temp      Cost     BB_Cost     TD_Cost      CPD  Ac_Rate   Std_Dev   Rlim Crit_Exp  Tot_Moves"
    );
    loop {
        annealer.outer_loop_update_timing_info();
        annealer.save_checkpoint_if_needed(&mut checkpoint);
        annealer.placement_inner_loop()?;
        annealer.log_iteration_status();
        if !annealer.outer_loop_update_state() {
            break;
        }
    }

    annealer.start_quench();
    annealer.outer_loop_update_timing_info();
    annealer.placement_inner_loop()?;
    annealer.log_iteration_status();

    annealer.final_timing_update();

    let checkpoint_restored =
        opts.place_checkpointing && annealer.restore_checkpoint_if_better(&checkpoint);

    annealer.check_place()?;

    let costs = *annealer.costs();
    log::info!(
        "Placement cost: {:.6}, bb_cost: {:.6}, td_cost: {:.6e}",
        costs.cost,
        costs.bb_cost,
        costs.timing_cost
    );
    if let Some(cpd) = annealer.critical_path_delay() {
        log::info!("Placement estimated critical path delay: {cpd:.3}");
    }
    let swap_stats = annealer.swap_stats();
    log::info!(
        "Swaps called: {}, accepted: {}, rejected: {}, aborted: {}",
        swap_stats.num_ts_called,
        swap_stats.num_swap_accepted,
        swap_stats.num_swap_rejected,
        swap_stats.num_swap_aborted
    );
    annealer.log_move_stats();

    let negative_slack = annealer.setup_negative_slack();
    Ok(PlacementReport {
        block_locs: annealer.block_locs().to_vec(),
        costs,
        critical_path_delay: annealer.critical_path_delay(),
        setup_wns: negative_slack.map(|(wns, _)| wns),
        setup_tns: negative_slack.map(|(_, tns)| tns),
        num_temps: annealer.annealing_state().num_temps,
        total_moves: annealer.tot_iter(),
        swap_stats,
        move_aborts: annealer.move_abortion_logger().report(),
        checkpoint_restored,
    })
}
