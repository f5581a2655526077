//! End-to-end placement runs on small designs.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use strix_common::DiagnosticSink;
use strix_config::{PlaceAlgorithm, PlacerOpts, StartingTemperature};
use strix_place::block_loc::BlocksToBeMoved;
use strix_place::costs::isclose;
use strix_place::initial::initial_placement;
use strix_place::move_gen::{
    CreateMove, MoveContext, ProposedAction, RewardFunction, UniformMoveGenerator,
};
use strix_place::net_cost::{CostMethod, NetCostHandler};
use strix_place::{
    place, BlockTiming, ClusteredNetlist, ConnectionSta, DeviceGrid, MoveGenerator,
    MoveGenerators, NocCostHandler, PlLoc, PlacementReport, PlacerCollaborators,
    SimpleDelayModel, TrafficFlow, TrafficFlowNocCost,
};

struct Design {
    netlist: ClusteredNetlist,
    grid: DeviceGrid,
}

/// Two pipelines of logic blocks sharing a control net, between pads.
fn pipelines() -> Design {
    let mut netlist = ClusteredNetlist::new();
    let logic = netlist.add_block_type("logic");
    let io = netlist.add_block_type("io");
    let grid = DeviceGrid::island(10, 10, logic, io, 2);

    let ctrl = netlist.add_fixed_block("ctrl", io, PlLoc::new(0, 5, 0));
    let mut stage_heads = Vec::new();
    for p in 0..2 {
        let input = netlist.add_block(format!("in{p}"), io);
        let output = netlist.add_block(format!("out{p}"), io);
        let cells: Vec<_> = (0..8)
            .map(|i| netlist.add_block(format!("p{p}_c{i}"), logic))
            .collect();
        netlist.add_net(format!("p{p}_in"), input, &[cells[0]]);
        for (i, pair) in cells.windows(2).enumerate() {
            netlist.add_net(format!("p{p}_n{i}"), pair[0], &[pair[1]]);
        }
        netlist.add_net(format!("p{p}_out"), cells[7], &[output]);
        stage_heads.push(cells[0]);
        stage_heads.push(cells[4]);
    }
    netlist.add_net("ctrl", ctrl, &stage_heads);

    Design { netlist, grid }
}

const BLOCK_TIMING: [BlockTiming; 2] = [
    BlockTiming::Combinational { delay: 0.4 },
    BlockTiming::Sequential {
        setup: 0.1,
        clk_to_q: 0.2,
    },
];

const DELAY_MODEL: SimpleDelayModel = SimpleDelayModel {
    intercept: 0.1,
    per_tile: 0.25,
};

fn bb_cost_of(netlist: &ClusteredNetlist, locs: &[PlLoc]) -> f64 {
    NetCostHandler::new(netlist).comp_bb_cost(CostMethod::Check, netlist, locs)
}

fn assert_legal(design: &Design, report: &PlacementReport) {
    assert_eq!(report.block_locs.len(), design.netlist.block_count());
    let mut used = HashSet::new();
    for block in design.netlist.blocks() {
        let loc = report.block_locs[block.id.index()];
        assert!(
            design.grid.is_compatible(loc, block.block_type),
            "{} placed on an incompatible site {loc}",
            block.name
        );
        assert!(used.insert(loc), "two blocks share {loc}");
        if let Some(fixed) = block.fixed_loc {
            assert_eq!(loc, fixed);
        }
    }
}

fn run_timing(design: &Design, opts: &PlacerOpts) -> PlacementReport {
    let mut sta = ConnectionSta::new(&design.netlist, &BLOCK_TIMING, None).unwrap();
    let sink = DiagnosticSink::new();
    let collaborators = PlacerCollaborators {
        delay_model: Some(&DELAY_MODEL),
        timing_info: Some(&mut sta),
        noc: None,
        move_generators: None,
    };
    let report = place(&design.netlist, &design.grid, opts, collaborators, &sink).unwrap();
    assert!(!sink.has_errors());
    report
}

#[test]
fn bounding_box_anneal_improves_on_random_placement() {
    let design = pipelines();
    let opts = PlacerOpts::bounding_box(17);
    let sink = DiagnosticSink::new();
    let report = place(
        &design.netlist,
        &design.grid,
        &opts,
        PlacerCollaborators::default(),
        &sink,
    )
    .unwrap();
    assert_legal(&design, &report);

    let start = initial_placement(&design.netlist, &design.grid, &mut StdRng::seed_from_u64(17))
        .unwrap();
    let final_bb = bb_cost_of(&design.netlist, &report.block_locs);
    assert!(final_bb < bb_cost_of(&design.netlist, &start));
    assert!(isclose(final_bb, report.costs.bb_cost, 0.01));
    assert!(report.total_moves > 0);
    assert_eq!(
        report.swap_stats.total(),
        report.swap_stats.num_ts_called
    );
}

#[test]
fn same_seed_gives_same_placement() {
    let design = pipelines();
    let opts = PlacerOpts::bounding_box(5);
    let run = || {
        place(
            &design.netlist,
            &design.grid,
            &opts,
            PlacerCollaborators::default(),
            &DiagnosticSink::new(),
        )
        .unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first.block_locs, second.block_locs);
    assert_eq!(first.costs, second.costs);
    assert_eq!(first.swap_stats, second.swap_stats);
}

#[test]
fn criticality_timing_anneal_reports_delay() {
    let design = pipelines();
    let opts = PlacerOpts {
        seed: 23,
        ..PlacerOpts::default()
    };
    let report = run_timing(&design, &opts);
    assert_legal(&design, &report);
    let cpd = report.critical_path_delay.unwrap();
    // At least the cell delays and register overheads of one pipeline.
    assert!(cpd >= 8.0 * 0.4 + 0.3);
    // Timed against its own critical path, nothing fails by more than rounding.
    assert!(report.setup_wns.unwrap() > -1e-4);
    assert!(report.costs.timing_cost > 0.0);
}

#[test]
fn slack_timing_anneal_completes() {
    let design = pipelines();
    let opts = PlacerOpts {
        place_algorithm: PlaceAlgorithm::SlackTiming,
        place_quench_algorithm: PlaceAlgorithm::SlackTiming,
        seed: 2,
        ..PlacerOpts::default()
    };
    let report = run_timing(&design, &opts);
    assert_legal(&design, &report);
    assert!(report.critical_path_delay.is_some());
}

#[test]
fn timing_anneal_with_bounding_box_quench() {
    let design = pipelines();
    let opts = PlacerOpts {
        place_quench_algorithm: PlaceAlgorithm::BoundingBox,
        starting_temperature: StartingTemperature::Equilibrium,
        seed: 31,
        ..PlacerOpts::default()
    };
    let report = run_timing(&design, &opts);
    assert_legal(&design, &report);
}

#[test]
fn noc_cost_tracks_traffic_flows() {
    let mut design = pipelines();
    let router = design.netlist.add_block_type("router");
    for (x, y) in [(2, 2), (7, 2), (2, 7), (7, 7), (4, 4), (5, 5)] {
        design.grid.set_tile(x, y, router, 1);
    }
    let routers: Vec<_> = (0..4)
        .map(|i| design.netlist.add_block(format!("r{i}"), router))
        .collect();
    let flows = vec![
        TrafficFlow {
            source: routers[0],
            sink: routers[1],
            bandwidth: 2.0,
        },
        TrafficFlow {
            source: routers[2],
            sink: routers[3],
            bandwidth: 1.0,
        },
    ];
    let mut noc = TrafficFlowNocCost::new(router, 0.05, flows);
    let opts = PlacerOpts {
        noc_swap_percentage: 20,
        ..PlacerOpts::bounding_box(9)
    };
    let sink = DiagnosticSink::new();
    let collaborators = PlacerCollaborators {
        noc: Some(&mut noc),
        ..PlacerCollaborators::default()
    };
    let report = place(&design.netlist, &design.grid, &opts, collaborators, &sink).unwrap();
    assert_legal(&design, &report);
    assert!(isclose(report.costs.noc_cost, noc.total_cost(), 1e-6));
    let recomputed = noc.recompute_costs_from_scratch(&report.block_locs);
    assert!(isclose(recomputed, report.costs.noc_cost, 1e-6));
}

#[test]
fn report_serializes_to_json() {
    let design = pipelines();
    let report = place(
        &design.netlist,
        &design.grid,
        &PlacerOpts::bounding_box(1),
        PlacerCollaborators::default(),
        &DiagnosticSink::new(),
    )
    .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(
        json["block_locs"].as_array().unwrap().len(),
        design.netlist.block_count()
    );
    assert!(json["critical_path_delay"].is_null());
}

/// Uniform proposals that keep the rewards they are given.
struct RewardLog {
    inner: UniformMoveGenerator,
    rewards: Rc<Cell<usize>>,
}

impl MoveGenerator for RewardLog {
    fn propose_move(
        &mut self,
        blocks_affected: &mut BlocksToBeMoved,
        action: &mut ProposedAction,
        rlim: f32,
        ctx: &MoveContext<'_>,
        rng: &mut StdRng,
    ) -> CreateMove {
        self.inner.propose_move(blocks_affected, action, rlim, ctx, rng)
    }

    fn process_outcome(&mut self, reward: f64, _reward_fun: RewardFunction) {
        assert!(reward.is_finite());
        self.rewards.set(self.rewards.get() + 1);
    }
}

#[test]
fn custom_move_generators_receive_every_outcome() {
    let design = pipelines();
    let rewards = Rc::new(Cell::new(0));
    let generator = || -> Box<dyn MoveGenerator> {
        Box::new(RewardLog {
            inner: UniformMoveGenerator::new(),
            rewards: Rc::clone(&rewards),
        })
    };
    let collaborators = PlacerCollaborators {
        move_generators: Some(MoveGenerators {
            first: generator(),
            second: generator(),
        }),
        ..PlacerCollaborators::default()
    };
    let opts = PlacerOpts::bounding_box(4);
    let sink = DiagnosticSink::new();
    let report = place(&design.netlist, &design.grid, &opts, collaborators, &sink).unwrap();
    assert_legal(&design, &report);
    assert_eq!(rewards.get(), report.swap_stats.num_ts_called);
}

