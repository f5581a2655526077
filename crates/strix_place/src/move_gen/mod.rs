//! Move proposal.
//!
//! A [`MoveGenerator`] picks a block and a target location and records the
//! resulting relocations (a plain move into an empty slot, or a swap with
//! the occupant) into a [`BlocksToBeMoved`]. Generators never touch the
//! location registry; the annealer applies, commits or reverts the record.

mod critical_uniform;
mod stats;
mod uniform;

pub use critical_uniform::CriticalUniformMoveGenerator;
pub use stats::{MoveAbortionLogger, MoveOutcomeStats, MoveResult, MoveTypeStats, SwapStats};
pub use uniform::UniformMoveGenerator;

use crate::block_loc::{BlkLocRegistry, BlockMoveResult, BlocksToBeMoved};
use crate::criticalities::PlacerCriticalities;
use crate::device::{CompressedBlockGrids, DeviceGrid, PlLoc};
use crate::ids::{BlockId, BlockTypeId};
use crate::netlist::ClusteredNetlist;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::fmt;
use strix_config::{MoveGeneratorKind, MoveOpts, PlacerOpts};

/// Kind of a proposed move, used to bucket statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MoveType {
    /// Random block, random target within the range limit.
    Uniform,
    /// Driver of a highly critical connection, random target within the range limit.
    CriticalUniform,
}

impl fmt::Display for MoveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveType::Uniform => write!(f, "Uniform"),
            MoveType::CriticalUniform => write!(f, "Critical Uniform"),
        }
    }
}

/// Whether a proposal produced a usable move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateMove {
    /// The move is recorded in the [`BlocksToBeMoved`].
    Valid,
    /// No legal move was found; the record is empty.
    Abort,
}

/// What the caller asks of a generator, and what the generator did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProposedAction {
    /// Set by the generator to the kind of move it proposed.
    pub move_type: MoveType,
    /// Restricts the moved block to this type when set on input; set by the
    /// generator to the type of the block it picked.
    pub block_type: Option<BlockTypeId>,
}

impl ProposedAction {
    /// An unrestricted action.
    pub fn any() -> Self {
        Self {
            move_type: MoveType::Uniform,
            block_type: None,
        }
    }

    /// An action restricted to blocks of `block_type`.
    pub fn of_type(block_type: BlockTypeId) -> Self {
        Self {
            move_type: MoveType::Uniform,
            block_type: Some(block_type),
        }
    }
}

/// How a move outcome is turned into a generator reward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RewardFunction {
    /// Negated normalized cost change.
    #[default]
    Basic,
    /// Like [`RewardFunction::Basic`] but never negative.
    NonPenalizingBasic,
    /// Negated cost change re-weighted between wiring and timing.
    WlBiased,
}

/// Blocks that are not fixed, overall and per type.
#[derive(Clone, Debug, Default)]
pub struct MovableBlocks {
    all: Vec<BlockId>,
    per_type: Vec<Vec<BlockId>>,
}

impl MovableBlocks {
    /// Collects the movable blocks of `netlist`.
    pub fn new(netlist: &ClusteredNetlist) -> Self {
        let mut per_type = vec![Vec::new(); netlist.block_type_count()];
        let mut all = Vec::new();
        for block in netlist.blocks().iter().filter(|b| !b.is_fixed()) {
            all.push(block.id);
            per_type[block.block_type.index()].push(block.id);
        }
        Self { all, per_type }
    }

    /// Movable blocks of `block_type`, or all of them.
    pub fn of_type(&self, block_type: Option<BlockTypeId>) -> &[BlockId] {
        match block_type {
            Some(t) => self.per_type.get(t.index()).map_or(&[][..], Vec::as_slice),
            None => &self.all,
        }
    }

    /// Returns `true` if every block is fixed.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Picks a random movable block, restricted to `block_type` when set.
    pub fn random(&self, block_type: Option<BlockTypeId>, rng: &mut StdRng) -> Option<BlockId> {
        self.of_type(block_type).choose(rng).copied()
    }
}

/// Read-only placement state visible to a generator.
pub struct MoveContext<'a> {
    /// The netlist being placed.
    pub netlist: &'a ClusteredNetlist,
    /// The device grid.
    pub grid: &'a DeviceGrid,
    /// Per-type compressed grids.
    pub compressed: &'a CompressedBlockGrids,
    /// Current block locations.
    pub registry: &'a BlkLocRegistry,
    /// Connection criticalities, in timing-driven runs.
    pub criticalities: Option<&'a PlacerCriticalities>,
    /// Blocks eligible for moving.
    pub movable: &'a MovableBlocks,
}

/// A move proposal strategy.
pub trait MoveGenerator {
    /// Records a move into `blocks_affected` and sets `action.move_type`.
    ///
    /// `rlim` bounds the distance between a block and its target.
    fn propose_move(
        &mut self,
        blocks_affected: &mut BlocksToBeMoved,
        action: &mut ProposedAction,
        rlim: f32,
        ctx: &MoveContext<'_>,
        rng: &mut StdRng,
    ) -> CreateMove;

    /// Receives the reward of the last proposed move.
    fn process_outcome(&mut self, _reward: f64, _reward_fun: RewardFunction) {}

    /// The reward formulation this generator learns from.
    fn reward_function(&self) -> RewardFunction {
        RewardFunction::Basic
    }

    /// Converts an evaluated move into a reward and feeds it back.
    fn calculate_reward_and_process_outcome(
        &mut self,
        stats: &MoveOutcomeStats,
        delta_c: f64,
        timing_bb_factor: f64,
    ) {
        let reward_fun = self.reward_function();
        let reward = match reward_fun {
            RewardFunction::Basic => -stats.delta_cost_norm,
            RewardFunction::NonPenalizingBasic => {
                if delta_c < 0.0 {
                    -stats.delta_cost_norm
                } else {
                    0.0
                }
            }
            RewardFunction::WlBiased => {
                -(stats.delta_cost_norm
                    + (0.5 - timing_bb_factor) * stats.delta_timing_cost_norm
                    + timing_bb_factor * stats.delta_bb_cost_norm)
            }
        };
        self.process_outcome(reward, reward_fun);
    }
}

/// Instantiates the generator named by `kind`.
pub fn create_move_generator<'a>(kind: MoveGeneratorKind) -> Box<dyn MoveGenerator + 'a> {
    match kind {
        MoveGeneratorKind::Uniform => Box::new(UniformMoveGenerator::new()),
        MoveGeneratorKind::CriticalUniform => Box::new(CriticalUniformMoveGenerator::new()),
    }
}

/// The two generators of a run.
///
/// The first drives the early anneal, the second the late anneal and a
/// timing-driven quench (see [`use_second_generator`]).
pub struct MoveGenerators<'a> {
    /// Early-phase generator.
    pub first: Box<dyn MoveGenerator + 'a>,
    /// Late-phase generator.
    pub second: Box<dyn MoveGenerator + 'a>,
}

impl<'a> MoveGenerators<'a> {
    /// The built-in generators named in `moves`.
    pub fn from_opts(moves: &MoveOpts) -> Self {
        Self {
            first: create_move_generator(moves.first),
            second: create_move_generator(moves.second),
        }
    }
}

/// Phase of the generator-selection agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum AgentState {
    /// Exploration with the first generator.
    #[default]
    Early,
    /// Refinement with the second generator.
    Late,
}

/// Returns `true` if the second generator drives the next temperature.
///
/// During quench the second generator is used only for a timing-driven
/// quench with multistate enabled; otherwise it follows the agent state.
pub fn use_second_generator(opts: &PlacerOpts, agent_state: AgentState, quench: bool) -> bool {
    if quench {
        opts.place_quench_algorithm.is_timing_driven() && opts.place_agent_multistate
    } else {
        agent_state == AgentState::Late && opts.place_agent_multistate
    }
}

/// Records the move of `b_from` to `to`, swapping with the occupant of `to`
/// if there is one.
///
/// Aborts, leaving `blocks_affected` empty, if `to` is the current location,
/// if the occupant is fixed or of another type, or if the record rejects
/// the relocation.
pub fn create_move(
    blocks_affected: &mut BlocksToBeMoved,
    b_from: BlockId,
    to: PlLoc,
    netlist: &ClusteredNetlist,
    registry: &BlkLocRegistry,
) -> CreateMove {
    let from = registry.block_loc(b_from);
    if from == to {
        blocks_affected
            .move_abortion_logger
            .log_move_abort("target is current location");
        return CreateMove::Abort;
    }

    let outcome = match registry.grid_blocks().block_at_location(to) {
        None => blocks_affected.record_block_move(b_from, to, registry),
        Some(b_to) => {
            let occupant = netlist.block(b_to);
            if occupant.is_fixed() {
                blocks_affected
                    .move_abortion_logger
                    .log_move_abort("target block is fixed");
                BlockMoveResult::Abort
            } else if occupant.block_type != netlist.block(b_from).block_type {
                blocks_affected
                    .move_abortion_logger
                    .log_move_abort("target block type mismatch");
                BlockMoveResult::Abort
            } else if blocks_affected.record_block_move(b_from, to, registry)
                == BlockMoveResult::Abort
            {
                BlockMoveResult::Abort
            } else {
                blocks_affected.record_block_move(b_to, from, registry)
            }
        }
    };

    match outcome {
        BlockMoveResult::Valid => CreateMove::Valid,
        BlockMoveResult::Abort => {
            blocks_affected.clear_move_blocks();
            CreateMove::Abort
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        netlist: ClusteredNetlist,
        registry: BlkLocRegistry,
        blocks: Vec<BlockId>,
    }

    fn fixture() -> Fixture {
        let mut netlist = ClusteredNetlist::new();
        let logic = netlist.add_block_type("logic");
        let io = netlist.add_block_type("io");
        let grid = DeviceGrid::island(5, 5, logic, io, 1);
        let blocks = vec![
            netlist.add_block("a", logic),
            netlist.add_block("b", logic),
            netlist.add_fixed_block("c", logic, PlLoc::new(3, 3, 0)),
            netlist.add_block("p", io),
        ];
        let locs = vec![
            PlLoc::new(1, 1, 0),
            PlLoc::new(2, 1, 0),
            PlLoc::new(3, 3, 0),
            PlLoc::new(0, 1, 0),
        ];
        let registry = BlkLocRegistry::new(&grid, locs);
        Fixture {
            netlist,
            registry,
            blocks,
        }
    }

    #[test]
    fn move_into_empty_slot() {
        let f = fixture();
        let mut affected = BlocksToBeMoved::new();
        let to = PlLoc::new(2, 2, 0);
        let result = create_move(&mut affected, f.blocks[0], to, &f.netlist, &f.registry);
        assert_eq!(result, CreateMove::Valid);
        assert_eq!(affected.moved_blocks.len(), 1);
        assert_eq!(affected.moved_blocks[0].new_loc, to);
    }

    #[test]
    fn move_onto_occupant_swaps() {
        let f = fixture();
        let mut affected = BlocksToBeMoved::new();
        let result = create_move(
            &mut affected,
            f.blocks[0],
            PlLoc::new(2, 1, 0),
            &f.netlist,
            &f.registry,
        );
        assert_eq!(result, CreateMove::Valid);
        assert_eq!(affected.moved_blocks.len(), 2);
        assert_eq!(affected.moved_blocks[1].block, f.blocks[1]);
        assert_eq!(affected.moved_blocks[1].new_loc, PlLoc::new(1, 1, 0));
    }

    #[test]
    fn fixed_occupant_aborts() {
        let f = fixture();
        let mut affected = BlocksToBeMoved::new();
        let result = create_move(
            &mut affected,
            f.blocks[0],
            PlLoc::new(3, 3, 0),
            &f.netlist,
            &f.registry,
        );
        assert_eq!(result, CreateMove::Abort);
        assert!(affected.is_empty());
        assert_eq!(affected.move_abortion_logger.count("target block is fixed"), 1);
    }

    #[test]
    fn same_location_aborts() {
        let f = fixture();
        let mut affected = BlocksToBeMoved::new();
        let result = create_move(
            &mut affected,
            f.blocks[1],
            PlLoc::new(2, 1, 0),
            &f.netlist,
            &f.registry,
        );
        assert_eq!(result, CreateMove::Abort);
        assert!(affected.is_empty());
    }

    #[test]
    fn movable_blocks_skip_fixed() {
        let f = fixture();
        let movable = MovableBlocks::new(&f.netlist);
        assert_eq!(movable.of_type(None), &[f.blocks[0], f.blocks[1], f.blocks[3]]);
        assert_eq!(
            movable.of_type(Some(BlockTypeId::from_raw(0))),
            &[f.blocks[0], f.blocks[1]]
        );
        assert!(movable.of_type(Some(BlockTypeId::from_raw(9))).is_empty());
    }

    #[derive(Default)]
    struct Recording {
        rewards: Vec<f64>,
        reward_fun: RewardFunction,
    }

    impl MoveGenerator for Recording {
        fn propose_move(
            &mut self,
            _: &mut BlocksToBeMoved,
            _: &mut ProposedAction,
            _: f32,
            _: &MoveContext<'_>,
            _: &mut StdRng,
        ) -> CreateMove {
            CreateMove::Abort
        }

        fn process_outcome(&mut self, reward: f64, _: RewardFunction) {
            self.rewards.push(reward);
        }

        fn reward_function(&self) -> RewardFunction {
            self.reward_fun
        }
    }

    #[test]
    fn rewards_per_function() {
        let stats = MoveOutcomeStats {
            delta_cost_norm: 0.5,
            delta_bb_cost_norm: 0.25,
            delta_timing_cost_norm: 1.0,
            ..MoveOutcomeStats::default()
        };

        let mut basic = Recording::default();
        basic.calculate_reward_and_process_outcome(&stats, 1.0, 0.4);
        assert_eq!(basic.rewards, vec![-0.5]);

        let mut non_penalizing = Recording {
            reward_fun: RewardFunction::NonPenalizingBasic,
            ..Recording::default()
        };
        non_penalizing.calculate_reward_and_process_outcome(&stats, 1.0, 0.4);
        non_penalizing.calculate_reward_and_process_outcome(&stats, -1.0, 0.4);
        assert_eq!(non_penalizing.rewards, vec![0.0, -0.5]);

        let mut biased = Recording {
            reward_fun: RewardFunction::WlBiased,
            ..Recording::default()
        };
        biased.calculate_reward_and_process_outcome(&stats, 1.0, 0.5);
        assert_eq!(biased.rewards, vec![-(0.5 + 0.0 + 0.125)]);
    }

    #[test]
    fn second_generator_selection() {
        let mut opts = PlacerOpts::default();
        assert!(!use_second_generator(&opts, AgentState::Early, false));
        assert!(use_second_generator(&opts, AgentState::Late, false));
        assert!(use_second_generator(&opts, AgentState::Early, true));
        opts.place_agent_multistate = false;
        assert!(!use_second_generator(&opts, AgentState::Late, false));
        assert!(!use_second_generator(&opts, AgentState::Early, true));
    }
}
