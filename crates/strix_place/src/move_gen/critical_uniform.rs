//! Moves of blocks driving highly critical connections.

use super::{create_move, CreateMove, MoveContext, MoveGenerator, MoveType, ProposedAction};
use crate::block_loc::BlocksToBeMoved;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Picks a random highly critical connection and moves the block driving it
/// to a random compatible location within the range limit.
#[derive(Debug, Default)]
pub struct CriticalUniformMoveGenerator;

impl CriticalUniformMoveGenerator {
    /// Creates the generator.
    pub fn new() -> Self {
        Self
    }
}

impl MoveGenerator for CriticalUniformMoveGenerator {
    fn propose_move(
        &mut self,
        blocks_affected: &mut BlocksToBeMoved,
        action: &mut ProposedAction,
        rlim: f32,
        ctx: &MoveContext<'_>,
        rng: &mut StdRng,
    ) -> CreateMove {
        action.move_type = MoveType::CriticalUniform;

        let Some(&(net, _ipin)) = ctx
            .criticalities
            .and_then(|crit| crit.highly_crit_pins().choose(rng))
        else {
            blocks_affected
                .move_abortion_logger
                .log_move_abort("no highly critical connection");
            return CreateMove::Abort;
        };

        let b_from = ctx.netlist.net_driver_block(net);
        let block = ctx.netlist.block(b_from);
        if block.is_fixed() {
            blocks_affected
                .move_abortion_logger
                .log_move_abort("critical driver is fixed");
            return CreateMove::Abort;
        }
        if action.block_type.is_some_and(|t| t != block.block_type) {
            blocks_affected
                .move_abortion_logger
                .log_move_abort("critical driver type mismatch");
            return CreateMove::Abort;
        }
        action.block_type = Some(block.block_type);

        let from = ctx.registry.block_loc(b_from);
        let Some(to) = ctx
            .compressed
            .find_to_loc_uniform(ctx.grid, block.block_type, rlim, from, rng)
        else {
            blocks_affected
                .move_abortion_logger
                .log_move_abort("no target location in range");
            return CreateMove::Abort;
        };

        create_move(blocks_affected, b_from, to, ctx.netlist, ctx.registry)
    }
}
