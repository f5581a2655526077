//! Uniform random moves.

use super::{create_move, CreateMove, MoveContext, MoveGenerator, MoveType, ProposedAction};
use crate::block_loc::BlocksToBeMoved;
use rand::rngs::StdRng;

/// Moves a random movable block to a random compatible location within the
/// range limit.
#[derive(Debug, Default)]
pub struct UniformMoveGenerator;

impl UniformMoveGenerator {
    /// Creates the generator.
    pub fn new() -> Self {
        Self
    }
}

impl MoveGenerator for UniformMoveGenerator {
    fn propose_move(
        &mut self,
        blocks_affected: &mut BlocksToBeMoved,
        action: &mut ProposedAction,
        rlim: f32,
        ctx: &MoveContext<'_>,
        rng: &mut StdRng,
    ) -> CreateMove {
        action.move_type = MoveType::Uniform;

        let Some(b_from) = ctx.movable.random(action.block_type, rng) else {
            blocks_affected
                .move_abortion_logger
                .log_move_abort("no movable block");
            return CreateMove::Abort;
        };
        let block_type = ctx.netlist.block(b_from).block_type;
        action.block_type = Some(block_type);
        let from = ctx.registry.block_loc(b_from);

        let Some(to) = ctx
            .compressed
            .find_to_loc_uniform(ctx.grid, block_type, rlim, from, rng)
        else {
            blocks_affected
                .move_abortion_logger
                .log_move_abort("no target location in range");
            return CreateMove::Abort;
        };

        create_move(blocks_affected, b_from, to, ctx.netlist, ctx.registry)
    }
}
