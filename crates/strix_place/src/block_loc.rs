//! Block location registry and the tentative-move record.
//!
//! [`BlkLocRegistry`] owns the forward map (block to location) and the
//! inverse occupancy map (location to block). A move is evaluated in three
//! steps: [`BlkLocRegistry::apply_move_blocks`] updates only the forward map
//! so cost code sees the proposed positions; then either
//! [`BlkLocRegistry::commit_move_blocks`] updates the occupancy map or
//! [`BlkLocRegistry::revert_move_blocks`] restores the forward map. The
//! occupancy map must never be consulted while a move is being evaluated.

use crate::device::{DeviceGrid, PlLoc};
use crate::ids::{BlockId, NetId, PinId};
use crate::move_gen::MoveAbortionLogger;
use crate::netlist::ClusteredNetlist;
use std::collections::HashSet;

/// Per-tile occupancy of the device grid.
#[derive(Clone, Debug)]
pub struct GridBlocks {
    height: usize,
    /// Block in each sub-tile slot, per tile.
    slots: Vec<Vec<Option<BlockId>>>,
    /// Number of occupied slots, per tile.
    usage: Vec<u32>,
}

impl GridBlocks {
    /// Creates an empty occupancy map matching `grid`.
    pub fn new(grid: &DeviceGrid) -> Self {
        let mut slots = Vec::with_capacity(grid.num_tiles());
        for x in 0..grid.width() {
            for y in 0..grid.height() {
                let capacity = grid.tile(x as i32, y as i32).map_or(0, |t| t.capacity);
                slots.push(vec![None; capacity as usize]);
            }
        }
        Self {
            height: grid.height(),
            usage: vec![0; slots.len()],
            slots,
        }
    }

    /// Returns the block occupying `loc`, if any.
    pub fn block_at_location(&self, loc: PlLoc) -> Option<BlockId> {
        let tile = self.tile_index(loc)?;
        self.slots[tile].get(loc.sub_tile as usize).copied().flatten()
    }

    /// Number of occupied slots in the tile of `loc`.
    pub fn tile_usage(&self, loc: PlLoc) -> u32 {
        self.tile_index(loc).map_or(0, |tile| self.usage[tile])
    }

    /// Places `block` in the slot `loc` (or clears it with `None`).
    pub fn set_block_at_location(&mut self, loc: PlLoc, block: Option<BlockId>) {
        let Some(tile) = self.tile_index(loc) else {
            return;
        };
        let Some(slot) = self.slots[tile].get_mut(loc.sub_tile as usize) else {
            return;
        };
        match (slot.is_some(), block.is_some()) {
            (false, true) => self.usage[tile] += 1,
            (true, false) => self.usage[tile] -= 1,
            _ => {}
        }
        *slot = block;
    }

    /// Empties every slot.
    pub fn clear(&mut self) {
        for tile in &mut self.slots {
            tile.iter_mut().for_each(|slot| *slot = None);
        }
        self.usage.iter_mut().for_each(|u| *u = 0);
    }

    fn tile_index(&self, loc: PlLoc) -> Option<usize> {
        if loc.x < 0 || loc.y < 0 || loc.sub_tile < 0 || loc.y as usize >= self.height {
            return None;
        }
        let index = loc.x as usize * self.height + loc.y as usize;
        (index < self.slots.len()).then_some(index)
    }
}

/// Forward and inverse block placement maps.
#[derive(Clone, Debug)]
pub struct BlkLocRegistry {
    block_locs: Vec<PlLoc>,
    grid_blocks: GridBlocks,
}

impl BlkLocRegistry {
    /// Creates a registry from a complete, legal assignment of locations.
    pub fn new(grid: &DeviceGrid, block_locs: Vec<PlLoc>) -> Self {
        let mut registry = Self {
            block_locs: Vec::new(),
            grid_blocks: GridBlocks::new(grid),
        };
        registry.set_all_locations(&block_locs);
        registry
    }

    /// Location of `block` (proposed location while a move is applied).
    pub fn block_loc(&self, block: BlockId) -> PlLoc {
        self.block_locs[block.index()]
    }

    /// Locations of all blocks, indexed by block.
    pub fn block_locs(&self) -> &[PlLoc] {
        &self.block_locs
    }

    /// The committed occupancy map.
    pub fn grid_blocks(&self) -> &GridBlocks {
        &self.grid_blocks
    }

    /// Replaces every block location and rebuilds the occupancy map.
    pub fn set_all_locations(&mut self, block_locs: &[PlLoc]) {
        self.grid_blocks.clear();
        self.block_locs = block_locs.to_vec();
        for (i, &loc) in block_locs.iter().enumerate() {
            self.grid_blocks
                .set_block_at_location(loc, Some(BlockId::from_index(i)));
        }
    }

    /// Moves each block of the record to its new location in the forward map only.
    pub fn apply_move_blocks(&mut self, blocks_affected: &BlocksToBeMoved) {
        for moved in &blocks_affected.moved_blocks {
            self.block_locs[moved.block.index()] = moved.new_loc;
        }
    }

    /// Makes an applied move permanent by updating the occupancy map.
    pub fn commit_move_blocks(&mut self, blocks_affected: &BlocksToBeMoved) {
        // Vacate first so that swapped blocks do not clear each other.
        for moved in &blocks_affected.moved_blocks {
            if self.grid_blocks.block_at_location(moved.old_loc) == Some(moved.block) {
                self.grid_blocks.set_block_at_location(moved.old_loc, None);
            }
        }
        for moved in &blocks_affected.moved_blocks {
            self.grid_blocks
                .set_block_at_location(moved.new_loc, Some(moved.block));
        }
    }

    /// Restores the forward map to the pre-move locations.
    pub fn revert_move_blocks(&mut self, blocks_affected: &BlocksToBeMoved) {
        for moved in &blocks_affected.moved_blocks {
            self.block_locs[moved.block.index()] = moved.old_loc;
        }
    }

    /// Returns `true` if the forward and inverse maps agree and every block
    /// sits on a compatible slot.
    pub fn is_consistent(&self, netlist: &ClusteredNetlist, grid: &DeviceGrid) -> bool {
        self.block_locs.iter().enumerate().all(|(i, &loc)| {
            let block = BlockId::from_index(i);
            grid.is_compatible(loc, netlist.block(block).block_type)
                && self.grid_blocks.block_at_location(loc) == Some(block)
        })
    }
}

/// Whether recording a block move succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockMoveResult {
    /// The move was recorded.
    Valid,
    /// The move conflicts with one already recorded.
    Abort,
}

/// One block relocation of a proposed move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovedBlock {
    /// The relocated block.
    pub block: BlockId,
    /// Location before the move.
    pub old_loc: PlLoc,
    /// Proposed location.
    pub new_loc: PlLoc,
}

/// The set of block relocations making up one proposed move, plus the sink
/// pins whose connection delay the move changes.
#[derive(Debug, Default)]
pub struct BlocksToBeMoved {
    /// Relocations in recording order.
    pub moved_blocks: Vec<MovedBlock>,
    moved_from: HashSet<PlLoc>,
    moved_to: HashSet<PlLoc>,
    /// Sink pins with a changed connection delay, filled during cost evaluation.
    pub affected_pins: Vec<PinId>,
    /// Reasons of aborted moves, kept across moves.
    pub move_abortion_logger: MoveAbortionLogger,
}

impl BlocksToBeMoved {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `block` moves to `to`.
    ///
    /// Aborts if another block of this move already targets `to` or already
    /// leaves the current location of `block`.
    pub fn record_block_move(
        &mut self,
        block: BlockId,
        to: PlLoc,
        registry: &BlkLocRegistry,
    ) -> BlockMoveResult {
        if !self.moved_to.insert(to) {
            self.move_abortion_logger
                .log_move_abort("duplicate block move to location");
            return BlockMoveResult::Abort;
        }
        let from = registry.block_loc(block);
        if !self.moved_from.insert(from) {
            self.moved_to.remove(&to);
            self.move_abortion_logger
                .log_move_abort("duplicate block move from location");
            return BlockMoveResult::Abort;
        }
        self.moved_blocks.push(MovedBlock {
            block,
            old_loc: from,
            new_loc: to,
        });
        BlockMoveResult::Valid
    }

    /// Returns `true` if `block` is part of this move.
    pub fn is_moving(&self, block: BlockId) -> bool {
        self.moved_blocks.iter().any(|m| m.block == block)
    }

    /// Returns `true` if the driver block of `net` is part of this move.
    pub fn driven_by_moved_block(&self, net: NetId, netlist: &ClusteredNetlist) -> bool {
        self.is_moving(netlist.net_driver_block(net))
    }

    /// Returns `true` if no block has been recorded.
    pub fn is_empty(&self) -> bool {
        self.moved_blocks.is_empty()
    }

    /// Forgets the recorded move; the abortion statistics are kept.
    pub fn clear_move_blocks(&mut self) {
        self.moved_blocks.clear();
        self.moved_from.clear();
        self.moved_to.clear();
        self.affected_pins.clear();
    }
}
