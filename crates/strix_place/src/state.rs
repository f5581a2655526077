//! Per-run placer state.

use crate::block_loc::BlkLocRegistry;
use crate::device::{DeviceGrid, PlLoc};
use crate::netlist::ClusteredNetlist;
use crate::placer_timing::PlacerTimingContext;

/// Mutable state of one placement run: where every block is and the
/// committed connection delays and timing costs.
#[derive(Clone, Debug)]
pub struct PlacerState {
    /// Block locations and site occupancy.
    pub blk_loc_registry: BlkLocRegistry,
    /// Connection delay, slack and timing cost storage.
    pub timing: PlacerTimingContext,
}

impl PlacerState {
    /// Creates the state for a legal starting placement.
    pub fn new(netlist: &ClusteredNetlist, grid: &DeviceGrid, block_locs: Vec<PlLoc>) -> Self {
        Self {
            blk_loc_registry: BlkLocRegistry::new(grid, block_locs),
            timing: PlacerTimingContext::new(netlist),
        }
    }

    /// Current block locations.
    pub fn block_locs(&self) -> &[PlLoc] {
        self.blk_loc_registry.block_locs()
    }
}
