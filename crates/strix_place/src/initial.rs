//! Random legal starting placement.

use crate::device::{DeviceGrid, PlLoc};
use crate::error::PlaceError;
use crate::netlist::ClusteredNetlist;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// Places fixed blocks at their locked sites and every other block on a
/// random free compatible site.
///
/// Returns the location of every block, indexed by block.
pub fn initial_placement(
    netlist: &ClusteredNetlist,
    grid: &DeviceGrid,
    rng: &mut StdRng,
) -> Result<Vec<PlLoc>, PlaceError> {
    let mut locs: Vec<Option<PlLoc>> = vec![None; netlist.block_count()];
    let mut occupied = HashSet::new();

    for block in netlist.blocks() {
        let Some(loc) = block.fixed_loc else {
            continue;
        };
        let illegal = |reason| PlaceError::IllegalFixedLocation {
            block: block.name.clone(),
            loc,
            reason,
        };
        if !grid.is_compatible(loc, block.block_type) {
            return Err(illegal("incompatible site"));
        }
        if !occupied.insert(loc) {
            return Err(illegal("site already used by another fixed block"));
        }
        locs[block.id.index()] = Some(loc);
    }

    for block_type in netlist.block_types() {
        let to_place: Vec<_> = netlist
            .blocks()
            .iter()
            .filter(|b| b.block_type == block_type.id && !b.is_fixed())
            .collect();
        if to_place.is_empty() {
            continue;
        }
        let mut free: Vec<PlLoc> = grid
            .sites_of_type(block_type.id)
            .into_iter()
            .filter(|site| !occupied.contains(site))
            .collect();
        if free.len() < to_place.len() {
            return Err(PlaceError::InsufficientSites {
                block_type: block_type.name.clone(),
                needed: to_place.len(),
                available: free.len(),
            });
        }
        free.shuffle(rng);
        for (block, site) in to_place.into_iter().zip(free) {
            occupied.insert(site);
            locs[block.id.index()] = Some(site);
        }
    }

    log::debug!(
        "initial placement of {} blocks on {} sites",
        netlist.block_count(),
        occupied.len()
    );
    Ok(locs.into_iter().flatten().collect())
}
