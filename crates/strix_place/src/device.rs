//! Device grid model and compressed per-type site grids.
//!
//! The device is a rectangular array of tiles. Each tile hosts at most one
//! logical block type and offers `capacity` sub-tile slots. A [`PlLoc`] names
//! one such slot. [`CompressedBlockGrids`] index the tiles of each type by
//! column so that range-limited target searches only visit compatible tiles.

use crate::ids::BlockTypeId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random columns tried before a range-limited search gives up.
const MAX_TARGET_SEARCH_ATTEMPTS: usize = 16;

/// A placement location: tile coordinates, sub-tile slot and die layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlLoc {
    /// Column of the tile.
    pub x: i32,
    /// Row of the tile.
    pub y: i32,
    /// Slot within the tile, `0..capacity`.
    pub sub_tile: i32,
    /// Die layer. The grid model is single-layer, so this is always `0`.
    pub layer: i32,
}

impl PlLoc {
    /// Creates a location on layer 0.
    pub fn new(x: i32, y: i32, sub_tile: i32) -> Self {
        Self {
            x,
            y,
            sub_tile,
            layer: 0,
        }
    }

    /// Returns `true` if both locations are in the same tile.
    pub fn same_tile(self, other: PlLoc) -> bool {
        self.x == other.x && self.y == other.y && self.layer == other.layer
    }
}

impl fmt::Display for PlLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.sub_tile)
    }
}

/// A single tile of the device grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridTile {
    /// The logical block type hosted by this tile, if any.
    pub block_type: Option<BlockTypeId>,
    /// Number of sub-tile slots.
    pub capacity: u32,
}

/// A rectangular, single-layer device grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceGrid {
    width: usize,
    height: usize,
    tiles: Vec<GridTile>,
}

impl DeviceGrid {
    /// Creates a grid of empty tiles.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: vec![GridTile::default(); width * height],
        }
    }

    /// Creates an island-style grid: IO tiles on the perimeter (corners left
    /// empty) and logic tiles in the interior.
    pub fn island(
        width: usize,
        height: usize,
        logic_type: BlockTypeId,
        io_type: BlockTypeId,
        io_capacity: u32,
    ) -> Self {
        let mut grid = Self::new(width, height);
        for x in 0..width {
            for y in 0..height {
                let on_x_edge = x == 0 || x + 1 == width;
                let on_y_edge = y == 0 || y + 1 == height;
                match (on_x_edge, on_y_edge) {
                    (true, true) => {}
                    (true, false) | (false, true) => grid.set_tile(x, y, io_type, io_capacity),
                    (false, false) => grid.set_tile(x, y, logic_type, 1),
                }
            }
        }
        grid
    }

    /// Assigns a block type and capacity to the tile at `(x, y)`.
    pub fn set_tile(&mut self, x: usize, y: usize, block_type: BlockTypeId, capacity: u32) {
        let index = self.tile_index(x, y);
        self.tiles[index] = GridTile {
            block_type: Some(block_type),
            capacity,
        };
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of tiles.
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Returns the tile at `(x, y)`, or `None` if off-grid.
    pub fn tile(&self, x: i32, y: i32) -> Option<&GridTile> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(&self.tiles[self.tile_index(x as usize, y as usize)])
    }

    /// Returns `true` if `loc` is a valid slot of a tile hosting `block_type`.
    pub fn is_compatible(&self, loc: PlLoc, block_type: BlockTypeId) -> bool {
        match self.tile(loc.x, loc.y) {
            Some(tile) => {
                loc.layer == 0
                    && tile.block_type == Some(block_type)
                    && loc.sub_tile >= 0
                    && (loc.sub_tile as u32) < tile.capacity
            }
            None => false,
        }
    }

    /// Returns every slot hosting `block_type`, in column-major order.
    pub fn sites_of_type(&self, block_type: BlockTypeId) -> Vec<PlLoc> {
        let mut sites = Vec::new();
        for x in 0..self.width {
            for y in 0..self.height {
                let tile = &self.tiles[self.tile_index(x, y)];
                if tile.block_type == Some(block_type) {
                    for sub_tile in 0..tile.capacity {
                        sites.push(PlLoc::new(x as i32, y as i32, sub_tile as i32));
                    }
                }
            }
        }
        sites
    }

    fn tile_index(&self, x: usize, y: usize) -> usize {
        x * self.height + y
    }
}

/// The tiles of one block type, indexed by column.
#[derive(Clone, Debug, Default)]
pub struct CompressedGrid {
    /// Sorted distinct columns that contain at least one compatible tile.
    xs: Vec<i32>,
    /// For each entry of `xs`, the sorted rows of compatible tiles.
    columns: Vec<Vec<i32>>,
}

impl CompressedGrid {
    /// Returns `true` if no tile hosts this type.
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Number of compatible tiles.
    pub fn num_tiles(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }
}

/// Compressed grids for every block type.
#[derive(Clone, Debug, Default)]
pub struct CompressedBlockGrids {
    grids: Vec<CompressedGrid>,
}

impl CompressedBlockGrids {
    /// Builds the compressed grids of `num_types` block types.
    pub fn new(grid: &DeviceGrid, num_types: usize) -> Self {
        let mut grids = vec![CompressedGrid::default(); num_types];
        for x in 0..grid.width() {
            for y in 0..grid.height() {
                let Some(block_type) = grid.tile(x as i32, y as i32).and_then(|t| t.block_type) else {
                    continue;
                };
                let Some(compressed) = grids.get_mut(block_type.index()) else {
                    continue;
                };
                if compressed.xs.last() != Some(&(x as i32)) {
                    compressed.xs.push(x as i32);
                    compressed.columns.push(Vec::new());
                }
                if let Some(column) = compressed.columns.last_mut() {
                    column.push(y as i32);
                }
            }
        }
        Self { grids }
    }

    /// Returns the compressed grid of `block_type`.
    pub fn grid(&self, block_type: BlockTypeId) -> Option<&CompressedGrid> {
        self.grids.get(block_type.index())
    }

    /// Picks a random compatible location within `rlim` tiles of `from`.
    ///
    /// The candidate column is drawn uniformly among compatible columns in
    /// `[from.x - rlim, from.x + rlim]`, then a compatible row within
    /// `[from.y - rlim, from.y + rlim]`. The tile of `from` itself is never
    /// returned. Returns `None` when no other compatible tile is in range.
    pub fn find_to_loc_uniform(
        &self,
        grid: &DeviceGrid,
        block_type: BlockTypeId,
        rlim: f32,
        from: PlLoc,
        rng: &mut impl Rng,
    ) -> Option<PlLoc> {
        let compressed = self.grid(block_type)?;
        let reach = rlim.max(1.0) as i32;
        let lo = compressed
            .xs
            .partition_point(|&x| x < from.x.saturating_sub(reach));
        let hi = compressed
            .xs
            .partition_point(|&x| x <= from.x.saturating_add(reach));
        if lo >= hi {
            return None;
        }

        for _ in 0..MAX_TARGET_SEARCH_ATTEMPTS.max(2 * (hi - lo)) {
            let cx = rng.gen_range(lo..hi);
            let column = &compressed.columns[cx];
            let ylo = column.partition_point(|&y| y < from.y.saturating_sub(reach));
            let yhi = column.partition_point(|&y| y <= from.y.saturating_add(reach));
            if ylo >= yhi {
                continue;
            }
            let x = compressed.xs[cx];
            let y = column[rng.gen_range(ylo..yhi)];
            if x == from.x && y == from.y {
                continue;
            }
            let capacity = grid.tile(x, y).map_or(0, |t| t.capacity);
            if capacity == 0 {
                continue;
            }
            let sub_tile = rng.gen_range(0..capacity) as i32;
            return Some(PlLoc {
                x,
                y,
                sub_tile,
                layer: from.layer,
            });
        }
        None
    }
}
