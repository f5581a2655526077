//! Placement delay models.
//!
//! The placer only needs an estimate of the routed delay between two block
//! pins at given locations. Three models are provided:
//!
//! - [`DeltaDelayModel`]: a lookup table indexed by `(|dx|, |dy|)`.
//! - [`OverrideDelayModel`]: a delta table with per-pin-pair overrides.
//! - [`SimpleDelayModel`]: a linear function of the Manhattan distance.

use crate::device::PlLoc;
use std::collections::HashMap;

/// Estimates the delay of a connection between two placed pins.
///
/// Implementations must return a non-negative delay.
pub trait DelayModel {
    /// Delay from block pin `from_pin` at `from_loc` to block pin `to_pin` at `to_loc`.
    fn delay(&self, from_loc: PlLoc, from_pin: u32, to_loc: PlLoc, to_pin: u32) -> f32;
}

/// Delay table indexed by the absolute x and y distance.
#[derive(Clone, Debug)]
pub struct DeltaDelayModel {
    /// `delays[dx][dy]`.
    delays: Vec<Vec<f32>>,
}

impl DeltaDelayModel {
    /// Creates a model from a `[dx][dy]` table.
    ///
    /// Distances beyond the table are clamped to its last row/column.
    pub fn from_table(delays: Vec<Vec<f32>>) -> Self {
        Self { delays }
    }

    /// Creates a `width x height` table with `intercept + per_tile * (dx + dy)`.
    pub fn linear(width: usize, height: usize, intercept: f32, per_tile: f32) -> Self {
        let delays = (0..width.max(1))
            .map(|dx| {
                (0..height.max(1))
                    .map(|dy| intercept + per_tile * (dx + dy) as f32)
                    .collect()
            })
            .collect();
        Self { delays }
    }

    /// Delay for the given distances.
    pub fn delta_delay(&self, dx: usize, dy: usize) -> f32 {
        let Some(row) = self.delays.get(dx).or_else(|| self.delays.last()) else {
            return 0.0;
        };
        row.get(dy).or_else(|| row.last()).copied().unwrap_or(0.0)
    }
}

impl DelayModel for DeltaDelayModel {
    fn delay(&self, from_loc: PlLoc, _from_pin: u32, to_loc: PlLoc, _to_pin: u32) -> f32 {
        let (dx, dy) = distance(from_loc, to_loc);
        self.delta_delay(dx, dy)
    }
}

/// Key of a delay override: pins and signed distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DelayOverrideKey {
    /// Driving block pin.
    pub from_pin: u32,
    /// Receiving block pin.
    pub to_pin: u32,
    /// `to.x - from.x`.
    pub delta_x: i32,
    /// `to.y - from.y`.
    pub delta_y: i32,
}

/// Delta table with exact overrides for specific pin pairs and offsets.
#[derive(Clone, Debug)]
pub struct OverrideDelayModel {
    base: DeltaDelayModel,
    overrides: HashMap<DelayOverrideKey, f32>,
}

impl OverrideDelayModel {
    /// Wraps `base` with no overrides.
    pub fn new(base: DeltaDelayModel) -> Self {
        Self {
            base,
            overrides: HashMap::new(),
        }
    }

    /// Sets the delay for connections matching `key`.
    pub fn set_delay_override(&mut self, key: DelayOverrideKey, delay: f32) {
        self.overrides.insert(key, delay);
    }

    /// Number of overrides.
    pub fn num_overrides(&self) -> usize {
        self.overrides.len()
    }
}

impl DelayModel for OverrideDelayModel {
    fn delay(&self, from_loc: PlLoc, from_pin: u32, to_loc: PlLoc, to_pin: u32) -> f32 {
        let key = DelayOverrideKey {
            from_pin,
            to_pin,
            delta_x: to_loc.x - from_loc.x,
            delta_y: to_loc.y - from_loc.y,
        };
        match self.overrides.get(&key) {
            Some(&delay) => delay,
            None => self.base.delay(from_loc, from_pin, to_loc, to_pin),
        }
    }
}

/// Linear delay in the Manhattan distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimpleDelayModel {
    /// Delay of a connection within one tile.
    pub intercept: f32,
    /// Added delay per tile of distance.
    pub per_tile: f32,
}

impl DelayModel for SimpleDelayModel {
    fn delay(&self, from_loc: PlLoc, _from_pin: u32, to_loc: PlLoc, _to_pin: u32) -> f32 {
        let (dx, dy) = distance(from_loc, to_loc);
        self.intercept + self.per_tile * (dx + dy) as f32
    }
}

fn distance(from: PlLoc, to: PlLoc) -> (usize, usize) {
    (
        from.x.abs_diff(to.x) as usize,
        from.y.abs_diff(to.y) as usize,
    )
}
