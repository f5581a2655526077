//! Simulated annealing placer for island-style FPGAs.
//!
//! This crate assigns every block of a [`ClusteredNetlist`] to a compatible
//! site of a [`DeviceGrid`], minimizing a weighted sum of bounding-box
//! wirelength and connection timing cost.
//!
//! # Pipeline
//!
//! 1. **Initial placement**: fixed blocks first, then a random legal
//!    assignment of the movable ones
//! 2. **Anneal**: temperatures of proposed moves accepted with the
//!    Metropolis criterion, with incremental cost and timing updates
//! 3. **Quench**: a zero temperature pass accepting only improvements
//! 4. **Check**: every incremental cost is recomputed from scratch
//!
//! Timing-driven runs need a [`SetupTimingInfo`] analyzer and a
//! [`DelayModel`]; [`ConnectionSta`] and [`SimpleDelayModel`] are
//! reference implementations.
//!
//! # Usage
//!
//! ```ignore
//! use strix_place::{place, PlacerCollaborators};
//!
//! let report = place(&netlist, &grid, &opts, PlacerCollaborators::default(), &sink)?;
//! assert_eq!(report.block_locs.len(), netlist.block_count());
//! ```

#![warn(missing_docs)]

pub mod annealer;
pub mod block_loc;
pub mod checkpoint;
pub mod costs;
pub mod criticalities;
pub mod delay_model;
pub mod device;
pub mod error;
pub mod ids;
pub mod initial;
pub mod move_gen;
pub mod net_cost;
pub mod net_pins_matrix;
pub mod netlist;
pub mod noc;
pub mod placer;
pub mod placer_timing;
pub mod schedule;
pub mod setup_slacks;
pub mod sta;
pub mod state;
pub mod timing_costs;
pub mod timing_info;
pub mod timing_update;

pub use annealer::PlacementAnnealer;
pub use costs::PlacerCosts;
pub use delay_model::{DelayModel, DeltaDelayModel, OverrideDelayModel, SimpleDelayModel};
pub use device::{DeviceGrid, PlLoc};
pub use error::PlaceError;
pub use ids::{BlockId, BlockTypeId, NetId, PinId};
pub use move_gen::{MoveGenerator, MoveGenerators};
pub use netlist::ClusteredNetlist;
pub use noc::{NocCostHandler, TrafficFlow, TrafficFlowNocCost};
pub use placer::{place, PlacementReport, PlacerCollaborators};
pub use sta::{BlockTiming, ConnectionSta};
pub use timing_info::SetupTimingInfo;
