//! Per-connection setup slack cache synchronized with the timing analyzer.

use crate::criticalities::{is_timed_sink, timed_sink_pins};
use crate::ids::{NetId, PinId};
use crate::net_pins_matrix::NetPinsMatrix;
use crate::netlist::ClusteredNetlist;
use crate::timing_info::SetupTimingInfo;
use std::collections::BTreeSet;

/// Cached raw setup slacks of every timed sink connection.
///
/// Follows the same enable/recompute latch as
/// [`PlacerCriticalities`](crate::criticalities::PlacerCriticalities), without
/// an exponent.
#[derive(Clone, Debug)]
pub struct PlacerSetupSlacks {
    timing_place_setup_slacks: NetPinsMatrix<f32>,
    cluster_pins_with_modified_setup_slack: BTreeSet<PinId>,
    update_enabled: bool,
    recompute_required: bool,
}

impl PlacerSetupSlacks {
    /// Creates an empty cache sized for `netlist`.
    pub fn new(netlist: &ClusteredNetlist) -> Self {
        Self {
            timing_place_setup_slacks: NetPinsMatrix::new(&netlist.net_pin_counts(), f32::NAN),
            cluster_pins_with_modified_setup_slack: BTreeSet::new(),
            update_enabled: true,
            recompute_required: true,
        }
    }

    /// Refreshes the cache from `timing_info`, or latches a full recompute
    /// when updates are disabled.
    pub fn update_setup_slacks(
        &mut self,
        timing_info: &dyn SetupTimingInfo,
        netlist: &ClusteredNetlist,
    ) {
        if !self.update_enabled {
            self.recompute_required = true;
            return;
        }

        self.cluster_pins_with_modified_setup_slack.clear();
        if self.recompute_required {
            self.cluster_pins_with_modified_setup_slack
                .extend(timed_sink_pins(netlist));
        } else {
            for &pin in timing_info.pins_with_modified_setup_slack() {
                if is_timed_sink(netlist, pin) {
                    self.cluster_pins_with_modified_setup_slack.insert(pin);
                }
            }
        }

        for &pin in &self.cluster_pins_with_modified_setup_slack {
            let cluster_pin = netlist.pin(pin);
            self.timing_place_setup_slacks[(cluster_pin.net, cluster_pin.net_pin_index)] =
                timing_info.setup_pin_slack(pin);
        }

        self.recompute_required = false;
    }

    /// Forces the next update to take the full path.
    pub fn set_recompute_required(&mut self) {
        self.recompute_required = true;
    }

    /// Whether the next update will take the full path.
    pub fn recompute_required(&self) -> bool {
        self.recompute_required
    }

    /// Allows subsequent updates.
    pub fn enable_update(&mut self) {
        self.update_enabled = true;
    }

    /// Defers subsequent updates until re-enabled.
    pub fn disable_update(&mut self) {
        self.update_enabled = false;
    }

    /// Setup slack of sink `ipin` of `net`.
    pub fn setup_slack(&self, net: NetId, ipin: usize) -> f32 {
        self.timing_place_setup_slacks[(net, ipin)]
    }

    /// Sink pins touched by the last applied update, in pin order.
    pub fn pins_with_modified_setup_slack(&self) -> impl Iterator<Item = PinId> + '_ {
        self.cluster_pins_with_modified_setup_slack.iter().copied()
    }
}
