//! Per-connection criticality cache synchronized with the timing analyzer.
//!
//! The cache holds `analyzer_criticality ^ crit_exponent` for every sink
//! connection of every non-ignored net. It is refreshed after each analyzer
//! update, either incrementally from the analyzer's modified-pin list or in
//! full. The full path runs when the exponent changed since the last update,
//! or when a previous update was skipped while updates were disabled:
//! missing one incremental update would leave stale entries behind forever,
//! so `recompute_required` latches that condition.

use crate::ids::{NetId, PinId};
use crate::net_pins_matrix::NetPinsMatrix;
use crate::netlist::{ClusteredNetlist, PinType};
use crate::timing_info::SetupTimingInfo;
use std::collections::BTreeSet;

/// Parameters turning analyzer criticalities into placer criticalities.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaceCritParams {
    /// Sharpening exponent applied to analyzer criticalities.
    pub crit_exponent: f32,
    /// Threshold above which a connection is highly critical.
    pub crit_limit: f32,
}

/// Cached connection criticalities and the highly-critical connection set.
#[derive(Clone, Debug)]
pub struct PlacerCriticalities {
    timing_place_crit: NetPinsMatrix<f32>,
    last_crit_exponent: f32,
    cluster_pins_with_modified_criticality: BTreeSet<PinId>,
    highly_crit_pins: Vec<(NetId, usize)>,
    first_update: bool,
    update_enabled: bool,
    recompute_required: bool,
}

impl PlacerCriticalities {
    /// Creates an empty cache sized for `netlist`.
    pub fn new(netlist: &ClusteredNetlist) -> Self {
        Self {
            timing_place_crit: NetPinsMatrix::new(&netlist.net_pin_counts(), f32::NAN),
            last_crit_exponent: f32::NAN,
            cluster_pins_with_modified_criticality: BTreeSet::new(),
            highly_crit_pins: Vec::new(),
            first_update: true,
            update_enabled: true,
            recompute_required: true,
        }
    }

    /// Refreshes the cache from `timing_info`.
    ///
    /// When updates are disabled this only latches `recompute_required`.
    pub fn update_criticalities(
        &mut self,
        timing_info: &dyn SetupTimingInfo,
        crit_params: &PlaceCritParams,
        netlist: &ClusteredNetlist,
    ) {
        if !self.update_enabled {
            self.recompute_required = true;
            return;
        }

        self.cluster_pins_with_modified_criticality.clear();
        if !self.recompute_required && crit_params.crit_exponent == self.last_crit_exponent {
            self.incr_update_criticalities(timing_info, netlist);
        } else {
            self.cluster_pins_with_modified_criticality
                .extend(timed_sink_pins(netlist));
            self.last_crit_exponent = crit_params.crit_exponent;
        }

        for &pin in &self.cluster_pins_with_modified_criticality {
            let cluster_pin = netlist.pin(pin);
            let (net, ipin) = (cluster_pin.net, cluster_pin.net_pin_index);

            let clb_pin_crit = timing_info.setup_pin_criticality(pin);
            let new_crit = clb_pin_crit.powf(crit_params.crit_exponent);
            let old_crit = self.timing_place_crit[(net, ipin)];

            if self.first_update {
                if new_crit >= crit_params.crit_limit {
                    self.highly_crit_pins.push((net, ipin));
                }
            } else if old_crit < crit_params.crit_limit && new_crit >= crit_params.crit_limit {
                self.highly_crit_pins.push((net, ipin));
            } else if old_crit > crit_params.crit_limit && new_crit <= crit_params.crit_limit {
                if let Some(pos) = self.highly_crit_pins.iter().position(|&c| c == (net, ipin)) {
                    self.highly_crit_pins.remove(pos);
                }
            }

            self.timing_place_crit[(net, ipin)] = new_crit;
        }

        self.first_update = false;
        self.recompute_required = false;
    }

    fn incr_update_criticalities(
        &mut self,
        timing_info: &dyn SetupTimingInfo,
        netlist: &ClusteredNetlist,
    ) {
        for &pin in timing_info.pins_with_modified_setup_criticality() {
            if is_timed_sink(netlist, pin) {
                self.cluster_pins_with_modified_criticality.insert(pin);
            }
        }
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

    /// Whether updates are currently applied.
    pub fn update_enabled(&self) -> bool {
        self.update_enabled
    }

    /// Criticality of sink `ipin` of `net`.
    pub fn criticality(&self, net: NetId, ipin: usize) -> f32 {
        self.timing_place_crit[(net, ipin)]
    }

    /// Sink pins touched by the last applied update, in pin order.
    pub fn pins_with_modified_criticality(&self) -> impl Iterator<Item = PinId> + '_ {
        self.cluster_pins_with_modified_criticality.iter().copied()
    }

    /// Connections whose criticality is at or above the critical limit.
    pub fn highly_crit_pins(&self) -> &[(NetId, usize)] {
        &self.highly_crit_pins
    }
}

/// Returns `true` for a sink pin on a net that carries timing cost.
pub(crate) fn is_timed_sink(netlist: &ClusteredNetlist, pin: PinId) -> bool {
    let cluster_pin = netlist.pin(pin);
    cluster_pin.pin_type == PinType::Sink && !netlist.net_is_ignored(cluster_pin.net)
}

/// Every sink pin of every non-ignored net.
pub(crate) fn timed_sink_pins(netlist: &ClusteredNetlist) -> impl Iterator<Item = PinId> + '_ {
    netlist
        .nets()
        .iter()
        .filter(|net| !net.is_ignored)
        .flat_map(|net| net.pins.iter().skip(1).copied())
}
