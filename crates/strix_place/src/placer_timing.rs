//! Committed and proposed per-connection delays and timing costs.
//!
//! During move evaluation the proposed delay and cost of every affected
//! sink connection are written to the `proposed_*` matrices only. Commit
//! copies them into the committed storage (and the cost tree); revert
//! discards them. Proposed entries are NaN outside of a move.

use crate::criticalities::{timed_sink_pins, PlacerCriticalities};
use crate::delay_model::DelayModel;
use crate::device::PlLoc;
use crate::ids::{NetId, PinId};
use crate::net_pins_matrix::NetPinsMatrix;
use crate::netlist::ClusteredNetlist;
use crate::setup_slacks::PlacerSetupSlacks;
use crate::timing_costs::PlacerTimingCosts;

/// Marker for a proposed value that is not staged.
pub const INVALID_DELAY: f32 = f32::NAN;

/// Connection delay and timing cost storage of a placement run.
#[derive(Clone, Debug)]
pub struct PlacerTimingContext {
    /// Committed delay of every connection.
    pub connection_delay: NetPinsMatrix<f32>,
    /// Staged delay of connections affected by the move under evaluation.
    pub proposed_connection_delay: NetPinsMatrix<f32>,
    /// Setup slack of every connection as of the last commit.
    pub connection_setup_slack: NetPinsMatrix<f32>,
    /// Committed `criticality * delay` of every sink connection.
    pub connection_timing_cost: PlacerTimingCosts,
    /// Staged timing cost of connections affected by the move under evaluation.
    pub proposed_connection_timing_cost: NetPinsMatrix<f64>,
}

impl PlacerTimingContext {
    /// Allocates the storage for `netlist`, with zero delays and no staged values.
    pub fn new(netlist: &ClusteredNetlist) -> Self {
        let pins = netlist.net_pin_counts();
        Self {
            connection_delay: NetPinsMatrix::new(&pins, 0.0),
            proposed_connection_delay: NetPinsMatrix::new(&pins, INVALID_DELAY),
            connection_setup_slack: NetPinsMatrix::new(&pins, f32::INFINITY),
            connection_timing_cost: PlacerTimingCosts::new(&pins),
            proposed_connection_timing_cost: NetPinsMatrix::new(&pins, f64::from(INVALID_DELAY)),
        }
    }

    /// Recomputes the committed delay of every connection from block locations.
    pub fn comp_td_connection_delays(
        &mut self,
        netlist: &ClusteredNetlist,
        block_locs: &[PlLoc],
        delay_model: &dyn DelayModel,
    ) {
        for net in netlist.nets() {
            for ipin in 1..net.pins.len() {
                self.connection_delay[(net.id, ipin)] =
                    comp_td_single_connection_delay(netlist, block_locs, delay_model, net.id, ipin);
            }
        }
    }

    /// Recomputes every connection timing cost and returns the total.
    pub fn comp_td_costs(
        &mut self,
        netlist: &ClusteredNetlist,
        criticalities: &PlacerCriticalities,
    ) -> f64 {
        for net in netlist.nets() {
            for ipin in 1..net.pins.len() {
                let cost = if net.is_ignored {
                    0.0
                } else {
                    self.comp_td_single_connection_cost(criticalities, net.id, ipin)
                };
                self.connection_timing_cost.set(net.id, ipin, cost);
            }
        }
        self.connection_timing_cost.total()
    }

    /// Refreshes the timing cost of connections whose criticality changed
    /// in the last criticality update, and returns the new total.
    pub fn update_td_costs(
        &mut self,
        netlist: &ClusteredNetlist,
        criticalities: &PlacerCriticalities,
    ) -> f64 {
        for pin in criticalities.pins_with_modified_criticality() {
            let cluster_pin = netlist.pin(pin);
            let (net, ipin) = (cluster_pin.net, cluster_pin.net_pin_index);
            let cost = self.comp_td_single_connection_cost(criticalities, net, ipin);
            self.connection_timing_cost.set(net, ipin, cost);
        }
        self.connection_timing_cost.total()
    }

    /// `criticality * committed delay` of one connection.
    pub fn comp_td_single_connection_cost(
        &self,
        criticalities: &PlacerCriticalities,
        net: NetId,
        ipin: usize,
    ) -> f64 {
        f64::from(criticalities.criticality(net, ipin) * self.connection_delay[(net, ipin)])
    }

    /// Moves the staged delays and costs of `affected_pins` into committed storage.
    pub fn commit_td_cost(&mut self, netlist: &ClusteredNetlist, affected_pins: &[PinId]) {
        for &pin in affected_pins {
            let cluster_pin = netlist.pin(pin);
            let key = (cluster_pin.net, cluster_pin.net_pin_index);

            self.connection_delay[key] = self.proposed_connection_delay[key];
            self.proposed_connection_delay[key] = INVALID_DELAY;
            self.connection_timing_cost
                .set(key.0, key.1, self.proposed_connection_timing_cost[key]);
            self.proposed_connection_timing_cost[key] = f64::from(INVALID_DELAY);
        }
    }

    /// Discards the staged delays and costs of `affected_pins`.
    pub fn revert_td_cost(&mut self, netlist: &ClusteredNetlist, affected_pins: &[PinId]) {
        for &pin in affected_pins {
            let cluster_pin = netlist.pin(pin);
            let key = (cluster_pin.net, cluster_pin.net_pin_index);
            self.proposed_connection_delay[key] = INVALID_DELAY;
            self.proposed_connection_timing_cost[key] = f64::from(INVALID_DELAY);
        }
    }

    /// Copies the slacks modified in the last slack update into committed storage.
    pub fn commit_setup_slacks(&mut self, netlist: &ClusteredNetlist, setup_slacks: &PlacerSetupSlacks) {
        for pin in setup_slacks.pins_with_modified_setup_slack() {
            let cluster_pin = netlist.pin(pin);
            let (net, ipin) = (cluster_pin.net, cluster_pin.net_pin_index);
            self.connection_setup_slack[(net, ipin)] = setup_slacks.setup_slack(net, ipin);
        }
    }

    /// Returns `true` if the committed slacks equal the cached analyzer slacks
    /// on every timed connection.
    pub fn verify_connection_setup_slacks(
        &self,
        netlist: &ClusteredNetlist,
        setup_slacks: &PlacerSetupSlacks,
    ) -> bool {
        timed_sink_pins(netlist).all(|pin| {
            let cluster_pin = netlist.pin(pin);
            let (net, ipin) = (cluster_pin.net, cluster_pin.net_pin_index);
            self.connection_setup_slack[(net, ipin)].to_bits()
                == setup_slacks.setup_slack(net, ipin).to_bits()
        })
    }
}

/// Delay of sink `ipin` of `net` at the given block locations (0 for ignored nets).
///
/// # Panics
///
/// Panics if the delay model returns a negative delay.
pub fn comp_td_single_connection_delay(
    netlist: &ClusteredNetlist,
    block_locs: &[PlLoc],
    delay_model: &dyn DelayModel,
    net: NetId,
    ipin: usize,
) -> f32 {
    if netlist.net_is_ignored(net) {
        return 0.0;
    }
    let source = netlist.pin(netlist.net_pin(net, 0));
    let sink = netlist.pin(netlist.net_pin(net, ipin));
    let delay = delay_model.delay(
        block_locs[source.block.index()],
        source.block_pin,
        block_locs[sink.block.index()],
        sink.block_pin,
    );
    assert!(
        delay >= 0.0,
        "delay model returned negative delay {delay} for net {net} pin {ipin}"
    );
    delay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criticalities::PlaceCritParams;
    use crate::delay_model::SimpleDelayModel;
    use crate::timing_info::fake::ScriptedTimingInfo;

    struct NegativeDelay;

    impl DelayModel for NegativeDelay {
        fn delay(&self, _: PlLoc, _: u32, _: PlLoc, _: u32) -> f32 {
            -1.0
        }
    }

    fn fixture() -> (ClusteredNetlist, Vec<PlLoc>) {
        let mut nl = ClusteredNetlist::new();
        let clb = nl.add_block_type("clb");
        let b: Vec<_> = (0..3).map(|i| nl.add_block(format!("b{i}"), clb)).collect();
        nl.add_net("n0", b[0], &[b[1], b[2]]);
        let clk = nl.add_net("clk", b[1], &[b[2]]);
        nl.set_net_ignored(clk, true);
        let locs = vec![PlLoc::new(1, 1, 0), PlLoc::new(3, 1, 0), PlLoc::new(1, 4, 0)];
        (nl, locs)
    }

    fn model() -> SimpleDelayModel {
        SimpleDelayModel {
            intercept: 0.0,
            per_tile: 1.0,
        }
    }

    fn full_crit(nl: &ClusteredNetlist) -> PlacerCriticalities {
        let mut info = ScriptedTimingInfo::default();
        for pin in timed_sink_pins(nl) {
            info.criticality.insert(pin, 0.5);
        }
        let mut crit = PlacerCriticalities::new(nl);
        crit.update_criticalities(
            &info,
            &PlaceCritParams {
                crit_exponent: 1.0,
                crit_limit: 0.7,
            },
            nl,
        );
        crit
    }

    #[test]
    fn delays_and_costs_from_scratch() {
        let (nl, locs) = fixture();
        let mut ctx = PlacerTimingContext::new(&nl);
        ctx.comp_td_connection_delays(&nl, &locs, &model());
        let n0 = NetId::from_raw(0);
        assert_eq!(ctx.connection_delay[(n0, 1)], 2.0);
        assert_eq!(ctx.connection_delay[(n0, 2)], 3.0);
        assert_eq!(ctx.connection_delay[(NetId::from_raw(1), 1)], 0.0);

        let crit = full_crit(&nl);
        assert_eq!(ctx.comp_td_costs(&nl, &crit), 2.5);
    }

    #[test]
    fn commit_and_revert_staged_values() {
        let (nl, locs) = fixture();
        let mut ctx = PlacerTimingContext::new(&nl);
        ctx.comp_td_connection_delays(&nl, &locs, &model());
        let crit = full_crit(&nl);
        ctx.comp_td_costs(&nl, &crit);

        let n0 = NetId::from_raw(0);
        let pin = nl.net_pin(n0, 1);
        ctx.proposed_connection_delay[(n0, 1)] = 6.0;
        ctx.proposed_connection_timing_cost[(n0, 1)] = 3.0;
        ctx.revert_td_cost(&nl, &[pin]);
        assert!(ctx.proposed_connection_delay[(n0, 1)].is_nan());
        assert_eq!(ctx.connection_timing_cost.total(), 2.5);

        ctx.proposed_connection_delay[(n0, 1)] = 6.0;
        ctx.proposed_connection_timing_cost[(n0, 1)] = 3.0;
        ctx.commit_td_cost(&nl, &[pin]);
        assert_eq!(ctx.connection_delay[(n0, 1)], 6.0);
        assert!(ctx.proposed_connection_timing_cost[(n0, 1)].is_nan());
        assert_eq!(ctx.connection_timing_cost.total(), 4.5);
    }

    #[test]
    fn setup_slack_commit_and_verify() {
        let (nl, _) = fixture();
        let mut info = ScriptedTimingInfo::default();
        for pin in timed_sink_pins(&nl) {
            info.slack.insert(pin, -0.5);
        }
        let mut slacks = PlacerSetupSlacks::new(&nl);
        slacks.update_setup_slacks(&info, &nl);
        let mut ctx = PlacerTimingContext::new(&nl);
        assert!(!ctx.verify_connection_setup_slacks(&nl, &slacks));
        ctx.commit_setup_slacks(&nl, &slacks);
        assert!(ctx.verify_connection_setup_slacks(&nl, &slacks));
    }

    #[test]
    #[should_panic(expected = "negative delay")]
    fn negative_delay_is_fatal() {
        let (nl, locs) = fixture();
        comp_td_single_connection_delay(&nl, &locs, &NegativeDelay, NetId::from_raw(0), 1);
    }
}
