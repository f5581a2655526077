//! Timing analysis orchestration for the placer.
//!
//! [`PlacerTiming`] bundles the external analyzer with the criticality and
//! slack caches that mirror it, and sequences the updates so that the caches
//! and the committed timing storage never drift from the analyzer.

use crate::costs::PlacerCosts;
use crate::criticalities::{timed_sink_pins, PlaceCritParams, PlacerCriticalities};
use crate::delay_model::DelayModel;
use crate::ids::PinId;
use crate::netlist::ClusteredNetlist;
use crate::placer_timing::PlacerTimingContext;
use crate::setup_slacks::PlacerSetupSlacks;
use crate::timing_info::SetupTimingInfo;

/// The timing collaborators of a timing-driven placement run.
pub struct PlacerTiming<'a> {
    /// External setup timing analyzer.
    pub info: &'a mut dyn SetupTimingInfo,
    /// Connection delay estimator.
    pub delay_model: &'a dyn DelayModel,
    /// Cached connection criticalities.
    pub criticalities: PlacerCriticalities,
    /// Cached connection setup slacks.
    pub setup_slacks: PlacerSetupSlacks,
}

impl<'a> PlacerTiming<'a> {
    /// Creates the caches for `netlist` around the given collaborators.
    pub fn new(
        info: &'a mut dyn SetupTimingInfo,
        delay_model: &'a dyn DelayModel,
        netlist: &ClusteredNetlist,
    ) -> Self {
        Self {
            info,
            delay_model,
            criticalities: PlacerCriticalities::new(netlist),
            setup_slacks: PlacerSetupSlacks::new(netlist),
        }
    }

    /// Runs the analyzer on the committed connection delays and refreshes
    /// both caches (each only if its updates are enabled).
    pub fn update_timing_classes(
        &mut self,
        crit_params: &PlaceCritParams,
        netlist: &ClusteredNetlist,
        timing_ctx: &PlacerTimingContext,
    ) {
        self.info.update(&timing_ctx.connection_delay);
        self.refresh_caches(crit_params, netlist);
    }

    fn refresh_caches(&mut self, crit_params: &PlaceCritParams, netlist: &ClusteredNetlist) {
        self.criticalities
            .update_criticalities(&*self.info, crit_params, netlist);
        self.setup_slacks.update_setup_slacks(&*self.info, netlist);
    }

    /// Full timing update: analysis, both caches, connection timing costs and
    /// committed slacks.
    pub fn perform_full_timing_update(
        &mut self,
        crit_params: &PlaceCritParams,
        netlist: &ClusteredNetlist,
        timing_ctx: &mut PlacerTimingContext,
        costs: &mut PlacerCosts,
    ) {
        self.criticalities.enable_update();
        self.setup_slacks.enable_update();
        self.update_timing_classes(crit_params, netlist, timing_ctx);
        costs.timing_cost = timing_ctx.update_td_costs(netlist, &self.criticalities);
        timing_ctx.commit_setup_slacks(netlist, &self.setup_slacks);
    }

    /// First timing analysis of a run: every connection is invalidated, the
    /// caches filled and the timing cost computed from scratch.
    pub fn initialize(
        &mut self,
        crit_params: &PlaceCritParams,
        netlist: &ClusteredNetlist,
        timing_ctx: &mut PlacerTimingContext,
        costs: &mut PlacerCosts,
    ) {
        self.invalidate_all_connections(netlist);
        self.criticalities.enable_update();
        self.setup_slacks.enable_update();
        self.update_timing_classes(crit_params, netlist, timing_ctx);
        costs.timing_cost = timing_ctx.comp_td_costs(netlist, &self.criticalities);
        timing_ctx.commit_setup_slacks(netlist, &self.setup_slacks);
    }

    /// Tells the analyzer that the connections ending at `pins` changed.
    pub fn invalidate_affected_connections(&mut self, pins: &[PinId]) {
        for &pin in pins {
            self.info.invalidate_connection(pin);
        }
    }

    /// Invalidates every timed connection.
    pub fn invalidate_all_connections(&mut self, netlist: &ClusteredNetlist) {
        for pin in timed_sink_pins(netlist) {
            self.info.invalidate_connection(pin);
        }
    }

    /// Cost signal of a move evaluated with live setup slacks.
    ///
    /// The committed and proposed slacks of every connection modified by the
    /// last slack update are each sorted ascending; the first differing pair
    /// gives `original - proposed`. When no slack changed, returns 1 so
    /// that the move counts as a (slight) deterioration.
    pub fn analyze_setup_slack_cost(
        &self,
        netlist: &ClusteredNetlist,
        timing_ctx: &PlacerTimingContext,
    ) -> f64 {
        let mut original = Vec::new();
        let mut proposed = Vec::new();
        for pin in self.setup_slacks.pins_with_modified_setup_slack() {
            let cluster_pin = netlist.pin(pin);
            let (net, ipin) = (cluster_pin.net, cluster_pin.net_pin_index);
            original.push(timing_ctx.connection_setup_slack[(net, ipin)]);
            proposed.push(self.setup_slacks.setup_slack(net, ipin));
        }
        original.sort_by(f32::total_cmp);
        proposed.sort_by(f32::total_cmp);

        original
            .iter()
            .zip(&proposed)
            .find(|(o, p)| o != p)
            .map_or(1.0, |(o, p)| f64::from(o - p))
    }

    /// Critical path delay of the last analysis.
    pub fn critical_path_delay(&self) -> f32 {
        self.info.critical_path_delay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay_model::SimpleDelayModel;
    use crate::ids::NetId;
    use crate::timing_info::fake::ScriptedTimingInfo;

    fn netlist() -> ClusteredNetlist {
        let mut nl = ClusteredNetlist::new();
        let clb = nl.add_block_type("clb");
        let b: Vec<_> = (0..3).map(|i| nl.add_block(format!("b{i}"), clb)).collect();
        nl.add_net("n0", b[0], &[b[1], b[2]]);
        nl.add_net("n1", b[1], &[b[2]]);
        nl
    }

    const PARAMS: PlaceCritParams = PlaceCritParams {
        crit_exponent: 1.0,
        crit_limit: 0.7,
    };

    const MODEL: SimpleDelayModel = SimpleDelayModel {
        intercept: 1.0,
        per_tile: 0.0,
    };

    #[test]
    fn initialize_invalidates_and_costs_everything() {
        let nl = netlist();
        let mut info = ScriptedTimingInfo::default();
        for pin in timed_sink_pins(&nl) {
            info.criticality.insert(pin, 0.5);
            info.slack.insert(pin, 2.0);
        }
        let mut timing_ctx = PlacerTimingContext::new(&nl);
        timing_ctx.connection_delay.fill(1.0);
        let mut costs = PlacerCosts::default();
        {
            let mut timing = PlacerTiming::new(&mut info, &MODEL, &nl);
            timing.initialize(&PARAMS, &nl, &mut timing_ctx, &mut costs);
            assert!(timing_ctx.verify_connection_setup_slacks(&nl, &timing.setup_slacks));
        }
        assert_eq!(costs.timing_cost, 1.5);
        assert_eq!(info.invalidated.len(), 3);
        assert_eq!(info.updates, 1);
    }

    #[test]
    fn slack_cost_takes_first_differing_ranked_pair() {
        let nl = netlist();
        let pins: Vec<_> = timed_sink_pins(&nl).collect();
        let mut timing_ctx = PlacerTimingContext::new(&nl);
        let n0 = NetId::from_raw(0);
        let n1 = NetId::from_raw(1);
        timing_ctx.connection_setup_slack[(n0, 1)] = 3.0;
        timing_ctx.connection_setup_slack[(n0, 2)] = 1.0;
        timing_ctx.connection_setup_slack[(n1, 1)] = 2.0;

        // Same multiset of slacks, permuted: no signal.
        let mut permuted = ScriptedTimingInfo::default();
        for (pin, slack) in pins.iter().zip([1.0, 2.0, 3.0]) {
            permuted.slack.insert(*pin, slack);
        }
        let mut timing = PlacerTiming::new(&mut permuted, &MODEL, &nl);
        timing.update_timing_classes(&PARAMS, &nl, &timing_ctx);
        assert_eq!(timing.analyze_setup_slack_cost(&nl, &timing_ctx), 1.0);

        // Worst slack improves from 1.0 to 1.5: negative cost.
        let mut improved = ScriptedTimingInfo::default();
        for (pin, slack) in pins.iter().zip([1.5, 2.0, 3.0]) {
            improved.slack.insert(*pin, slack);
        }
        let mut timing = PlacerTiming::new(&mut improved, &MODEL, &nl);
        timing.update_timing_classes(&PARAMS, &nl, &timing_ctx);
        assert_eq!(timing.analyze_setup_slack_cost(&nl, &timing_ctx), -0.5);
    }

    #[test]
    fn disabled_criticalities_stay_stale_during_slack_analysis() {
        let nl = netlist();
        let pin = nl.net_pin(NetId::from_raw(1), 1);
        let mut info = ScriptedTimingInfo::default();
        let timing_ctx = PlacerTimingContext::new(&nl);
        {
            let mut timing = PlacerTiming::new(&mut info, &MODEL, &nl);
            timing.update_timing_classes(&PARAMS, &nl, &timing_ctx);
            timing.criticalities.disable_update();
            timing.invalidate_affected_connections(&[pin]);
            assert!(!timing.criticalities.recompute_required());
            timing.update_timing_classes(&PARAMS, &nl, &timing_ctx);
            assert!(timing.criticalities.recompute_required());
            assert!(!timing.setup_slacks.recompute_required());
        }
        assert_eq!(info.invalidated, vec![pin]);
        assert_eq!(info.updates, 2);
    }
}
