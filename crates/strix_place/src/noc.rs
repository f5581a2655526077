//! Optional network-on-chip cost term.
//!
//! The annealer treats the NoC as an additive, already normalized cost. A
//! handler stages cost changes for a proposed move and then either commits
//! or reverts them, mirroring the bounding-box and timing cost stores.

use crate::block_loc::BlocksToBeMoved;
use crate::device::PlLoc;
use crate::ids::{BlockId, BlockTypeId};

/// Cost of routing traffic between NoC router blocks.
pub trait NocCostHandler {
    /// Block type of the routers, used for forced router swaps.
    fn router_block_type(&self) -> BlockTypeId;

    /// Stages the NoC cost of the proposed move and returns its delta.
    ///
    /// `block_locs` already holds the proposed locations.
    fn find_affected_noc_routers_and_update_noc_costs(
        &mut self,
        blocks_affected: &BlocksToBeMoved,
        block_locs: &[PlLoc],
    ) -> f64;

    /// Keeps the staged costs.
    fn commit_noc_costs(&mut self);

    /// Drops the staged costs.
    fn revert_noc_traffic_flow_routes(&mut self, blocks_affected: &BlocksToBeMoved);

    /// Recomputes and stores the cost of every flow, returning the total.
    fn recompute_costs_from_scratch(&mut self, block_locs: &[PlLoc]) -> f64;
}

/// Traffic between two router blocks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrafficFlow {
    /// Sending router.
    pub source: BlockId,
    /// Receiving router.
    pub sink: BlockId,
    /// Relative bandwidth of the flow.
    pub bandwidth: f64,
}

/// Reference handler: each flow costs `weight * bandwidth * manhattan distance`
/// between its routers.
#[derive(Clone, Debug)]
pub struct TrafficFlowNocCost {
    router_type: BlockTypeId,
    weight: f64,
    flows: Vec<TrafficFlow>,
    flow_cost: Vec<f64>,
    proposed: Vec<(usize, f64)>,
}

impl TrafficFlowNocCost {
    /// Creates a handler for `flows` between blocks of `router_type`.
    pub fn new(router_type: BlockTypeId, weight: f64, flows: Vec<TrafficFlow>) -> Self {
        let flow_cost = vec![0.0; flows.len()];
        Self {
            router_type,
            weight,
            flows,
            flow_cost,
            proposed: Vec::new(),
        }
    }

    /// Committed total cost.
    pub fn total_cost(&self) -> f64 {
        self.flow_cost.iter().sum()
    }

    fn cost_of(&self, flow: &TrafficFlow, block_locs: &[PlLoc]) -> f64 {
        let a = block_locs[flow.source.index()];
        let b = block_locs[flow.sink.index()];
        let distance = (a.x - b.x).abs() + (a.y - b.y).abs();
        self.weight * flow.bandwidth * f64::from(distance)
    }
}

impl NocCostHandler for TrafficFlowNocCost {
    fn router_block_type(&self) -> BlockTypeId {
        self.router_type
    }

    fn find_affected_noc_routers_and_update_noc_costs(
        &mut self,
        blocks_affected: &BlocksToBeMoved,
        block_locs: &[PlLoc],
    ) -> f64 {
        self.proposed.clear();
        let mut delta = 0.0;
        for (i, flow) in self.flows.iter().enumerate() {
            if blocks_affected.is_moving(flow.source) || blocks_affected.is_moving(flow.sink) {
                let cost = self.cost_of(flow, block_locs);
                delta += cost - self.flow_cost[i];
                self.proposed.push((i, cost));
            }
        }
        delta
    }

    fn commit_noc_costs(&mut self) {
        for (i, cost) in self.proposed.drain(..) {
            self.flow_cost[i] = cost;
        }
    }

    fn revert_noc_traffic_flow_routes(&mut self, _blocks_affected: &BlocksToBeMoved) {
        self.proposed.clear();
    }

    fn recompute_costs_from_scratch(&mut self, block_locs: &[PlLoc]) -> f64 {
        let costs: Vec<f64> = self
            .flows
            .iter()
            .map(|flow| self.cost_of(flow, block_locs))
            .collect();
        self.flow_cost = costs;
        self.proposed.clear();
        self.total_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_loc::BlkLocRegistry;
    use crate::device::DeviceGrid;

    #[test]
    fn staged_costs_commit_and_revert() {
        let router = BlockTypeId::from_raw(0);
        let grid = DeviceGrid::island(6, 6, router, BlockTypeId::from_raw(1), 1);
        let r0 = BlockId::from_raw(0);
        let r1 = BlockId::from_raw(1);
        let mut locs = vec![PlLoc::new(1, 1, 0), PlLoc::new(2, 1, 0)];
        let registry = BlkLocRegistry::new(&grid, locs.clone());

        let mut noc = TrafficFlowNocCost::new(
            router,
            0.5,
            vec![TrafficFlow {
                source: r0,
                sink: r1,
                bandwidth: 2.0,
            }],
        );
        assert_eq!(noc.recompute_costs_from_scratch(&locs), 1.0);

        let mut affected = BlocksToBeMoved::new();
        affected.record_block_move(r1, PlLoc::new(4, 3, 0), &registry);
        locs[1] = PlLoc::new(4, 3, 0);
        let delta = noc.find_affected_noc_routers_and_update_noc_costs(&affected, &locs);
        assert_eq!(delta, 4.0);
        noc.revert_noc_traffic_flow_routes(&affected);
        assert_eq!(noc.total_cost(), 1.0);

        noc.find_affected_noc_routers_and_update_noc_costs(&affected, &locs);
        noc.commit_noc_costs();
        assert_eq!(noc.total_cost(), 5.0);
        assert_eq!(noc.recompute_costs_from_scratch(&locs), 5.0);
    }
}
