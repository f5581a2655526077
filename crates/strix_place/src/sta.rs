//! Reference setup timing analyzer at clustered-pin granularity.
//!
//! Builds a timing graph whose nodes are the pins of non-ignored nets. Net
//! arcs run from each driver pin to its sinks and take the placer's
//! connection delays. Combinational blocks add a fixed-delay arc from every
//! input pin to every output pin; sequential blocks start and end paths.
//!
//! Each update performs a forward arrival-time pass and a backward
//! required-time pass in topological order, then derives per-pin slack and
//! criticality `1 - slack / max_required` (clamped to `[0, 1]`). Without a
//! clock period, the critical path delay itself is the required time.

use crate::error::PlaceError;
use crate::ids::{NetId, PinId};
use crate::net_pins_matrix::NetPinsMatrix;
use crate::netlist::{ClusteredNetlist, PinType};
use crate::timing_info::SetupTimingInfo;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::BTreeSet;

/// Timing behavior of a logical block type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlockTiming {
    /// Every input reaches every output after `delay`.
    Combinational {
        /// Input-to-output delay.
        delay: f32,
    },
    /// Inputs are captured and outputs launched by a clock.
    Sequential {
        /// Setup time of the inputs.
        setup: f32,
        /// Clock-to-output delay.
        clk_to_q: f32,
    },
}

/// Timing arc kinds.
#[derive(Clone, Copy, Debug)]
enum TimingArc {
    /// Connection `(net, ipin)`, delay taken from the placer.
    Net { net: NetId, ipin: usize },
    /// Fixed intra-block delay.
    Cell { delay: f32 },
}

/// Connection-level static timing analyzer.
#[derive(Debug)]
pub struct ConnectionSta {
    graph: DiGraph<PinId, TimingArc>,
    order: Vec<NodeIndex>,
    period: Option<f32>,
    /// Arrival time of a startpoint, per node.
    launch: Vec<f32>,
    /// Setup time of an endpoint, per node.
    setup: Vec<f32>,
    arrival: Vec<f32>,
    required: Vec<f32>,
    /// Per netlist pin; untimed pins keep infinite slack and zero criticality.
    pin_slack: Vec<f32>,
    pin_criticality: Vec<f32>,
    invalidated: BTreeSet<PinId>,
    modified_criticality: Vec<PinId>,
    modified_slack: Vec<PinId>,
    first_update: bool,
    critical_path_delay: f32,
    worst_negative_slack: f32,
    total_negative_slack: f32,
}

impl ConnectionSta {
    /// Builds the timing graph of `netlist`.
    ///
    /// `block_timing` is indexed by block type; types beyond its end are
    /// combinational with zero delay. `period` is the target clock period,
    /// or `None` to time against the critical path delay.
    pub fn new(
        netlist: &ClusteredNetlist,
        block_timing: &[BlockTiming],
        period: Option<f32>,
    ) -> Result<Self, PlaceError> {
        let timing_of = |pin: PinId| {
            let block = netlist.block(netlist.pin(pin).block);
            block_timing
                .get(block.block_type.index())
                .copied()
                .unwrap_or(BlockTiming::Combinational { delay: 0.0 })
        };

        let mut graph = DiGraph::new();
        let mut node_of_pin: Vec<Option<NodeIndex>> = vec![None; netlist.pins().len()];
        for net in netlist.nets().iter().filter(|net| !net.is_ignored) {
            for &pin in &net.pins {
                node_of_pin[pin.index()] = Some(graph.add_node(pin));
            }
            let Some(driver) = node_of_pin[net.pins[0].index()] else {
                continue;
            };
            for (ipin, &pin) in net.pins.iter().enumerate().skip(1) {
                if let Some(sink) = node_of_pin[pin.index()] {
                    graph.add_edge(driver, sink, TimingArc::Net { net: net.id, ipin });
                }
            }
        }

        for block in netlist.blocks() {
            let BlockTiming::Combinational { delay } = block_timing
                .get(block.block_type.index())
                .copied()
                .unwrap_or(BlockTiming::Combinational { delay: 0.0 })
            else {
                continue;
            };
            let timed = |pin_type: PinType| {
                block
                    .pins
                    .iter()
                    .filter(move |&&p| netlist.pin(p).pin_type == pin_type)
                    .filter_map(|&p| node_of_pin[p.index()])
            };
            for input in timed(PinType::Sink) {
                for output in timed(PinType::Driver) {
                    graph.add_edge(input, output, TimingArc::Cell { delay });
                }
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| PlaceError::CombinationalLoop {
            block: netlist
                .block(netlist.pin(graph[cycle.node_id()]).block)
                .name
                .clone(),
        })?;

        let n = graph.node_count();
        let mut launch = vec![0.0; n];
        let mut setup = vec![0.0; n];
        for node in graph.node_indices() {
            let pin = graph[node];
            if let BlockTiming::Sequential { setup: tsu, clk_to_q } = timing_of(pin) {
                match netlist.pin(pin).pin_type {
                    PinType::Driver => launch[node.index()] = clk_to_q,
                    PinType::Sink => setup[node.index()] = tsu,
                }
            }
        }

        log::debug!(
            "timing graph: {} pins, {} arcs",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(Self {
            graph,
            order,
            period,
            launch,
            setup,
            arrival: vec![0.0; n],
            required: vec![0.0; n],
            pin_slack: vec![f32::INFINITY; netlist.pins().len()],
            pin_criticality: vec![0.0; netlist.pins().len()],
            invalidated: BTreeSet::new(),
            modified_criticality: Vec::new(),
            modified_slack: Vec::new(),
            first_update: true,
            critical_path_delay: 0.0,
            worst_negative_slack: 0.0,
            total_negative_slack: 0.0,
        })
    }

    fn arc_delay(arc: &TimingArc, connection_delay: &NetPinsMatrix<f32>) -> f32 {
        match *arc {
            TimingArc::Net { net, ipin } => connection_delay[(net, ipin)],
            TimingArc::Cell { delay } => delay,
        }
    }

    fn is_endpoint(&self, node: NodeIndex) -> bool {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .next()
            .is_none()
    }

    fn propagate_arrival(&mut self, connection_delay: &NetPinsMatrix<f32>) {
        for &node in &self.order {
            let mut arrival = f32::NEG_INFINITY;
            let mut has_fanin = false;
            for edge in self.graph.edges_directed(node, Direction::Incoming) {
                has_fanin = true;
                arrival = arrival.max(
                    self.arrival[edge.source().index()]
                        + Self::arc_delay(edge.weight(), connection_delay),
                );
            }
            self.arrival[node.index()] = if has_fanin {
                arrival
            } else {
                self.launch[node.index()]
            };
        }
    }

    fn propagate_required(&mut self, connection_delay: &NetPinsMatrix<f32>, max_required: f32) {
        for &node in self.order.iter().rev() {
            let mut required = f32::INFINITY;
            let mut has_fanout = false;
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                has_fanout = true;
                required = required.min(
                    self.required[edge.target().index()]
                        - Self::arc_delay(edge.weight(), connection_delay),
                );
            }
            self.required[node.index()] = if has_fanout {
                required
            } else {
                max_required - self.setup[node.index()]
            };
        }
    }
}

impl SetupTimingInfo for ConnectionSta {
    fn invalidate_connection(&mut self, pin: PinId) {
        self.invalidated.insert(pin);
    }

    fn update(&mut self, connection_delay: &NetPinsMatrix<f32>) {
        self.propagate_arrival(connection_delay);

        let endpoints: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| self.is_endpoint(n))
            .collect();
        self.critical_path_delay = endpoints
            .iter()
            .map(|n| self.arrival[n.index()] + self.setup[n.index()])
            .fold(0.0, f32::max);
        let max_required = self.period.unwrap_or(self.critical_path_delay);

        self.propagate_required(connection_delay, max_required);

        self.modified_criticality.clear();
        self.modified_slack.clear();
        for node in self.graph.node_indices() {
            let pin = self.graph[node];
            let slack = self.required[node.index()] - self.arrival[node.index()];
            let criticality = if max_required > 0.0 {
                (1.0 - slack / max_required).clamp(0.0, 1.0)
            } else {
                0.0
            };

            let forced = self.first_update || self.invalidated.contains(&pin);
            if forced || slack.to_bits() != self.pin_slack[pin.index()].to_bits() {
                self.modified_slack.push(pin);
            }
            if forced || criticality.to_bits() != self.pin_criticality[pin.index()].to_bits() {
                self.modified_criticality.push(pin);
            }
            self.pin_slack[pin.index()] = slack;
            self.pin_criticality[pin.index()] = criticality;
        }
        self.modified_slack.sort_unstable();
        self.modified_criticality.sort_unstable();

        self.worst_negative_slack = 0.0;
        self.total_negative_slack = 0.0;
        for n in &endpoints {
            let slack = self.required[n.index()] - self.arrival[n.index()];
            if slack < 0.0 {
                self.worst_negative_slack = self.worst_negative_slack.min(slack);
                self.total_negative_slack += slack;
            }
        }

        self.invalidated.clear();
        self.first_update = false;
    }

    fn pins_with_modified_setup_criticality(&self) -> &[PinId] {
        &self.modified_criticality
    }

    fn pins_with_modified_setup_slack(&self) -> &[PinId] {
        &self.modified_slack
    }

    fn setup_pin_criticality(&self, pin: PinId) -> f32 {
        self.pin_criticality[pin.index()]
    }

    fn setup_pin_slack(&self, pin: PinId) -> f32 {
        self.pin_slack[pin.index()]
    }

    fn critical_path_delay(&self) -> f32 {
        self.critical_path_delay
    }

    fn setup_worst_negative_slack(&self) -> f32 {
        self.worst_negative_slack
    }

    fn setup_total_negative_slack(&self) -> f32 {
        self.total_negative_slack
    }
}
