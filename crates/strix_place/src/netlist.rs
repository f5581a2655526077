//! Clustered netlist data structures.
//!
//! Defines the netlist seen by the placer: logical block types, placeable
//! blocks, nets and the pins connecting them. Every net stores its pins with
//! the driver at index 0 followed by the sinks, so a connection is addressed
//! as `(net, pin index)` with index 0 never carrying timing cost.

use crate::device::PlLoc;
use crate::ids::{BlockId, BlockTypeId, NetId, PinId};
use serde::{Deserialize, Serialize};

/// A logical block type (e.g. a logic cluster or an IO pad).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalBlockType {
    /// Unique ID of this type.
    pub id: BlockTypeId,
    /// Human-readable type name.
    pub name: String,
}

/// A placeable block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterBlock {
    /// Unique ID of this block.
    pub id: BlockId,
    /// Instance name.
    pub name: String,
    /// Logical type; the block may only occupy tiles of this type.
    pub block_type: BlockTypeId,
    /// Pins in creation order. The position in this list is the block pin number.
    pub pins: Vec<PinId>,
    /// Location the block is locked to, if any.
    pub fixed_loc: Option<PlLoc>,
}

impl ClusterBlock {
    /// Returns `true` if the block cannot be moved by the placer.
    pub fn is_fixed(&self) -> bool {
        self.fixed_loc.is_some()
    }
}

/// Whether a pin drives or is driven by its net.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinType {
    /// Pin index 0 of its net.
    Driver,
    /// Pin index 1 or greater.
    Sink,
}

/// A block pin attached to a net.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterPin {
    /// Unique ID of this pin.
    pub id: PinId,
    /// The block this pin belongs to.
    pub block: BlockId,
    /// Position of this pin in its block's pin list.
    pub block_pin: u32,
    /// The net this pin connects to.
    pub net: NetId,
    /// Position of this pin in its net's pin list (0 = driver).
    pub net_pin_index: usize,
    /// Driver or sink.
    pub pin_type: PinType,
}

/// A net: one driver pin followed by zero or more sink pins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNet {
    /// Unique ID of this net.
    pub id: NetId,
    /// Net name.
    pub name: String,
    /// Driver pin first, then sinks.
    pub pins: Vec<PinId>,
    /// Global nets (clocks, resets) contribute neither wiring nor timing cost.
    pub is_ignored: bool,
}

impl ClusterNet {
    /// Returns the number of sink pins.
    pub fn num_sinks(&self) -> usize {
        self.pins.len().saturating_sub(1)
    }
}

/// The clustered netlist consumed by the placer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusteredNetlist {
    block_types: Vec<LogicalBlockType>,
    blocks: Vec<ClusterBlock>,
    nets: Vec<ClusterNet>,
    pins: Vec<ClusterPin>,
}

impl ClusteredNetlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a logical block type and returns its ID.
    pub fn add_block_type(&mut self, name: impl Into<String>) -> BlockTypeId {
        let id = BlockTypeId::from_index(self.block_types.len());
        self.block_types.push(LogicalBlockType {
            id,
            name: name.into(),
        });
        id
    }

    /// Adds a movable block and returns its ID.
    pub fn add_block(&mut self, name: impl Into<String>, block_type: BlockTypeId) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push(ClusterBlock {
            id,
            name: name.into(),
            block_type,
            pins: Vec::new(),
            fixed_loc: None,
        });
        id
    }

    /// Adds a block locked to `loc` and returns its ID.
    pub fn add_fixed_block(
        &mut self,
        name: impl Into<String>,
        block_type: BlockTypeId,
        loc: PlLoc,
    ) -> BlockId {
        let id = self.add_block(name, block_type);
        self.blocks[id.index()].fixed_loc = Some(loc);
        id
    }

    /// Adds a net driven by `driver` and sinking into each of `sinks`.
    ///
    /// A new pin is created on every listed block, so a block listed twice
    /// gets two pins on the net.
    pub fn add_net(&mut self, name: impl Into<String>, driver: BlockId, sinks: &[BlockId]) -> NetId {
        let id = NetId::from_index(self.nets.len());
        let mut pins = Vec::with_capacity(sinks.len() + 1);
        pins.push(self.add_pin(driver, id, 0, PinType::Driver));
        for (i, &sink) in sinks.iter().enumerate() {
            pins.push(self.add_pin(sink, id, i + 1, PinType::Sink));
        }
        self.nets.push(ClusterNet {
            id,
            name: name.into(),
            pins,
            is_ignored: false,
        });
        id
    }

    /// Marks a net as global so that it is excluded from all cost terms.
    pub fn set_net_ignored(&mut self, net: NetId, ignored: bool) {
        self.nets[net.index()].is_ignored = ignored;
    }

    fn add_pin(&mut self, block: BlockId, net: NetId, net_pin_index: usize, pin_type: PinType) -> PinId {
        let id = PinId::from_index(self.pins.len());
        let owner = &mut self.blocks[block.index()];
        let block_pin = owner.pins.len() as u32;
        owner.pins.push(id);
        self.pins.push(ClusterPin {
            id,
            block,
            block_pin,
            net,
            net_pin_index,
            pin_type,
        });
        id
    }

    /// Returns the block type with the given ID.
    pub fn block_type(&self, id: BlockTypeId) -> &LogicalBlockType {
        &self.block_types[id.index()]
    }

    /// Returns the block with the given ID.
    pub fn block(&self, id: BlockId) -> &ClusterBlock {
        &self.blocks[id.index()]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &ClusterNet {
        &self.nets[id.index()]
    }

    /// Returns the pin with the given ID.
    pub fn pin(&self, id: PinId) -> &ClusterPin {
        &self.pins[id.index()]
    }

    /// All block types.
    pub fn block_types(&self) -> &[LogicalBlockType] {
        &self.block_types
    }

    /// All blocks.
    pub fn blocks(&self) -> &[ClusterBlock] {
        &self.blocks
    }

    /// All nets.
    pub fn nets(&self) -> &[ClusterNet] {
        &self.nets
    }

    /// All pins.
    pub fn pins(&self) -> &[ClusterPin] {
        &self.pins
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Number of block types.
    pub fn block_type_count(&self) -> usize {
        self.block_types.len()
    }

    /// Returns the pin at position `ipin` of `net`.
    pub fn net_pin(&self, net: NetId, ipin: usize) -> PinId {
        self.nets[net.index()].pins[ipin]
    }

    /// Returns the block owning pin `ipin` of `net`.
    pub fn net_pin_block(&self, net: NetId, ipin: usize) -> BlockId {
        self.pin(self.net_pin(net, ipin)).block
    }

    /// Returns the block driving `net`.
    pub fn net_driver_block(&self, net: NetId) -> BlockId {
        self.net_pin_block(net, 0)
    }

    /// Returns whether `net` is excluded from cost computation.
    pub fn net_is_ignored(&self, net: NetId) -> bool {
        self.nets[net.index()].is_ignored
    }

    /// Number of pins (driver included) of every net, in net order.
    pub fn net_pin_counts(&self) -> Vec<usize> {
        self.nets.iter().map(|n| n.pins.len()).collect()
    }

    /// Number of blocks of each block type, indexed by type.
    pub fn blocks_per_type(&self) -> Vec<usize> {
        let mut counts = vec![0; self.block_types.len()];
        for block in &self.blocks {
            counts[block.block_type.index()] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_net_netlist() -> (ClusteredNetlist, Vec<BlockId>) {
        let mut nl = ClusteredNetlist::new();
        let clb = nl.add_block_type("clb");
        let blocks: Vec<_> = (0..3).map(|i| nl.add_block(format!("b{i}"), clb)).collect();
        nl.add_net("n0", blocks[0], &[blocks[1], blocks[2]]);
        nl.add_net("n1", blocks[2], &[blocks[0]]);
        (nl, blocks)
    }

    #[test]
    fn driver_is_pin_zero() {
        let (nl, blocks) = two_net_netlist();
        let net = NetId::from_raw(0);
        assert_eq!(nl.net_driver_block(net), blocks[0]);
        assert_eq!(nl.net(net).num_sinks(), 2);
        let driver = nl.pin(nl.net_pin(net, 0));
        assert_eq!(driver.pin_type, PinType::Driver);
        assert_eq!(driver.net_pin_index, 0);
        let sink = nl.pin(nl.net_pin(net, 2));
        assert_eq!(sink.pin_type, PinType::Sink);
        assert_eq!(sink.block, blocks[2]);
    }

    #[test]
    fn block_pins_numbered_in_order() {
        let (nl, blocks) = two_net_netlist();
        let b2 = nl.block(blocks[2]);
        assert_eq!(b2.pins.len(), 2);
        assert_eq!(nl.pin(b2.pins[0]).block_pin, 0);
        assert_eq!(nl.pin(b2.pins[1]).block_pin, 1);
        assert_eq!(nl.pin(b2.pins[1]).pin_type, PinType::Driver);
    }

    #[test]
    fn ignored_nets_and_counts() {
        let (mut nl, _) = two_net_netlist();
        nl.set_net_ignored(NetId::from_raw(1), true);
        assert!(nl.net_is_ignored(NetId::from_raw(1)));
        assert!(!nl.net_is_ignored(NetId::from_raw(0)));
        assert_eq!(nl.net_pin_counts(), vec![3, 2]);
        assert_eq!(nl.blocks_per_type(), vec![3]);
    }

    #[test]
    fn fixed_blocks() {
        let mut nl = ClusteredNetlist::new();
        let io = nl.add_block_type("io");
        let pad = nl.add_fixed_block("pad", io, PlLoc::new(0, 1, 0));
        assert!(nl.block(pad).is_fixed());
        assert_eq!(nl.block(pad).fixed_loc, Some(PlLoc::new(0, 1, 0)));
    }

    #[test]
    fn serde_roundtrip() {
        let (nl, _) = two_net_netlist();
        let json = serde_json::to_string(&nl).unwrap();
        let restored: ClusteredNetlist = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.net_count(), 2);
        assert_eq!(restored.pins().len(), nl.pins().len());
    }
}
