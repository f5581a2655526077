//! Incremental sum of per-connection timing costs.
//!
//! The costs of all sink connections are the leaves of an implicit binary
//! tree stored in a flat vector (children of node `i` at `2i+1` and `2i+2`).
//! Every internal node memoizes the sum of its children or holds NaN when
//! one of its leaves changed since the last [`PlacerTimingCosts::total`].
//! Changing `k` leaves therefore costs `O(k log n)` to re-total, and the
//! summation order is always the one of a full post-order walk over the same
//! tree. The incremental total is thus bit-identical to
//! [`PlacerTimingCosts::total_from_scratch`], which a flat accumulator
//! updated by deltas could not guarantee.
//!
//! Example for a tree with four connections, `a + b + c + d`:
//!
//! ```text
//!            (a+b)+(c+d)
//!           /           \
//!        a+b             c+d
//!       /   \           /   \
//!      a     b         c     d
//! ```

use crate::ids::NetId;

/// Binary-tree accumulator of connection timing costs.
#[derive(Clone, Debug)]
pub struct PlacerTimingCosts {
    /// Tree nodes; leaves start at `first_leaf`.
    connection_costs: Vec<f64>,
    /// Leaf index of the first sink of each net.
    net_start_indices: Vec<usize>,
    first_leaf: usize,
    num_levels: usize,
}

impl PlacerTimingCosts {
    /// Builds an all-invalid tree for nets with the given pin counts (driver included).
    pub fn new(pins_per_net: &[usize]) -> Self {
        let num_connections: usize = pins_per_net.iter().map(|p| p.saturating_sub(1)).sum();

        // Smallest L with 2^L >= num_connections.
        let mut num_level_before_leaves = 0;
        while (1usize << num_level_before_leaves) < num_connections {
            num_level_before_leaves += 1;
        }
        let first_leaf = (1usize << num_level_before_leaves) - 1;
        let num_nodes = first_leaf + num_connections;

        let mut net_start_indices = Vec::with_capacity(pins_per_net.len());
        let mut next = first_leaf;
        for &pins in pins_per_net {
            net_start_indices.push(next);
            next += pins.saturating_sub(1);
        }

        Self {
            connection_costs: vec![f64::NAN; num_nodes],
            net_start_indices,
            first_leaf,
            num_levels: num_level_before_leaves + 1,
        }
    }

    /// Number of leaf connections.
    pub fn num_connections(&self) -> usize {
        self.connection_costs.len() - self.first_leaf.min(self.connection_costs.len())
    }

    /// Number of tree levels, leaves included.
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Leaf index of sink `ipin` (1-based, as pin 0 is the driver) of `net`.
    ///
    /// # Panics
    ///
    /// Panics if `ipin` is 0.
    pub fn leaf_index(&self, net: NetId, ipin: usize) -> usize {
        assert!(ipin > 0, "the driver pin carries no timing cost");
        self.net_start_indices[net.index()] + ipin - 1
    }

    /// The stored cost of sink `ipin` of `net` (NaN if never set).
    pub fn get(&self, net: NetId, ipin: usize) -> f64 {
        self.connection_costs[self.leaf_index(net, ipin)]
    }

    /// Sets the cost of sink `ipin` of `net`, invalidating its ancestors if it changed.
    ///
    /// # Panics
    ///
    /// Panics if the connection does not exist.
    pub fn set(&mut self, net: NetId, ipin: usize, value: f64) {
        let leaf = self.leaf_index(net, ipin);
        assert!(
            leaf < self.connection_costs.len(),
            "timing cost leaf {leaf} out of bounds"
        );
        if self.connection_costs[leaf].to_bits() == value.to_bits() {
            return;
        }
        self.invalidate(leaf);
        self.connection_costs[leaf] = value;
    }

    /// Marks node `index` and its ancestors invalid.
    ///
    /// The walk stops at the first ancestor already invalid, as all of its
    /// own ancestors are then invalid too.
    pub fn invalidate(&mut self, index: usize) {
        debug_assert!(
            index < self.connection_costs.len(),
            "timing cost node {index} out of bounds"
        );
        self.connection_costs[index] = f64::NAN;
        let mut i = index;
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.connection_costs[parent].is_nan() {
                break;
            }
            self.connection_costs[parent] = f64::NAN;
            i = parent;
        }
    }

    /// Sum of all connection costs, re-summing only invalidated subtrees.
    pub fn total(&mut self) -> f64 {
        self.total_sub(0)
    }

    fn total_sub(&mut self, i: usize) -> f64 {
        let Some(&node) = self.connection_costs.get(i) else {
            return 0.0;
        };
        if !node.is_nan() {
            return node;
        }
        let sum = self.total_sub(2 * i + 1) + self.total_sub(2 * i + 2);
        self.connection_costs[i] = sum;
        sum
    }

    /// Sum of all connection costs ignoring every memoized internal node.
    ///
    /// Uses the same summation order as [`total`](Self::total), so the two
    /// agree bit for bit.
    pub fn total_from_scratch(&self) -> f64 {
        self.total_from_scratch_sub(0)
    }

    fn total_from_scratch_sub(&self, i: usize) -> f64 {
        if i >= self.connection_costs.len() {
            return 0.0;
        }
        if i >= self.first_leaf {
            let leaf = self.connection_costs[i];
            // An unset leaf has no children and totals to zero.
            return if leaf.is_nan() { 0.0 } else { leaf };
        }
        self.total_from_scratch_sub(2 * i + 1) + self.total_from_scratch_sub(2 * i + 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(i: u32) -> NetId {
        NetId::from_raw(i)
    }

    #[test]
    fn three_connection_example() {
        // Net A with two sinks, net B with one sink.
        let mut costs = PlacerTimingCosts::new(&[3, 2]);
        costs.set(net(0), 1, 1.0);
        costs.set(net(0), 2, 2.0);
        costs.set(net(1), 1, 0.5);
        assert_eq!(costs.total(), 3.5);
        costs.set(net(0), 1, 4.0);
        assert_eq!(costs.total(), 6.5);
        assert_eq!(costs.total(), costs.total_from_scratch());
    }

    #[test]
    fn shape_for_three_connections() {
        let costs = PlacerTimingCosts::new(&[3, 2]);
        assert_eq!(costs.num_connections(), 3);
        assert_eq!(costs.num_levels(), 3);
        assert_eq!(costs.leaf_index(net(0), 1), 3);
        assert_eq!(costs.leaf_index(net(1), 1), 5);
    }

    #[test]
    fn empty_tree_totals_zero() {
        let mut costs = PlacerTimingCosts::new(&[]);
        assert_eq!(costs.num_connections(), 0);
        assert_eq!(costs.total(), 0.0);
        let mut driver_only = PlacerTimingCosts::new(&[1, 1]);
        assert_eq!(driver_only.total(), 0.0);
    }

    #[test]
    fn single_connection_tree() {
        let mut costs = PlacerTimingCosts::new(&[2]);
        assert_eq!(costs.num_levels(), 1);
        costs.set(net(0), 1, 2.25);
        assert_eq!(costs.total(), 2.25);
        costs.set(net(0), 1, 1.5);
        assert_eq!(costs.total(), 1.5);
    }

    #[test]
    fn matches_scratch_after_random_updates() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        let pins = [4, 2, 7, 3, 2, 5];
        let mut costs = PlacerTimingCosts::new(&pins);
        let mut rng = StdRng::seed_from_u64(11);
        for (i, &p) in pins.iter().enumerate() {
            for ipin in 1..p {
                costs.set(net(i as u32), ipin, rng.gen_range(0.0..1.0));
            }
        }
        for _ in 0..500 {
            let n = rng.gen_range(0..pins.len());
            let ipin = rng.gen_range(1..pins[n]);
            costs.set(net(n as u32), ipin, rng.gen_range(0.0..1e-9));
            if rng.gen_bool(0.3) {
                let total = costs.total();
                assert_eq!(total.to_bits(), costs.total_from_scratch().to_bits());
            }
        }
    }

    #[test]
    fn reinvalidation_is_idempotent() {
        let mut costs = PlacerTimingCosts::new(&[3, 3]);
        for n in 0..2 {
            for ipin in 1..3 {
                costs.set(net(n), ipin, 1.0);
            }
        }
        assert_eq!(costs.total(), 4.0);
        let leaf = costs.leaf_index(net(1), 2);
        costs.invalidate(leaf);
        costs.invalidate(leaf);
        costs.set(net(1), 2, 3.0);
        assert_eq!(costs.total(), 6.0);
    }

    #[test]
    fn unchanged_set_keeps_memo() {
        let mut costs = PlacerTimingCosts::new(&[3]);
        costs.set(net(0), 1, 1.0);
        costs.set(net(0), 2, 1.0);
        assert_eq!(costs.total(), 2.0);
        costs.set(net(0), 1, 1.0);
        assert_eq!(costs.connection_costs[0], 2.0);
    }

    #[test]
    #[should_panic]
    fn driver_pin_has_no_leaf() {
        let mut costs = PlacerTimingCosts::new(&[3]);
        costs.set(net(0), 0, 1.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of bounds")]
    fn invalidating_past_the_last_node_panics() {
        let mut costs = PlacerTimingCosts::new(&[3, 2]);
        let len = costs.connection_costs.len();
        costs.invalidate(len);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_write_panics() {
        let mut costs = PlacerTimingCosts::new(&[2]);
        costs.set(net(0), 2, 1.0);
    }
}
