//! Ragged per-net, per-pin storage.

use crate::ids::NetId;
use std::ops::{Index, IndexMut};

/// A ragged matrix with one row per net and one column per net pin.
///
/// Rows are stored back to back in a single vector; `offsets[net]` is the
/// start of the row of `net`.
#[derive(Clone, Debug, PartialEq)]
pub struct NetPinsMatrix<T> {
    offsets: Vec<usize>,
    data: Vec<T>,
}

impl<T: Clone> NetPinsMatrix<T> {
    /// Creates a matrix with `pins_per_net[i]` columns in row `i`, filled with `value`.
    pub fn new(pins_per_net: &[usize], value: T) -> Self {
        let mut offsets = Vec::with_capacity(pins_per_net.len() + 1);
        let mut total = 0;
        for &pins in pins_per_net {
            offsets.push(total);
            total += pins;
        }
        offsets.push(total);
        Self {
            offsets,
            data: vec![value; total],
        }
    }

    /// Overwrites every entry with `value`.
    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value.clone());
    }
}

impl<T> NetPinsMatrix<T> {
    /// Number of rows.
    pub fn num_nets(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// The entries of `net`.
    pub fn row(&self, net: NetId) -> &[T] {
        &self.data[self.offsets[net.index()]..self.offsets[net.index() + 1]]
    }

    /// The entries of `net`, mutably.
    pub fn row_mut(&mut self, net: NetId) -> &mut [T] {
        let (start, end) = (self.offsets[net.index()], self.offsets[net.index() + 1]);
        &mut self.data[start..end]
    }
}

impl<T> Index<(NetId, usize)> for NetPinsMatrix<T> {
    type Output = T;

    fn index(&self, (net, ipin): (NetId, usize)) -> &T {
        &self.row(net)[ipin]
    }
}

impl<T> IndexMut<(NetId, usize)> for NetPinsMatrix<T> {
    fn index_mut(&mut self, (net, ipin): (NetId, usize)) -> &mut T {
        &mut self.row_mut(net)[ipin]
    }
}
