//! Opaque ID newtypes for placement entities.
//!
//! [`BlockId`], [`NetId`], [`PinId`] and [`BlockTypeId`] are thin `u32`
//! wrappers used as arena indices into the clustered netlist.

use strix_common::define_id;

define_id!(
    /// Opaque, copyable ID for a placeable block.
    BlockId
);

define_id!(
    /// Opaque, copyable ID for a net in the clustered netlist.
    NetId
);

define_id!(
    /// Opaque, copyable ID for a block pin attached to a net.
    PinId
);

define_id!(
    /// Opaque, copyable ID for a logical block type.
    BlockTypeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_index_dense_vectors() {
        let values = vec![10, 20, 30];
        assert_eq!(values[NetId::from_raw(2).index()], 30);
        assert_eq!(BlockId::from_index(1).as_raw(), 1);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = PinId::from_raw(55);
        let json = serde_json::to_string(&id).unwrap();
        let restored: PinId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
