//! Opaque ID newtypes used as arena indices.
//!
//! [`define_id!`](crate::define_id) generates thin `u32` wrappers that are
//! `Copy`, `Hash`, `Ord` and `Serialize`/`Deserialize`. Crates using the macro
//! must depend on `serde` directly.

/// Defines an opaque, copyable `u32` index type.
///
/// The generated type exposes `from_raw`, `as_raw` and `index` (the raw value
/// as a `usize`, for indexing into dense vectors) and implements `Display`.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Debug,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub const fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Creates an ID from a dense `usize` index.
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as a `usize`.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
