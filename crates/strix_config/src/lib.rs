//! Placer options for the Strix annealing placer.
//!
//! This crate defines the strongly-typed [`PlacerOpts`] consumed by
//! `strix_place`, loads them from TOML and validates their consistency.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_opts, load_opts_from_str, validate_opts};
pub use types::*;
