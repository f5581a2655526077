//! Shared foundational types used across the Strix placement workspace.
//!
//! This crate provides the opaque ID macro used for arena-style indices, the
//! internal error type returned when an invariant breaks, and the thread-safe
//! diagnostic sink that placement stages report user-visible events into.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod id;
pub mod result;
pub mod sink;

pub use diagnostic::{Category, Diagnostic, DiagnosticCode, Severity};
pub use result::{InternalError, StrixResult};
pub use sink::DiagnosticSink;
