//! Errors returned by a placement run.

use crate::device::PlLoc;
use strix_common::{Category, Diagnostic, DiagnosticCode, InternalError};
use strix_config::{ConfigError, PlaceAlgorithm};

/// Errors that prevent a placement run from starting or completing.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// A timing-driven algorithm was requested without a timing analyzer.
    #[error("placement algorithm {0:?} requires a timing analyzer")]
    MissingTimingAnalyzer(PlaceAlgorithm),

    /// A timing-driven algorithm was requested without a delay model.
    #[error("placement algorithm {0:?} requires a delay model")]
    MissingDelayModel(PlaceAlgorithm),

    /// The device has too few sites of some block type.
    #[error("design needs {needed} '{block_type}' sites but the device has {available}")]
    InsufficientSites {
        /// Name of the block type.
        block_type: String,
        /// Number of blocks of this type.
        needed: usize,
        /// Number of compatible sites.
        available: usize,
    },

    /// A fixed block is locked to an incompatible or already used site.
    #[error("block '{block}' cannot be fixed at {loc}: {reason}")]
    IllegalFixedLocation {
        /// Name of the block.
        block: String,
        /// The requested location.
        loc: PlLoc,
        /// Why the location is illegal.
        reason: &'static str,
    },

    /// The timing graph contains a combinational cycle.
    #[error("combinational loop through block '{block}'")]
    CombinationalLoop {
        /// Name of a block on the cycle.
        block: String,
    },

    /// The options are inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Incrementally maintained state diverged from a recomputation.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl PlaceError {
    /// Converts this error into a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = match self {
            PlaceError::MissingTimingAnalyzer(_) => DiagnosticCode::new(Category::Timing, 1),
            PlaceError::MissingDelayModel(_) => DiagnosticCode::new(Category::Timing, 2),
            PlaceError::CombinationalLoop { .. } => DiagnosticCode::new(Category::Timing, 3),
            PlaceError::InsufficientSites { .. } => DiagnosticCode::new(Category::Placement, 1),
            PlaceError::IllegalFixedLocation { .. } => DiagnosticCode::new(Category::Placement, 2),
            PlaceError::Internal(_) => DiagnosticCode::new(Category::Placement, 900),
            PlaceError::Config(err) => return err.to_diagnostic(),
        };
        Diagnostic::error(code, self.to_string())
    }
}
