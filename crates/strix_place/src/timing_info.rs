//! Interface to the setup timing analyzer driven by the placer.

use crate::ids::PinId;
use crate::net_pins_matrix::NetPinsMatrix;

/// A setup timing analyzer operating on the placer's clustered pins.
///
/// The placer pushes connection delays through [`update`](Self::update) and
/// reads back per-pin criticality and slack. After each update the analyzer
/// reports which pins changed, so that the placer caches can be refreshed
/// incrementally. Pins passed to
/// [`invalidate_connection`](Self::invalidate_connection) must be re-timed
/// and reported as modified by the next update.
pub trait SetupTimingInfo {
    /// Marks the connection ending at sink `pin` as needing re-analysis.
    fn invalidate_connection(&mut self, pin: PinId);

    /// Re-runs setup analysis with the given connection delays.
    fn update(&mut self, connection_delay: &NetPinsMatrix<f32>);

    /// Pins whose setup criticality changed in the last update.
    fn pins_with_modified_setup_criticality(&self) -> &[PinId];

    /// Pins whose setup slack changed in the last update.
    fn pins_with_modified_setup_slack(&self) -> &[PinId];

    /// Setup criticality of `pin`, in `[0, 1]`.
    fn setup_pin_criticality(&self, pin: PinId) -> f32;

    /// Worst setup slack through `pin`.
    fn setup_pin_slack(&self, pin: PinId) -> f32;

    /// Critical path delay of the last update.
    fn critical_path_delay(&self) -> f32;

    /// Worst negative slack of the last update (0 if none negative).
    fn setup_worst_negative_slack(&self) -> f32;

    /// Sum of negative endpoint slacks of the last update.
    fn setup_total_negative_slack(&self) -> f32;
}
