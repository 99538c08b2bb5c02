//! Acquisition metadata read from the source container.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scan metadata gathered from `/process/acquisition` and `/exchange`.
///
/// Read once at the start of a merge; treated as ground truth for the
/// shift computation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AcquisitionMetadata {
    /// Scan type flag; only "helical" (case-insensitive) is merged.
    pub scan_type: String,
    /// Vertical stage drift in detector pixels per full rotation.
    pub pixels_per_360deg: f64,
    /// Projection angles in degrees, monotonic, one per input projection.
    pub theta: Vec<f64>,
    /// Flip-and-stitch flag; "yes" means a 360 degree output span.
    pub flip_stitch: String,
    /// Input data shape (projections, rows, columns).
    pub data_shape: (usize, usize, usize),
}

impl AcquisitionMetadata {
    /// Whether the scan is helical and therefore eligible for merging.
    #[must_use]
    pub fn is_helical(&self) -> bool {
        self.scan_type.eq_ignore_ascii_case("helical")
    }

    /// Angular span covered by one output angle set, in degrees.
    #[must_use]
    pub fn angular_span(&self) -> f64 {
        if self.flip_stitch.eq_ignore_ascii_case("yes") {
            360.0
        } else {
            180.0
        }
    }
}
