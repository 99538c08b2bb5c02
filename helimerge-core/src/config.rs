//! Merge and preprocessing configuration records.
//!
//! All knobs travel through these immutable structs; nothing reads
//! ambient/global state. Correction strategies are selected once at
//! configuration time as tagged variants.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Zinger (transient outlier pixel) removal strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ZingerRemoval {
    /// Median-filter based outlier replacement.
    Standard {
        /// Replacement threshold above the local median, projections.
        level_projections: f32,
        /// Replacement threshold above the local median, flat fields.
        level_white: f32,
        /// Median filter window size in pixels.
        size: usize,
    },
    /// Leave zingers in place.
    None,
}

/// Flat-field normalization strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FlatCorrection {
    /// `(proj - dark) / (flat - dark)` with the quotient capped at `cutoff`.
    Standard {
        /// Upper cap applied to the normalized quotient.
        cutoff: f32,
    },
    /// Per-row background normalization from `air` columns at each edge.
    Air {
        /// Number of background columns sampled at each sinogram edge.
        air: usize,
    },
    /// Pass raw projections through unchanged.
    None,
}

/// Preprocessing pipeline configuration, applied in declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PreprocessConfig {
    /// Zinger removal strategy.
    pub zinger: ZingerRemoval,
    /// Flat-field correction strategy.
    pub flat: FlatCorrection,
    /// Convert transmission to pathlength with `-ln(data)`.
    pub minus_log: bool,
    /// When set, NaN and +inf become this value and negatives become 0.
    pub fix_nan_and_inf: Option<f32>,
    /// Values above this cap are clipped to it.
    pub sinogram_max_value: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            zinger: ZingerRemoval::None,
            flat: FlatCorrection::Standard { cutoff: 1.0 },
            minus_log: true,
            fix_nan_and_inf: None,
            sinogram_max_value: 1e16,
        }
    }
}

/// Top-level merge configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MergeConfig {
    /// Projection angles processed per chunk.
    pub proj_chunk_size: usize,
    /// Rows of zero context padded on each side for sub-pixel shifts.
    pub subpixel_pad: usize,
    /// Preprocessing pipeline configuration.
    pub preprocess: PreprocessConfig,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            proj_chunk_size: 32,
            subpixel_pad: 1,
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl MergeConfig {
    /// Checks the configuration for values the pipeline cannot run with.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for a zero chunk size or a zinger window
    /// smaller than one pixel.
    pub fn validate(&self) -> Result<()> {
        if self.proj_chunk_size == 0 {
            return Err(Error::Config(
                "proj_chunk_size must be at least 1".to_string(),
            ));
        }
        if let ZingerRemoval::Standard { size, .. } = self.preprocess.zinger {
            if size == 0 {
                return Err(Error::Config(
                    "zinger filter size must be at least 1".to_string(),
                ));
            }
        }
        if let FlatCorrection::Air { air } = self.preprocess.flat {
            if air == 0 {
                return Err(Error::Config(
                    "air normalization needs at least 1 column".to_string(),
                ));
            }
        }
        Ok(())
    }
}
