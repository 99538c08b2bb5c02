//! Shift planning: per-angle drift, trimmed angle list, output geometry.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::metadata::AcquisitionMetadata;
use crate::{Error, Result};

/// Global vertical drift direction, decided once per scan from the first
/// two shifts and applied uniformly to every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DriftDirection {
    /// Stage moving up: destination windows grow from the bottom.
    Up,
    /// Stage moving down: destination windows hang from the top.
    Down,
}

/// Immutable shift schedule derived from acquisition metadata.
///
/// `final_shifts` keeps one entry per *full-input* projection even when
/// `final_theta` is trimmed: wrapped helical turns index past the trim.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShiftSchedule {
    /// Output projection angles, a prefix of the input theta.
    pub final_theta: Vec<f64>,
    /// Vertical shift in pixels for every input projection.
    pub final_shifts: Vec<f64>,
    /// Output row count.
    pub final_y_size: usize,
    /// Input row count.
    pub input_rows: usize,
    /// Rows of zero context added on each side before sub-pixel shifting.
    pub pad: usize,
}

/// Splits a shift into its integer and fractional parts.
///
/// The integer part truncates toward zero (plain `as` cast semantics),
/// not toward negative infinity; the destination window formulas in
/// [`ShiftSchedule::row_window`] assume exactly this split.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn split_shift(shift: f64) -> (i64, f32) {
    let ishift = shift as i64;
    let fshift = (shift - ishift as f64) as f32;
    (ishift, fshift)
}

/// Derives the shift schedule for a scan, or `None` for non-helical scans.
///
/// Non-helical input is not an error: the caller skips the file and leaves
/// it untouched.
///
/// # Errors
/// Returns an error when fewer than two angles are present (the drift
/// direction would be undecidable) or when the angle list disagrees with
/// the data shape.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn plan_shifts(meta: &AcquisitionMetadata, pad: usize) -> Result<Option<ShiftSchedule>> {
    log::info!("scan type = {}", meta.scan_type);
    if !meta.is_helical() {
        log::info!("not a helical scan, so nothing to do");
        return Ok(None);
    }

    let theta = &meta.theta;
    if theta.len() < 2 {
        return Err(Error::TooFewAngles(theta.len()));
    }
    let (projections, rows, _) = meta.data_shape;
    if projections != theta.len() {
        return Err(Error::ShapeMismatch {
            theta: theta.len(),
            projections,
        });
    }

    let span = meta.angular_span();
    // theta is monotonic and theta[0] always qualifies, so the boundary
    // is the last angle still within the span.
    let boundary = theta
        .iter()
        .rposition(|&t| t - theta[0] <= span)
        .unwrap_or(0);
    log::info!(
        "{span} degree span, theta range {} to {}",
        theta[0],
        theta[boundary]
    );

    let final_theta = theta[..=boundary].to_vec();
    let final_shifts: Vec<f64> = theta
        .iter()
        .map(|&t| (t - theta[0]) / 360.0 * meta.pixels_per_360deg)
        .collect();
    let last = final_shifts[final_shifts.len() - 1];
    let final_y_size = rows + 2 * pad + last.abs().ceil() as usize;

    Ok(Some(ShiftSchedule {
        final_theta,
        final_shifts,
        final_y_size,
        input_rows: rows,
        pad,
    }))
}

impl ShiftSchedule {
    /// Number of output projection angles.
    #[must_use]
    pub fn ntheta_out(&self) -> usize {
        self.final_theta.len()
    }

    /// Number of input projections.
    #[must_use]
    pub fn ntheta_in(&self) -> usize {
        self.final_shifts.len()
    }

    /// Output angular index for input projection `index`.
    ///
    /// Multiple helical turns wrap onto the same output angle; their
    /// contributions are summed.
    #[must_use]
    pub fn output_angle(&self, index: usize) -> usize {
        index % self.final_theta.len()
    }

    /// Drift direction, decided once from the first two shifts.
    #[must_use]
    pub fn drift_direction(&self) -> DriftDirection {
        if self.final_shifts[1] > self.final_shifts[0] {
            DriftDirection::Up
        } else {
            DriftDirection::Down
        }
    }

    /// Destination row window (start inclusive, end exclusive) for input
    /// projection `index`.
    ///
    /// # Errors
    /// Returns [`Error::Geometry`] when the window escapes
    /// `[0, final_y_size)`; escaping windows indicate a planning bug and
    /// are never clamped.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn row_window(&self, index: usize) -> Result<(usize, usize)> {
        let (ishift, _) = split_shift(self.final_shifts[index]);
        let height = (self.input_rows + 2 * self.pad) as i64;
        let (start, end) = match self.drift_direction() {
            DriftDirection::Up => (ishift, ishift + height),
            DriftDirection::Down => {
                let end = self.final_y_size as i64 - 1 + ishift;
                (end - height, end)
            }
        };
        if start < 0 || end > self.final_y_size as i64 {
            return Err(Error::Geometry {
                projection: index,
                start,
                end,
                y_size: self.final_y_size,
            });
        }
        Ok((start as usize, end as usize))
    }
}
