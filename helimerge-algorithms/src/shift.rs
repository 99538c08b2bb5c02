//! Sub-pixel vertical shifts via frequency-domain phase multiplication.

use helimerge_core::{Error, Result};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use num_complex::Complex32;
use rayon::prelude::*;
use rustfft::num_traits::Zero;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Discrete frequency bins for an `n`-point transform, in cycles per
/// sample: `0, 1/n, ..` then the negative half.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn fftfreq(n: usize) -> Vec<f64> {
    let len = n as f64;
    (0..n)
        .map(|k| {
            if k <= (n - 1) / 2 {
                k as f64 / len
            } else {
                (k as i64 - n as i64) as f64 / len
            }
        })
        .collect()
}

/// Per-row phase factors realizing a translation by `shift` rows.
///
/// The phase angle is evaluated in double precision and only the final
/// factor is narrowed to f32.
#[allow(clippy::cast_possible_truncation)]
fn phase_ramp(freqs: &[f64], shift: f32) -> Vec<Complex32> {
    freqs
        .iter()
        .map(|&f| {
            let angle = -2.0 * PI * f * f64::from(shift);
            Complex32::new(angle.cos() as f32, angle.sin() as f32)
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn shift_projection(
    projection: ArrayView2<'_, f32>,
    shift: f32,
    pad: usize,
    forward: &Arc<dyn Fft<f32>>,
    inverse: &Arc<dyn Fft<f32>>,
    freqs: &[f64],
) -> Array2<f32> {
    let (rows, cols) = projection.dim();
    let padded = rows + 2 * pad;
    let ramp = phase_ramp(freqs, shift);
    let scale = 1.0 / padded as f32;

    let mut out = Array2::<f32>::zeros((padded, cols));
    let mut lane = vec![Complex32::zero(); padded];
    let scratch_len = forward
        .get_inplace_scratch_len()
        .max(inverse.get_inplace_scratch_len());
    let mut scratch = vec![Complex32::zero(); scratch_len];

    for c in 0..cols {
        lane.fill(Complex32::zero());
        for r in 0..rows {
            lane[pad + r] = Complex32::new(projection[[r, c]], 0.0);
        }
        forward.process_with_scratch(&mut lane, &mut scratch);
        for (value, factor) in lane.iter_mut().zip(ramp.iter().copied()) {
            *value *= factor;
        }
        inverse.process_with_scratch(&mut lane, &mut scratch);
        for (r, value) in lane.iter().enumerate() {
            out[[r, c]] = value.re * scale;
        }
    }
    out
}

/// Applies a fractional vertical shift to every projection of a chunk.
///
/// Each projection is zero-padded by `pad` rows top and bottom, moved by
/// its own `shifts` entry along the row axis through a linear phase ramp
/// in the frequency domain, and returned with the padded row extent
/// `rows + 2*pad`. The translation is exact for band-limited content; the
/// padding suppresses circular wraparound at the row boundaries.
///
/// # Errors
/// Returns an error when `shifts` does not hold one entry per projection.
pub fn apply_shift_subpixel(
    data: ArrayView3<'_, f32>,
    shifts: &[f32],
    pad: usize,
) -> Result<Array3<f32>> {
    let (ntheta, rows, cols) = data.dim();
    if shifts.len() != ntheta {
        return Err(Error::ChunkMismatch {
            angles: ntheta,
            shifts: shifts.len(),
        });
    }
    let padded = rows + 2 * pad;
    let mut out = Array3::<f32>::zeros((ntheta, padded, cols));
    if ntheta == 0 || padded == 0 || cols == 0 {
        return Ok(out);
    }

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(padded);
    let inverse = planner.plan_fft_inverse(padded);
    let freqs = fftfreq(padded);

    let shifted: Vec<Array2<f32>> = (0..ntheta)
        .into_par_iter()
        .map(|a| {
            shift_projection(
                data.index_axis(Axis(0), a),
                shifts[a],
                pad,
                &forward,
                &inverse,
                &freqs,
            )
        })
        .collect();
    for (a, plane) in shifted.into_iter().enumerate() {
        out.index_axis_mut(Axis(0), a).assign(&plane);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    /// Gaussian bump that decays to ~0 well before the row boundaries, so
    /// circular wraparound does not pollute shift comparisons.
    fn bump_volume(rows: usize, cols: usize) -> Array3<f32> {
        let center = rows as f64 / 2.0;
        Array3::from_shape_fn((1, rows, cols), |(_, r, _)| {
            let d = (r as f64 - center) / 5.0;
            (-0.5 * d * d).exp() as f32
        })
    }

    #[test]
    fn test_fftfreq_matches_reference_layout() {
        assert_eq!(fftfreq(4), vec![0.0, 0.25, -0.5, -0.25]);
        assert_eq!(fftfreq(5), vec![0.0, 0.2, 0.4, -0.4, -0.2]);
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let data = bump_volume(64, 3);
        let out = apply_shift_subpixel(data.view(), &[0.0], 0).unwrap();
        for r in 0..64 {
            assert_abs_diff_eq!(out[[0, r, 1]], data[[0, r, 1]], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_round_trip_restores_profile() {
        let data = bump_volume(64, 2);
        let d = 0.37f32;
        let once = apply_shift_subpixel(data.view(), &[d], 0).unwrap();
        let back = apply_shift_subpixel(once.view(), &[-d], 0).unwrap();
        for r in 0..64 {
            assert_abs_diff_eq!(back[[0, r, 0]], data[[0, r, 0]], epsilon = 1e-4);
        }
    }

    #[test]
    fn test_round_trip_with_padding() {
        let data = bump_volume(64, 2);
        let d = 0.7f32;
        let once = apply_shift_subpixel(data.view(), &[d], 1).unwrap();
        assert_eq!(once.dim(), (1, 66, 2));
        let back = apply_shift_subpixel(once.view(), &[-d], 1).unwrap();
        assert_eq!(back.dim(), (1, 68, 2));
        for r in 0..64 {
            assert_abs_diff_eq!(back[[0, r + 2, 0]], data[[0, r, 0]], epsilon = 1e-3);
        }
    }

    #[test]
    fn test_unit_shift_moves_one_row() {
        let data = bump_volume(64, 1);
        let out = apply_shift_subpixel(data.view(), &[1.0], 0).unwrap();
        for r in 1..64 {
            assert_abs_diff_eq!(out[[0, r, 0]], data[[0, r - 1, 0]], epsilon = 1e-4);
        }
    }

    #[test]
    fn test_sum_preserved() {
        // The phase factor at the zero-frequency bin is exactly 1, so the
        // per-column sum survives any fractional shift.
        let data = bump_volume(48, 2);
        let out = apply_shift_subpixel(data.view(), &[0.43], 2).unwrap();
        let before: f32 = data.iter().sum();
        let after: f32 = out.iter().sum();
        assert_abs_diff_eq!(before, after, epsilon = 1e-3);
    }

    #[test]
    fn test_per_angle_shifts_are_independent() {
        let mut data = Array3::<f32>::zeros((2, 32, 1));
        let single = bump_volume(32, 1);
        data.index_axis_mut(ndarray::Axis(0), 0)
            .assign(&single.index_axis(ndarray::Axis(0), 0));
        data.index_axis_mut(ndarray::Axis(0), 1)
            .assign(&single.index_axis(ndarray::Axis(0), 0));
        let out = apply_shift_subpixel(data.view(), &[0.0, 1.0], 0).unwrap();
        for r in 1..32 {
            assert_abs_diff_eq!(out[[0, r, 0]], data[[0, r, 0]], epsilon = 1e-4);
            assert_abs_diff_eq!(out[[1, r, 0]], data[[1, r - 1, 0]], epsilon = 1e-4);
        }
    }

    #[test]
    fn test_shift_count_mismatch_rejected() {
        let data = Array3::<f32>::zeros((3, 8, 4));
        let err = apply_shift_subpixel(data.view(), &[0.1, 0.2], 1).unwrap_err();
        assert!(matches!(
            err,
            helimerge_core::Error::ChunkMismatch { angles: 3, shifts: 2 }
        ));
    }
}
