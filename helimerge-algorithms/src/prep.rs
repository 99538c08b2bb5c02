//! Projection preprocessing: outlier removal, normalization, log conversion.
//!
//! Mirrors the acquisition-side correction chain: zinger removal, flat
//! field correction, minus-log conversion, NaN/inf repair, value capping.
//! Strategies are fixed at configuration time; no step reads ambient
//! state.

use helimerge_core::{Error, FlatCorrection, PreprocessConfig, Result, ZingerRemoval};
use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};
use rayon::prelude::*;

/// Runs the full preprocessing chain on a projection chunk.
///
/// `proj` is the raw angular slab, `flat`/`dark` the reference fields
/// (any number of frames each, averaged over the frame axis). Returns the
/// corrected chunk; all arrays are (frame, row, column).
///
/// # Errors
/// Returns an error when the reference fields do not match the projection
/// row/column extent or a flat/dark stack is empty while required.
pub fn preprocess(
    mut proj: Array3<f32>,
    mut flat: Array3<f32>,
    dark: Array3<f32>,
    config: &PreprocessConfig,
) -> Result<Array3<f32>> {
    let (_, rows, cols) = proj.dim();
    for (name, field) in [("flat", &flat), ("dark", &dark)] {
        let (_, frows, fcols) = field.dim();
        if (frows, fcols) != (rows, cols) {
            return Err(Error::Config(format!(
                "{name} field is {frows}x{fcols}, projections are {rows}x{cols}"
            )));
        }
    }

    if let ZingerRemoval::Standard {
        level_projections,
        level_white,
        size,
    } = config.zinger
    {
        log::info!("zinger removal, window {size}");
        remove_outlier(&mut proj, level_projections, size);
        remove_outlier(&mut flat, level_white, size);
    }

    match config.flat {
        FlatCorrection::Standard { cutoff } => {
            log::info!("flat correction, cutoff {cutoff}");
            let flat_mean = flat
                .mean_axis(Axis(0))
                .ok_or_else(|| Error::Config("empty flat field stack".to_string()))?;
            let dark_mean = dark
                .mean_axis(Axis(0))
                .ok_or_else(|| Error::Config("empty dark field stack".to_string()))?;
            let denom = &flat_mean - &dark_mean;
            for mut plane in proj.axis_iter_mut(Axis(0)) {
                Zip::from(&mut plane)
                    .and(&dark_mean)
                    .and(&denom)
                    .for_each(|value, &dark, &den| {
                        let normalized = (*value - dark) / den;
                        *value = if normalized > cutoff { cutoff } else { normalized };
                    });
            }
        }
        FlatCorrection::Air { air } => {
            log::info!("air normalization, {air} pixels");
            normalize_background(&mut proj, air);
        }
        FlatCorrection::None => {
            log::warn!("normalization is turned off");
        }
    }

    if config.minus_log {
        proj.mapv_inplace(|value| -value.ln());
    }

    if let Some(replacement) = config.fix_nan_and_inf {
        proj.mapv_inplace(|value| {
            if value.is_nan() {
                replacement
            } else if value < 0.0 {
                0.0
            } else if value.is_infinite() {
                replacement
            } else {
                value
            }
        });
    }

    let cap = config.sinogram_max_value;
    proj.mapv_inplace(|value| if value > cap { cap } else { value });

    Ok(proj)
}

/// Replaces pixels exceeding the local 2-D median by more than `level`
/// with that median, per frame.
pub fn remove_outlier(data: &mut Array3<f32>, level: f32, size: usize) {
    if size <= 1 {
        return;
    }
    let filtered: Vec<Array2<f32>> = {
        let planes: Vec<ArrayView2<'_, f32>> = data.axis_iter(Axis(0)).collect();
        planes
            .par_iter()
            .map(|plane| despeckle_plane(*plane, level, size))
            .collect()
    };
    for (mut plane, result) in data.axis_iter_mut(Axis(0)).zip(filtered) {
        plane.assign(&result);
    }
}

fn despeckle_plane(plane: ArrayView2<'_, f32>, level: f32, size: usize) -> Array2<f32> {
    let (rows, cols) = plane.dim();
    let half = size / 2;
    let mut out = plane.to_owned();
    let mut window = Vec::with_capacity(size * size);
    for r in 0..rows {
        let r0 = r.saturating_sub(half);
        let r1 = (r + half + 1).min(rows);
        for c in 0..cols {
            let c0 = c.saturating_sub(half);
            let c1 = (c + half + 1).min(cols);
            window.clear();
            for rr in r0..r1 {
                for cc in c0..c1 {
                    window.push(plane[[rr, cc]]);
                }
            }
            window.sort_unstable_by(f32::total_cmp);
            let median = window[window.len() / 2];
            if plane[[r, c]] - median > level {
                out[[r, c]] = median;
            }
        }
    }
    out
}

/// Divides each row by a linear background ramp fitted to `air` columns
/// at each sinogram edge.
#[allow(clippy::cast_precision_loss)]
fn normalize_background(data: &mut Array3<f32>, air: usize) {
    let (_, _, cols) = data.dim();
    let air = air.min(cols).max(1);
    let span = (cols.saturating_sub(1)).max(1) as f32;
    for mut plane in data.axis_iter_mut(Axis(0)) {
        for mut row in plane.rows_mut() {
            let left: f32 = row.iter().take(air).sum::<f32>() / air as f32;
            let right: f32 = row.iter().rev().take(air).sum::<f32>() / air as f32;
            for (c, value) in row.iter_mut().enumerate() {
                let background = left + (right - left) * c as f32 / span;
                if background != 0.0 {
                    *value /= background;
                }
            }
        }
    }
}
