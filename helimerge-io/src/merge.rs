//! The accumulation engine: chunked shift-and-accumulate drive loop.

use crate::hdf5::{read_metadata, read_projection_chunk, read_reference_fields, DATA_PATH};
use crate::skeleton::make_skeleton;
use crate::Result;
use hdf5::File;
use helimerge_algorithms::{apply_shift_subpixel, preprocess};
use helimerge_core::{plan_shifts, split_shift, MergeConfig, ShiftSchedule};
use ndarray::{s, Axis, Ix3};
use std::path::{Path, PathBuf};

/// Output path for a merged file: input stem + `_merged` + extension,
/// same directory.
#[must_use]
pub fn merged_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let name = match input.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_merged.{ext}"),
        None => format!("{stem}_merged"),
    };
    input.with_file_name(name)
}

/// Merges a helical acquisition into a static-scan-equivalent file.
///
/// Returns the output path, or `None` when the scan is not helical (the
/// input is left untouched and nothing is written).
///
/// Chunks are processed strictly sequentially; a failure anywhere aborts
/// the run and propagates unmodified. A partially written output left
/// behind by an abort is invalid and must be discarded by the operator;
/// this engine does not delete it.
///
/// # Errors
/// Returns an error for missing metadata, geometry inconsistencies, or
/// any HDF5 read/write failure.
pub fn merge_file(input: &Path, config: &MergeConfig) -> Result<Option<PathBuf>> {
    config.validate()?;
    let source = File::open(input)?;
    let metadata = read_metadata(&source)?;
    let Some(schedule) = plan_shifts(&metadata, config.subpixel_pad)? else {
        return Ok(None);
    };

    let columns = metadata.data_shape.2;
    let output_path = merged_path(input);
    let output = File::create(&output_path)?;
    make_skeleton(&source, &output, &schedule, columns)?;
    accumulate(&source, &output, &schedule, config)?;
    log::info!(
        "merged {} projections onto {} output angles in {}",
        schedule.ntheta_in(),
        schedule.ntheta_out(),
        output_path.display()
    );
    Ok(Some(output_path))
}

fn accumulate(
    source: &File,
    output: &File,
    schedule: &ShiftSchedule,
    config: &MergeConfig,
) -> Result<()> {
    let (flat, dark) = read_reference_fields(source)?;
    let data_out = output.dataset(DATA_PATH)?;
    let ntheta = schedule.ntheta_in();
    let pad = config.subpixel_pad;

    for start in (0..ntheta).step_by(config.proj_chunk_size) {
        let end = (start + config.proj_chunk_size).min(ntheta);
        log::info!("processing angle chunk {start}..{end}");

        let raw = read_projection_chunk(source, start, end)?;
        let data = preprocess(raw, flat.clone(), dark.clone(), &config.preprocess)?;

        let mut windows = Vec::with_capacity(end - start);
        let mut fshifts = Vec::with_capacity(end - start);
        for index in start..end {
            let (_, fshift) = split_shift(schedule.final_shifts[index]);
            windows.push(schedule.row_window(index)?);
            fshifts.push(fshift);
        }
        let shifted = apply_shift_subpixel(data.view(), &fshifts, pad)?;

        // Wrapped helical turns land on the same output angle with
        // overlapping row windows; writes are read-add-write, never
        // assignment.
        for (offset, &(row_start, row_end)) in windows.iter().enumerate() {
            let angle = schedule.output_angle(start + offset);
            let mut slab =
                data_out.read_slice::<f32, _, Ix3>(s![angle..angle + 1, row_start..row_end, ..])?;
            {
                let mut plane = slab.index_axis_mut(Axis(0), 0);
                plane += &shifted.index_axis(Axis(0), offset);
            }
            data_out.write_slice(slab.view(), s![angle..angle + 1, row_start..row_end, ..])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_path_keeps_extension() {
        assert_eq!(
            merged_path(Path::new("/data/scan_042.h5")),
            PathBuf::from("/data/scan_042_merged.h5")
        );
        assert_eq!(
            merged_path(Path::new("/data/scan_042.hdf")),
            PathBuf::from("/data/scan_042_merged.hdf")
        );
        assert_eq!(
            merged_path(Path::new("scan")),
            PathBuf::from("scan_merged")
        );
    }
}
