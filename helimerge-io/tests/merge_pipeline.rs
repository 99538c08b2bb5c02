//! End-to-end merge tests on synthetic DX-layout files.

use approx::assert_abs_diff_eq;
use hdf5::types::VarLenUnicode;
use hdf5::File;
use helimerge_core::{FlatCorrection, MergeConfig, PreprocessConfig, ZingerRemoval};
use helimerge_io::{merge_file, merged_path};
use ndarray::{Array3, ArrayView1};
use std::path::Path;
use std::str::FromStr;
use tempfile::TempDir;

fn write_string_dataset(group: &hdf5::Group, name: &str, value: &str) {
    let value = VarLenUnicode::from_str(value).unwrap();
    let dataset = group
        .new_dataset::<VarLenUnicode>()
        .shape(1)
        .create(name)
        .unwrap();
    dataset.write(ArrayView1::from(&[value][..])).unwrap();
}

fn write_dx_file(
    path: &Path,
    scan_type: &str,
    flip_stitch: &str,
    pixels_per_360deg: f64,
    theta: &[f64],
    data: &Array3<f32>,
) {
    let file = File::create(path).unwrap();
    let process = file.create_group("process").unwrap();
    let acquisition = process.create_group("acquisition").unwrap();
    write_string_dataset(&acquisition, "scan_type", scan_type);
    write_string_dataset(&acquisition, "flip_stitch", flip_stitch);
    acquisition
        .new_dataset::<f64>()
        .shape(1)
        .create("pixels_y_per_360_deg")
        .unwrap()
        .write(ArrayView1::from(&[pixels_per_360deg][..]))
        .unwrap();

    let (_, rows, cols) = data.dim();
    let exchange = file.create_group("exchange").unwrap();
    exchange
        .new_dataset::<f64>()
        .shape(theta.len())
        .create("theta")
        .unwrap()
        .write(ArrayView1::from(theta))
        .unwrap();
    exchange
        .new_dataset::<f32>()
        .shape(data.dim())
        .create("data")
        .unwrap()
        .write(data.view())
        .unwrap();
    exchange
        .new_dataset::<f32>()
        .shape((1, rows, cols))
        .create("data_white")
        .unwrap()
        .write(Array3::<f32>::ones((1, rows, cols)).view())
        .unwrap();
    exchange
        .new_dataset::<f32>()
        .shape((1, rows, cols))
        .create("data_dark")
        .unwrap()
        .write(Array3::<f32>::zeros((1, rows, cols)).view())
        .unwrap();
}

fn passthrough_config(chunk: usize) -> MergeConfig {
    MergeConfig {
        proj_chunk_size: chunk,
        subpixel_pad: 1,
        preprocess: PreprocessConfig {
            zinger: ZingerRemoval::None,
            flat: FlatCorrection::None,
            minus_log: false,
            fix_nan_and_inf: None,
            sinogram_max_value: 1e16,
        },
    }
}

fn degrees(count: usize) -> Vec<f64> {
    (0..count).map(|i| i as f64).collect()
}

#[test]
fn test_not_helical_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("scan.h5");
    let data = Array3::<f32>::ones((4, 8, 4));
    write_dx_file(&input, "standard", "no", 10.0, &degrees(4), &data);

    let result = merge_file(&input, &passthrough_config(32)).unwrap();
    assert!(result.is_none());
    assert!(!merged_path(&input).exists());
}

#[test]
fn test_missing_metadata_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("scan.h5");
    {
        let file = File::create(&input).unwrap();
        let process = file.create_group("process").unwrap();
        let acquisition = process.create_group("acquisition").unwrap();
        write_string_dataset(&acquisition, "scan_type", "helical");
        // pixels_y_per_360_deg and flip_stitch are absent.
    }
    let err = merge_file(&input, &passthrough_config(32)).unwrap_err();
    assert!(matches!(err, helimerge_io::Error::MissingMetadata(_)));
}

#[test]
fn test_two_turns_accumulate_onto_one_angle_set() {
    // 362 one-degree steps with a 180 degree span: exactly two helical
    // turns wrap onto 181 output angles.
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("two_turns.h5");
    let ntheta = 362;
    let (rows, cols) = (8, 4);
    let data = Array3::<f32>::ones((ntheta, rows, cols));
    write_dx_file(&input, "helical", "no", 1.0, &degrees(ntheta), &data);

    let output_path = merge_file(&input, &passthrough_config(32))
        .unwrap()
        .expect("helical scan must produce output");
    assert_eq!(output_path, merged_path(&input));

    let output = File::open(&output_path).unwrap();
    let merged: Array3<f32> = output.dataset("/exchange/data").unwrap().read().unwrap();
    // last shift = 361/360, so two extra rows on top of rows + 2*pad.
    assert_eq!(merged.dim(), (181, rows + 2 + 2, cols));

    // The sub-pixel shift preserves the per-projection sum, so every
    // output angle carries the mass of exactly two input projections.
    let projection_mass = (rows * cols) as f32;
    for angle in [0, 50, 180] {
        let mass: f32 = merged.index_axis(ndarray::Axis(0), angle).iter().sum();
        assert_abs_diff_eq!(mass, 2.0 * projection_mass, epsilon = 1e-2);
    }
    let total: f32 = merged.iter().sum();
    assert_abs_diff_eq!(total, (ntheta * rows * cols) as f32, epsilon = 0.5);
}

#[test]
fn test_drift_places_content_at_shifted_rows() {
    // A Gaussian row profile drifting upward must land at
    // pad + center + shift in the output, per projection.
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("drift.h5");
    let ntheta = 181;
    let (rows, cols) = (16, 3);
    let center = 8.0f64;
    let data = Array3::from_shape_fn((ntheta, rows, cols), |(_, r, _)| {
        let d = (r as f64 - center) / 2.0;
        (-0.5 * d * d).exp() as f32
    });
    write_dx_file(&input, "helical", "no", 8.0, &degrees(ntheta), &data);

    let output_path = merge_file(&input, &passthrough_config(50)).unwrap().unwrap();
    let output = File::open(&output_path).unwrap();
    let merged: Array3<f32> = output.dataset("/exchange/data").unwrap().read().unwrap();
    // last shift = 180/360 * 8 = 4 rows.
    assert_eq!(merged.dim(), (181, rows + 2 + 4, cols));

    for angle in [0usize, 45, 100, 180] {
        let shift = angle as f64 / 360.0 * 8.0;
        let profile = merged.index_axis(ndarray::Axis(0), angle);
        let mut weight = 0.0f64;
        let mut moment = 0.0f64;
        for (r, value) in profile.index_axis(ndarray::Axis(1), 0).iter().enumerate() {
            weight += f64::from(*value);
            moment += r as f64 * f64::from(*value);
        }
        let com = moment / weight;
        assert_abs_diff_eq!(com, 1.0 + center + shift, epsilon = 0.05);
    }
}

#[test]
fn test_downward_drift_stays_in_bounds() {
    // Reversed drift sign flips the window formula; the merge must still
    // complete with every write inside the container.
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("down.h5");
    let ntheta = 181;
    let (rows, cols) = (16, 2);
    let data = Array3::<f32>::ones((ntheta, rows, cols));
    write_dx_file(&input, "helical", "no", -8.3, &degrees(ntheta), &data);

    let output_path = merge_file(&input, &passthrough_config(64)).unwrap().unwrap();
    let output = File::open(&output_path).unwrap();
    let merged: Array3<f32> = output.dataset("/exchange/data").unwrap().read().unwrap();
    // last shift = -4.15, ceil(|.|) = 5.
    assert_eq!(merged.dim(), (181, rows + 2 + 5, cols));
    let total: f32 = merged.iter().sum();
    assert_abs_diff_eq!(total, (ntheta * rows * cols) as f32, epsilon = 0.5);
}

#[test]
fn test_flat_correction_applies_during_merge() {
    // With flat = 1 (written by the helper) and a standard correction,
    // a half-intensity projection normalizes to 0.5 everywhere it lands.
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("norm.h5");
    let ntheta = 91;
    let (rows, cols) = (8, 2);
    let data = Array3::<f32>::from_elem((ntheta, rows, cols), 0.5);
    write_dx_file(&input, "helical", "no", 0.5, &degrees(ntheta), &data);

    let mut config = passthrough_config(32);
    config.preprocess.flat = FlatCorrection::Standard { cutoff: 1.0 };
    let output_path = merge_file(&input, &config).unwrap().unwrap();
    let output = File::open(&output_path).unwrap();
    let merged: Array3<f32> = output.dataset("/exchange/data").unwrap().read().unwrap();
    let total: f32 = merged.iter().sum();
    assert_abs_diff_eq!(
        total,
        0.5 * (ntheta * rows * cols) as f32,
        epsilon = 0.5
    );
}
