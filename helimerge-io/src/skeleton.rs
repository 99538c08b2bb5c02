//! Output container skeleton: cloned auxiliary tree plus resynthesized
//! datasets.

use crate::hdf5::copy_tree;
use crate::Result;
use hdf5::{File, Group};
use helimerge_core::ShiftSchedule;
use ndarray::{Array3, ArrayView1};

/// Dataset names resynthesized by the merge rather than cloned, excluded
/// at any depth of the tree copy.
pub const RESYNTHESIZED: [&str; 4] = ["data", "data_white", "data_dark", "theta"];

fn ensure_group(parent: &Group, name: &str) -> Result<Group> {
    match parent.group(name) {
        Ok(group) => Ok(group),
        Err(_) => Ok(parent.create_group(name)?),
    }
}

/// Builds the merged-output skeleton in `dst`.
///
/// Clones everything from `src` except the [`RESYNTHESIZED`] datasets,
/// then allocates the zero-filled output stack, the trimmed angle list,
/// and placeholder reference fields (dark zeros, flat ones: post-merge
/// data is already normalized).
///
/// # Errors
/// Returns an error when the source cannot be traversed or the
/// destination cannot be written.
pub fn make_skeleton(
    src: &File,
    dst: &File,
    schedule: &ShiftSchedule,
    columns: usize,
) -> Result<()> {
    copy_tree(src, dst, &RESYNTHESIZED)?;

    let exchange = ensure_group(dst, "exchange")?;
    // Accumulation reads unwritten regions back as the zero fill value.
    exchange
        .new_dataset::<f32>()
        .shape((schedule.ntheta_out(), schedule.final_y_size, columns))
        .create("data")?;

    let theta = exchange
        .new_dataset::<f64>()
        .shape(schedule.ntheta_out())
        .create("theta")?;
    theta.write(ArrayView1::from(schedule.final_theta.as_slice()))?;

    let reference_shape = (1, schedule.final_y_size, columns);
    let dark = exchange
        .new_dataset::<f32>()
        .shape(reference_shape)
        .create("data_dark")?;
    dark.write(Array3::<f32>::zeros(reference_shape).view())?;
    let white = exchange
        .new_dataset::<f32>()
        .shape(reference_shape)
        .create("data_white")?;
    white.write(Array3::<f32>::ones(reference_shape).view())?;

    Ok(())
}
