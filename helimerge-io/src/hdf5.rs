//! HDF5 access for DX-layout acquisition files.
//!
//! Covers the read side (acquisition metadata, angular slabs of the
//! projection stack, reference fields) and the recursive tree clone used
//! to build the output skeleton.

use crate::{Error, Result};
use hdf5::types::{FloatSize, H5Type, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, Dataset, File, Group, Location};
use helimerge_core::AcquisitionMetadata;
use ndarray::{s, Array3, ArrayD, Ix3, IxDyn};

/// Scan type flag, element 0.
pub const SCAN_TYPE_PATH: &str = "/process/acquisition/scan_type";
/// Vertical drift in pixels per rotation, element 0.
pub const PIXELS_PER_360_PATH: &str = "/process/acquisition/pixels_y_per_360_deg";
/// Flip-and-stitch flag, element 0.
pub const FLIP_STITCH_PATH: &str = "/process/acquisition/flip_stitch";
/// Projection angles in degrees.
pub const THETA_PATH: &str = "/exchange/theta";
/// Projection stack (angle, row, column).
pub const DATA_PATH: &str = "/exchange/data";
/// Flat field frames.
pub const WHITE_PATH: &str = "/exchange/data_white";
/// Dark field frames.
pub const DARK_PATH: &str = "/exchange/data_dark";

fn require_dataset(file: &File, path: &str) -> Result<Dataset> {
    file.dataset(path)
        .map_err(|_| Error::MissingMetadata(path.to_string()))
}

/// Reads the first element of a string dataset, accepting variable-length
/// UTF-8 or ASCII storage.
fn read_string_element(file: &File, path: &str) -> Result<String> {
    let dataset = require_dataset(file, path)?;
    if let Ok(values) = dataset.read_raw::<VarLenUnicode>() {
        if let Some(value) = values.first() {
            return Ok(value.to_string());
        }
    }
    if let Ok(values) = dataset.read_raw::<VarLenAscii>() {
        if let Some(value) = values.first() {
            return Ok(value.to_string());
        }
    }
    Err(Error::InvalidLayout(format!(
        "{path} is not a readable string dataset"
    )))
}

fn read_scalar_f64(file: &File, path: &str) -> Result<f64> {
    let dataset = require_dataset(file, path)?;
    dataset
        .read_raw::<f64>()?
        .first()
        .copied()
        .ok_or_else(|| Error::InvalidLayout(format!("{path} is empty")))
}

/// Reads the acquisition metadata record from a DX-layout file.
///
/// # Errors
/// Returns [`Error::MissingMetadata`] when a required dataset is absent
/// and [`Error::InvalidLayout`] when the data stack is not 3-D.
pub fn read_metadata(file: &File) -> Result<AcquisitionMetadata> {
    let scan_type = read_string_element(file, SCAN_TYPE_PATH)?;
    let pixels_per_360deg = read_scalar_f64(file, PIXELS_PER_360_PATH)?;
    let flip_stitch = read_string_element(file, FLIP_STITCH_PATH)?;
    let theta = require_dataset(file, THETA_PATH)?.read_raw::<f64>()?;
    let shape = require_dataset(file, DATA_PATH)?.shape();
    if shape.len() != 3 {
        return Err(Error::InvalidLayout(format!(
            "{DATA_PATH} must be 3-D, got {} axes",
            shape.len()
        )));
    }
    Ok(AcquisitionMetadata {
        scan_type,
        pixels_per_360deg,
        theta,
        flip_stitch,
        data_shape: (shape[0], shape[1], shape[2]),
    })
}

/// Opens a DX-layout file and reads its acquisition metadata record.
///
/// # Errors
/// Returns an error when the file cannot be opened or the metadata is
/// missing or malformed.
pub fn read_metadata_from<P: AsRef<std::path::Path>>(path: P) -> Result<AcquisitionMetadata> {
    let file = File::open(path)?;
    read_metadata(&file)
}

/// Reads the angular slab `[start, end)` of the projection stack as f32.
///
/// # Errors
/// Returns an error when the dataset is absent or the read fails.
pub fn read_projection_chunk(file: &File, start: usize, end: usize) -> Result<Array3<f32>> {
    let dataset = require_dataset(file, DATA_PATH)?;
    Ok(dataset.read_slice::<f32, _, Ix3>(s![start..end, .., ..])?)
}

/// Reads the full flat and dark field stacks as f32.
///
/// # Errors
/// Returns an error when either dataset is absent or the read fails.
pub fn read_reference_fields(file: &File) -> Result<(Array3<f32>, Array3<f32>)> {
    let flat: Array3<f32> = require_dataset(file, WHITE_PATH)?.read()?;
    let dark: Array3<f32> = require_dataset(file, DARK_PATH)?.read()?;
    Ok((flat, dark))
}

/// Recursively clones groups, datasets and attributes from `src` into
/// `dst`, skipping members whose name appears in `exclude` at any depth.
///
/// Objects failing the attribute capability probe are still cloned; the
/// unreadable attributes (and datasets of element types the clone cannot
/// express) are reported through `log::warn!` and skipped. Loss is never
/// silent and never an error.
///
/// # Errors
/// Returns an error when the destination cannot be written.
pub fn copy_tree(src: &Group, dst: &Group, exclude: &[&str]) -> Result<()> {
    for name in src.member_names()? {
        if exclude.contains(&name.as_str()) {
            continue;
        }
        if let Ok(child) = src.group(&name) {
            let target = dst.create_group(&name)?;
            clone_attributes(&child, &target);
            copy_tree(&child, &target, exclude)?;
            log::debug!("copied group {name}");
        } else if let Ok(dataset) = src.dataset(&name) {
            clone_dataset(&dataset, dst, &name)?;
        } else {
            log::warn!("skipping {name}: neither group nor dataset");
        }
    }
    Ok(())
}

/// Capability probe: can every attribute of this object be opened?
fn attributes_readable(object: &Location) -> bool {
    match object.attr_names() {
        Ok(names) => names.iter().all(|name| object.attr(name).is_ok()),
        Err(_) => false,
    }
}

fn clone_attributes(src: &Location, dst: &Location) {
    if !attributes_readable(src) {
        log::warn!(
            "attributes of {} are unreadable, object copied without them",
            src.name()
        );
        return;
    }
    let Ok(names) = src.attr_names() else {
        return;
    };
    for name in names {
        if let Err(err) = clone_attribute(src, dst, &name) {
            log::warn!("attribute {name} of {} not cloned: {err}", src.name());
        }
    }
}

fn clone_attribute(src: &Location, dst: &Location, name: &str) -> Result<()> {
    let attr = src.attr(name)?;
    let descriptor = attr.dtype()?.to_descriptor()?;
    match descriptor {
        TypeDescriptor::Integer(IntSize::U1) => copy_attr_values::<i8>(&attr, dst, name),
        TypeDescriptor::Integer(IntSize::U2) => copy_attr_values::<i16>(&attr, dst, name),
        TypeDescriptor::Integer(IntSize::U4) => copy_attr_values::<i32>(&attr, dst, name),
        TypeDescriptor::Integer(IntSize::U8) => copy_attr_values::<i64>(&attr, dst, name),
        TypeDescriptor::Unsigned(IntSize::U1) => copy_attr_values::<u8>(&attr, dst, name),
        TypeDescriptor::Unsigned(IntSize::U2) => copy_attr_values::<u16>(&attr, dst, name),
        TypeDescriptor::Unsigned(IntSize::U4) => copy_attr_values::<u32>(&attr, dst, name),
        TypeDescriptor::Unsigned(IntSize::U8) => copy_attr_values::<u64>(&attr, dst, name),
        TypeDescriptor::Float(FloatSize::U4) => copy_attr_values::<f32>(&attr, dst, name),
        TypeDescriptor::Float(FloatSize::U8) => copy_attr_values::<f64>(&attr, dst, name),
        TypeDescriptor::Boolean => copy_attr_values::<bool>(&attr, dst, name),
        TypeDescriptor::VarLenUnicode => copy_attr_values::<VarLenUnicode>(&attr, dst, name),
        TypeDescriptor::VarLenAscii => copy_attr_values::<VarLenAscii>(&attr, dst, name),
        other => Err(Error::InvalidLayout(format!(
            "unsupported attribute type {other:?}"
        ))),
    }
}

fn copy_attr_values<T: H5Type + Clone>(attr: &Attribute, dst: &Location, name: &str) -> Result<()> {
    let shape = attr.shape();
    if shape.is_empty() {
        let value = attr.read_scalar::<T>()?;
        dst.new_attr::<T>().create(name)?.write_scalar(&value)?;
    } else {
        let values = attr.read_raw::<T>()?;
        let array = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| Error::InvalidLayout(format!("attribute {name} shape mismatch: {e}")))?;
        let target = dst.new_attr::<T>().shape(shape).create(name)?;
        target.write(array.view())?;
    }
    Ok(())
}

fn clone_dataset(src: &Dataset, dst: &Group, name: &str) -> Result<()> {
    let descriptor = src.dtype()?.to_descriptor()?;
    let target = match descriptor {
        TypeDescriptor::Integer(IntSize::U1) => copy_dataset_values::<i8>(src, dst, name)?,
        TypeDescriptor::Integer(IntSize::U2) => copy_dataset_values::<i16>(src, dst, name)?,
        TypeDescriptor::Integer(IntSize::U4) => copy_dataset_values::<i32>(src, dst, name)?,
        TypeDescriptor::Integer(IntSize::U8) => copy_dataset_values::<i64>(src, dst, name)?,
        TypeDescriptor::Unsigned(IntSize::U1) => copy_dataset_values::<u8>(src, dst, name)?,
        TypeDescriptor::Unsigned(IntSize::U2) => copy_dataset_values::<u16>(src, dst, name)?,
        TypeDescriptor::Unsigned(IntSize::U4) => copy_dataset_values::<u32>(src, dst, name)?,
        TypeDescriptor::Unsigned(IntSize::U8) => copy_dataset_values::<u64>(src, dst, name)?,
        TypeDescriptor::Float(FloatSize::U4) => copy_dataset_values::<f32>(src, dst, name)?,
        TypeDescriptor::Float(FloatSize::U8) => copy_dataset_values::<f64>(src, dst, name)?,
        TypeDescriptor::Boolean => copy_dataset_values::<bool>(src, dst, name)?,
        TypeDescriptor::VarLenUnicode => copy_dataset_values::<VarLenUnicode>(src, dst, name)?,
        TypeDescriptor::VarLenAscii => copy_dataset_values::<VarLenAscii>(src, dst, name)?,
        other => {
            log::warn!("dataset {name} has unsupported element type {other:?}, skipped");
            return Ok(());
        }
    };
    clone_attributes(src, &target);
    log::debug!("copied dataset {name}");
    Ok(())
}

fn copy_dataset_values<T: H5Type>(src: &Dataset, dst: &Group, name: &str) -> Result<Dataset> {
    let shape = src.shape();
    let values = src.read_raw::<T>()?;
    let array = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| Error::InvalidLayout(format!("dataset {name} shape mismatch: {e}")))?;
    let target = dst.new_dataset::<T>().shape(shape).create(name)?;
    target.write(array.view())?;
    Ok(target)
}
