//! helimerge-io: HDF5 I/O and the accumulation engine for helical scan
//! merging.
//!
//! Reads DX-layout acquisition files, clones their auxiliary tree into a
//! static-scan skeleton, and drives the chunked shift-and-accumulate loop
//! that produces the merged output.
//!

mod error;
pub mod hdf5;
pub mod merge;
pub mod skeleton;

pub use error::{Error, Result};
pub use hdf5::{
    copy_tree, read_metadata, read_metadata_from, read_projection_chunk, read_reference_fields,
};
pub use merge::{merge_file, merged_path};
pub use skeleton::{make_skeleton, RESYNTHESIZED};
