//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error.
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// A required metadata dataset is absent from the input container.
    #[error("missing metadata dataset: {0}")]
    MissingMetadata(String),

    /// The input container does not follow the expected layout.
    #[error("invalid container layout: {0}")]
    InvalidLayout(String),

    /// Planning or kernel error from the core crate.
    #[error("core error: {0}")]
    Core(#[from] helimerge_core::Error),
}
