//! Error types for helimerge-core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for shift planning and window arithmetic.
#[derive(Error, Debug)]
pub enum Error {
    /// Too few projection angles to decide a drift direction.
    #[error("need at least 2 projection angles, got {0}")]
    TooFewAngles(usize),

    /// Angle list and data shape disagree.
    #[error("theta holds {theta} angles but data holds {projections} projections")]
    ShapeMismatch { theta: usize, projections: usize },

    /// Per-chunk shift count does not match the chunk's angle count.
    #[error("chunk holds {angles} projections but {shifts} shifts were supplied")]
    ChunkMismatch { angles: usize, shifts: usize },

    /// A destination row window escapes the output container.
    ///
    /// This is a planning bug, never a condition to clamp away: a clamped
    /// write would corrupt the output without any signal.
    #[error(
        "row window {start}..{end} for projection {projection} escapes output of {y_size} rows"
    )]
    Geometry {
        projection: usize,
        start: i64,
        end: i64,
        y_size: usize,
    },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}
