//! helimerge-algorithms: Numeric kernels for helical scan merging.
//!
//! Provides the frequency-domain sub-pixel shift and the projection
//! preprocessing pipeline, both operating on `ndarray` volumes shaped
//! (angle, row, column).
//!

pub mod prep;
pub mod shift;

pub use prep::preprocess;
pub use shift::apply_shift_subpixel;
