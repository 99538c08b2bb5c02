//! helimerge-core: Core types and shift planning for helical scan merging.
//!
//! This crate provides the plain-data side of the merge: acquisition
//! metadata, the per-angle shift schedule with its output geometry, and
//! the configuration records threaded through the pipeline.
//!

pub mod config;
pub mod error;
pub mod metadata;
pub mod schedule;

pub use config::{FlatCorrection, MergeConfig, PreprocessConfig, ZingerRemoval};
pub use error::{Error, Result};
pub use metadata::AcquisitionMetadata;
pub use schedule::{plan_shifts, split_shift, DriftDirection, ShiftSchedule};
