//!
//! This binary merges helical tomography scans into static-scan files.
#![allow(
    clippy::uninlined_format_args,
    clippy::too_many_lines,
    clippy::struct_excessive_bools
)]

use clap::{Parser, Subcommand, ValueEnum};

use helimerge_core::{
    plan_shifts, DriftDirection, FlatCorrection, MergeConfig, PreprocessConfig, ZingerRemoval,
};
use helimerge_io::{merge_file, read_metadata_from};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    HelimergeIo(#[from] helimerge_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] helimerge_core::Error),
}

/// Flat-field correction selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FlatCorrectionArg {
    /// Normalize with averaged flat/dark fields
    Standard,
    /// Normalize against air columns at the sinogram edges
    Air,
    /// Skip normalization
    None,
}

/// Zinger removal selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ZingerRemovalArg {
    /// Leave outlier pixels in place
    None,
    /// Median-filter based outlier replacement
    Standard,
}

/// Helical-to-static tomography scan merger.
#[derive(Parser)]
#[command(name = "helimerge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge helical scan file(s) into static-scan equivalents
    Merge {
        /// Input HDF5 file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Number of projection angles to process at one time
        #[arg(long, default_value = "32")]
        proj_chunk_size: usize,

        /// Number of rows to pad when doing sub-pixel shifts
        #[arg(long, default_value = "1")]
        subpixel_pad: usize,

        /// Flat-field correction method
        #[arg(long, value_enum, default_value = "standard")]
        flat_correction_method: FlatCorrectionArg,

        /// Cut-off for the normalized quotient
        #[arg(long, default_value = "1.0")]
        normalization_cutoff: f32,

        /// Background columns at each sinogram edge for air normalization
        #[arg(long, default_value = "10")]
        air: usize,

        /// Convert transmission to pathlength with -ln(data)
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        minus_log: bool,

        /// Zinger removal method
        #[arg(long, value_enum, default_value = "none")]
        zinger_removal_method: ZingerRemovalArg,

        /// Zinger replacement threshold for projections
        #[arg(long, default_value = "800.0")]
        zinger_level_projections: f32,

        /// Zinger replacement threshold for flat fields
        #[arg(long, default_value = "1000.0")]
        zinger_level_white: f32,

        /// Zinger median filter window in pixels
        #[arg(long, default_value = "3")]
        zinger_size: usize,

        /// Replace NaN and inf values after normalization
        #[arg(long)]
        fix_nan_and_inf: bool,

        /// Replacement value for NaN and +inf
        #[arg(long, default_value = "6.0")]
        fix_nan_and_inf_value: f32,

        /// Cap for sinogram values
        #[arg(long, default_value = "1e16")]
        sinogram_max_value: f32,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show acquisition information for an HDF5 file
    Info {
        /// Input HDF5 file
        input: PathBuf,

        /// Pad assumed when reporting the planned output geometry
        #[arg(long, default_value = "1")]
        subpixel_pad: usize,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Merge {
            input,
            proj_chunk_size,
            subpixel_pad,
            flat_correction_method,
            normalization_cutoff,
            air,
            minus_log,
            zinger_removal_method,
            zinger_level_projections,
            zinger_level_white,
            zinger_size,
            fix_nan_and_inf,
            fix_nan_and_inf_value,
            sinogram_max_value,
            verbose,
        } => {
            init_logging(verbose);

            let flat = match flat_correction_method {
                FlatCorrectionArg::Standard => FlatCorrection::Standard {
                    cutoff: normalization_cutoff,
                },
                FlatCorrectionArg::Air => FlatCorrection::Air { air },
                FlatCorrectionArg::None => FlatCorrection::None,
            };
            let zinger = match zinger_removal_method {
                ZingerRemovalArg::Standard => ZingerRemoval::Standard {
                    level_projections: zinger_level_projections,
                    level_white: zinger_level_white,
                    size: zinger_size,
                },
                ZingerRemovalArg::None => ZingerRemoval::None,
            };
            let config = MergeConfig {
                proj_chunk_size,
                subpixel_pad,
                preprocess: PreprocessConfig {
                    zinger,
                    flat,
                    minus_log,
                    fix_nan_and_inf: fix_nan_and_inf.then_some(fix_nan_and_inf_value),
                    sinogram_max_value,
                },
            };

            if verbose {
                eprintln!("Processing {} file(s)...", input.len());
                eprintln!("Chunk size: {} projections", proj_chunk_size);
                eprintln!("Sub-pixel pad: {} rows", subpixel_pad);
            }

            let start = Instant::now();
            let mut merged = 0usize;
            let mut skipped = 0usize;

            for path in &input {
                if verbose {
                    eprintln!("Reading: {}", path.display());
                }
                match merge_file(path, &config)? {
                    Some(output) => {
                        merged += 1;
                        println!("{} -> {}", path.display(), output.display());
                    }
                    None => {
                        skipped += 1;
                        println!("{}: not a helical scan, skipped", path.display());
                    }
                }
            }

            let elapsed = start.elapsed();
            println!(
                "Merged {} file(s), skipped {} in {:.2}s",
                merged,
                skipped,
                elapsed.as_secs_f64()
            );
        }

        Commands::Info {
            input,
            subpixel_pad,
        } => {
            init_logging(false);
            let metadata = read_metadata_from(&input)?;
            let (projections, rows, columns) = metadata.data_shape;

            println!("File: {}", input.display());
            println!("Scan type: {}", metadata.scan_type);
            println!("Data shape: {} x {} x {}", projections, rows, columns);
            if let (Some(first), Some(last)) = (metadata.theta.first(), metadata.theta.last()) {
                println!(
                    "Theta range: {:.3} - {:.3} deg over {} angles",
                    first,
                    last,
                    metadata.theta.len()
                );
            }
            println!("Pixels per 360 deg: {}", metadata.pixels_per_360deg);
            println!("Flip/stitch: {}", metadata.flip_stitch);

            if let Some(schedule) = plan_shifts(&metadata, subpixel_pad)? {
                let direction = match schedule.drift_direction() {
                    DriftDirection::Up => "up",
                    DriftDirection::Down => "down",
                };
                println!("Stage drift: {}", direction);
                println!("Output angles: {}", schedule.ntheta_out());
                println!(
                    "Output rows (pad {}): {}",
                    subpixel_pad, schedule.final_y_size
                );
            } else {
                println!("Not a helical scan; nothing to merge");
            }
        }
    }

    Ok(())
}
