// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Robodata CLI
//!
//! Command-line tool for converting, validating and describing robot
//! episode data.
//!
//! ## Usage
//!
//! ```sh
//! # Convert one file (formats detected from the suffix)
//! robodata convert episode_0.zarr episode_0.json
//!
//! # Convert a directory tree in parallel
//! robodata batch-convert raw/ converted/ --source-format zarr --target-format numpy --parallel
//!
//! # Check that a file loads
//! robodata validate dataset.tfrecord --format rlds
//!
//! # Show file information
//! robodata info episode_0.h5 --json
//! ```

mod cmd;
mod common;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use cmd::{BatchConvertCmd, ConvertCmd, InfoCmd, ValidateCmd};
use common::Result;
use robodata::{DataManager, RdmConfig};

/// Robodata - Robot episode data toolkit
///
/// Convert between HDF5, Zarr, RLDS, LeRobot, JSON, pickle and NumPy.
/// Formats are detected from the path suffix unless given explicitly.
#[derive(Parser, Clone)]
#[command(name = "robodata")]
#[command(about = "Robot episode data conversion toolkit", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Configuration file (TOML or JSON) merged over the defaults
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "robodata=trace"
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Convert one file or store
    Convert(ConvertCmd),

    /// Convert every matching file under a directory
    BatchConvert(BatchConvertCmd),

    /// Check that a file loads and is well formed
    Validate(ValidateCmd),

    /// Show file information
    Info(InfoCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RdmConfig::from_file(path)?,
        None => RdmConfig::default(),
    };
    common::init_logging(&config.logging, cli.log_level.as_deref())?;
    let manager = DataManager::with_config(config);

    match cli.command {
        Commands::Convert(cmd) => cmd.run(&manager),
        Commands::BatchConvert(cmd) => cmd.run(manager),
        Commands::Validate(cmd) => cmd.run(&manager),
        Commands::Info(cmd) => cmd.run(&manager),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
