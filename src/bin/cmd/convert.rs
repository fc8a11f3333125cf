// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Convert command - convert one file or store between formats.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;

use crate::common::{format_size, Result};
use robodata::io::metadata::path_size;
use robodata::{DataManager, FileFormat};

/// Convert one file or store.
#[derive(Args, Clone, Debug)]
pub struct ConvertCmd {
    /// Source file or store
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Target file or store
    #[arg(value_name = "TARGET")]
    target: PathBuf,

    /// Source format (hdf5, zarr, rlds, lerobot, json, pickle, numpy, auto)
    #[arg(long, default_value = "auto")]
    source_format: FileFormat,

    /// Target format (hdf5, zarr, rlds, lerobot, json, pickle, numpy, auto)
    #[arg(long, default_value = "auto")]
    target_format: FileFormat,
}

impl ConvertCmd {
    pub fn run(self, manager: &DataManager) -> Result<()> {
        let start = Instant::now();
        let task = manager.convert(
            &self.source,
            &self.target,
            self.source_format,
            self.target_format,
        )?;

        println!("Converted {} -> {}", task.source_format, task.target_format);
        println!("  Source: {}", task.source.display());
        println!("  Target: {}", task.target.display());
        if let Some(size) = path_size(&task.target) {
            println!("  Size:   {}", format_size(size));
        }
        println!("  Time:   {:.2?}", start.elapsed());
        Ok(())
    }
}
