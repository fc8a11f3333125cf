// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Validate command - check that a file loads and is well formed.

use std::path::PathBuf;

use clap::Args;

use crate::common::Result;
use robodata::{DataManager, FileFormat};

/// Check that a file loads and is well formed.
#[derive(Args, Clone, Debug)]
pub struct ValidateCmd {
    /// File or store to check
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Format (hdf5, zarr, rlds, lerobot, json, pickle, numpy, auto)
    #[arg(long, default_value = "auto")]
    format: FileFormat,
}

impl ValidateCmd {
    pub fn run(self, manager: &DataManager) -> Result<()> {
        let format = manager.registry().resolve(self.format, &self.path);
        if manager.validate(&self.path, format)? {
            println!("{}: valid {format}", self.path.display());
            Ok(())
        } else {
            anyhow::bail!("{}: not valid {format} data", self.path.display())
        }
    }
}
