// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Info command - show file information.

use std::path::PathBuf;

use clap::Args;

use crate::common::{format_size, Result};
use robodata::io::{create_metadata, save_metadata};
use robodata::{DataManager, FileFormat};

/// Show file information.
#[derive(Args, Clone, Debug)]
pub struct InfoCmd {
    /// File or store to describe
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Format (hdf5, zarr, rlds, lerobot, json, pickle, numpy, auto)
    #[arg(long, default_value = "auto")]
    format: FileFormat,

    /// Print the record as JSON
    #[arg(long)]
    json: bool,

    /// Also load the data and write a metadata file describing it
    #[arg(long, value_name = "FILE")]
    metadata_out: Option<PathBuf>,
}

impl InfoCmd {
    pub fn run(self, manager: &DataManager) -> Result<()> {
        let record = manager.metadata(&self.path, self.format)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&record.to_json())?);
        } else {
            println!("=== {} ===", record.path);
            println!("Format: {}", record.format);
            if let Some(size) = record.size {
                println!("Size: {}", format_size(size));
            }
            for (key, value) in &record.details {
                match value {
                    serde_json::Value::String(s) => println!("{key}: {s}"),
                    other => println!("{key}: {other}"),
                }
            }
        }

        if let Some(out) = &self.metadata_out {
            let data = manager.load(&self.path, record.format)?;
            let metadata = create_metadata(&data, Some(&self.path));
            save_metadata(&metadata, out)?;
            if !self.json {
                println!();
                println!("Metadata written to {}", out.display());
            }
        }

        Ok(())
    }
}
