// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Batch-convert command - convert every matching file under a directory.

use std::path::PathBuf;

use clap::Args;

use crate::common::{ProgressBar, Result};
use robodata::convert::FileOutcome;
use robodata::{DataManager, FileFormat};

/// Convert every matching file under a directory.
#[derive(Args, Clone, Debug)]
pub struct BatchConvertCmd {
    /// Directory to search recursively
    #[arg(value_name = "SOURCE_DIR")]
    source_dir: PathBuf,

    /// Directory receiving the converted files
    #[arg(value_name = "TARGET_DIR")]
    target_dir: PathBuf,

    /// Source format; "auto" converts every file with a known suffix
    #[arg(long, default_value = "auto")]
    source_format: FileFormat,

    /// Target format; "auto" is detected from TARGET_DIR
    #[arg(long, default_value = "auto")]
    target_format: FileFormat,

    /// Convert files in parallel
    #[arg(long)]
    parallel: bool,

    /// Number of worker threads (implies --parallel)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
}

impl BatchConvertCmd {
    pub fn run(self, manager: DataManager) -> Result<()> {
        if self.workers == Some(0) {
            anyhow::bail!("--workers must be at least 1");
        }

        let mut config = manager.config().clone();
        if self.parallel || self.workers.is_some() {
            config.conversion.parallel = true;
        }
        if self.workers.is_some() {
            config.conversion.num_workers = self.workers;
        }
        let manager = DataManager::with_config(config);

        let planned = robodata::ConversionEngine::new(manager.registry(), manager.config())
            .plan(
                &self.source_dir,
                &self.target_dir,
                self.source_format,
                self.target_format,
            )?
            .len();
        let progress = ProgressBar::new(planned as u64, "Converting");
        let observer = |outcome: &FileOutcome| {
            let status = if outcome.is_success() { "ok" } else { "failed" };
            progress.tick(format!("{} {status}", outcome.task.source.display()));
        };

        let report = manager.batch_convert_with(
            &self.source_dir,
            &self.target_dir,
            self.source_format,
            self.target_format,
            &observer,
        )?;
        progress.finish_with_message("done".to_string());

        println!("Succeeded: {}", report.succeeded());
        println!("Failed:    {}", report.failed());
        for (task, error) in &report.failures {
            println!("  {}: {error}", task.source.display());
        }

        if !report.is_success() {
            anyhow::bail!(
                "{} of {} files failed to convert",
                report.failed(),
                report.total
            );
        }
        Ok(())
    }
}
