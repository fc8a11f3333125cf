// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Conversion engine.
//!
//! A conversion opens the source codec for reading and the target codec for
//! writing, loads the source, applies the converter bound to the pair (if
//! any) and saves. Batch conversion plans one task per matching entry under
//! a source directory and runs every task, recording failures instead of
//! stopping at the first one. When two sources map to the same target, the
//! later one is recorded as a failure and never written.

use std::collections::hash_map::{Entry, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::config::RdmConfig;
use crate::core::{DataError, FormatRegistry, Result};
use crate::io::detection::{lookup_extension, matches_format};
use crate::io::traits::AccessMode;
use crate::FileFormat;

/// One source to target conversion, with both formats resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    /// Source path
    pub source: PathBuf,
    /// Source format
    pub source_format: FileFormat,
    /// Target path
    pub target: PathBuf,
    /// Target format
    pub target_format: FileFormat,
}

impl fmt::Display for ConversionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) -> {} ({})",
            self.source.display(),
            self.source_format,
            self.target.display(),
            self.target_format
        )
    }
}

/// Result of one file in a batch.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// The conversion that ran
    pub task: ConversionTask,
    /// The error, if it failed
    pub error: Option<DataError>,
}

impl FileOutcome {
    /// Check if the file converted.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a batch conversion.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Number of planned tasks
    pub total: usize,
    /// Tasks that converted
    pub converted: Vec<ConversionTask>,
    /// Tasks that failed, with their errors
    pub failures: Vec<(ConversionTask, DataError)>,
}

impl BatchReport {
    /// Number of converted files.
    pub fn succeeded(&self) -> usize {
        self.converted.len()
    }

    /// Number of failed files.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Check if every file converted.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome.error {
            None => self.converted.push(outcome.task),
            Some(e) => self.failures.push((outcome.task, e)),
        }
    }
}

/// Runs conversions against a registry and configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConversionEngine<'a> {
    registry: &'a FormatRegistry,
    config: &'a RdmConfig,
}

impl<'a> ConversionEngine<'a> {
    pub fn new(registry: &'a FormatRegistry, config: &'a RdmConfig) -> Self {
        Self { registry, config }
    }

    /// Convert one file or store.
    ///
    /// `Auto` formats are resolved from their own path. The first error is
    /// returned unchanged.
    pub fn convert(
        &self,
        source: &Path,
        target: &Path,
        source_format: FileFormat,
        target_format: FileFormat,
    ) -> Result<ConversionTask> {
        let task = ConversionTask {
            source: source.to_path_buf(),
            source_format: self.registry.resolve(source_format, source),
            target: target.to_path_buf(),
            target_format: self.registry.resolve(target_format, target),
        };
        self.run(&task)?;
        Ok(task)
    }

    fn run(&self, task: &ConversionTask) -> Result<()> {
        let start = Instant::now();

        // Both bindings must exist before either path is touched
        let source_loader = self.registry.loader(task.source_format)?;
        let target_loader = self.registry.loader(task.target_format)?;
        let reader = source_loader.create(&task.source, AccessMode::Read, self.config)?;
        let writer = target_loader.create(&task.target, AccessMode::Write, self.config)?;

        let mut data = reader.load()?;
        if let Some(converter) = self
            .registry
            .converter(task.source_format, task.target_format)
        {
            data = converter.convert(data)?;
        }
        writer.save(&data, None)?;

        tracing::info!(
            source = %task.source.display(),
            target = %task.target.display(),
            from = %task.source_format,
            to = %task.target_format,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Converted"
        );
        Ok(())
    }

    /// Convert every matching entry under `source_dir` into `target_dir`.
    pub fn batch_convert(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        source_format: FileFormat,
        target_format: FileFormat,
    ) -> Result<BatchReport> {
        self.batch_convert_with(source_dir, target_dir, source_format, target_format, &|_| {})
    }

    /// Like [`batch_convert`](Self::batch_convert), calling `observer` after
    /// each file.
    ///
    /// Only a missing source directory or an unusable worker pool fails the
    /// call; per-file errors are logged and recorded in the report.
    pub fn batch_convert_with(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        source_format: FileFormat,
        target_format: FileFormat,
        observer: &(dyn Fn(&FileOutcome) + Sync),
    ) -> Result<BatchReport> {
        let tasks = self.plan(source_dir, target_dir, source_format, target_format)?;
        let claimed_by = target_collisions(&tasks);
        let start = Instant::now();

        let run_one = |task: &ConversionTask, earlier: Option<&Path>| {
            let result = match earlier {
                Some(first) => Err(DataError::persistence(
                    task.target_format,
                    &task.target,
                    format!("target is also produced from '{}'", first.display()),
                )),
                None => self.run(task),
            };
            let outcome = FileOutcome {
                task: task.clone(),
                error: result.err(),
            };
            if let Some(e) = &outcome.error {
                let details: Vec<String> = e
                    .log_fields()
                    .into_iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect();
                tracing::error!(
                    source = %task.source.display(),
                    target = %task.target.display(),
                    kind = ?e.kind(),
                    details = %details.join(" "),
                    "Conversion failed"
                );
            }
            observer(&outcome);
            outcome
        };

        let outcomes: Vec<FileOutcome> = if self.config.conversion.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.conversion.num_workers.unwrap_or(0))
                .thread_name(|index| format!("robodata-worker-{}", index))
                .build()
                .map_err(|e| {
                    DataError::config(
                        "conversion.num_workers",
                        format!("Failed to create thread pool: {e}"),
                    )
                })?;
            pool.install(|| {
                tasks
                    .par_iter()
                    .zip(claimed_by.par_iter())
                    .map(|(task, earlier)| run_one(task, earlier.as_deref()))
                    .collect()
            })
        } else {
            tasks
                .iter()
                .zip(&claimed_by)
                .map(|(task, earlier)| run_one(task, earlier.as_deref()))
                .collect()
        };

        let mut report = BatchReport {
            total: tasks.len(),
            ..BatchReport::default()
        };
        for outcome in outcomes {
            report.record(outcome);
        }

        tracing::info!(
            source_dir = %source_dir.display(),
            target_dir = %target_dir.display(),
            total = report.total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch conversion finished"
        );
        Ok(report)
    }

    /// Plan the tasks of a batch, sorted by source path.
    pub fn plan(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        source_format: FileFormat,
        target_format: FileFormat,
    ) -> Result<Vec<ConversionTask>> {
        if !source_dir.exists() {
            return Err(DataError::path_not_found(source_dir));
        }
        let target_format = self.registry.resolve(target_format, target_dir);

        let mut tasks = Vec::new();
        let mut walker = walkdir::WalkDir::new(source_dir).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();

            let format = if source_format.is_auto() {
                lookup_extension(path)
            } else {
                matches_format(path, source_format).then_some(source_format)
            };
            let Some(format) = format else {
                continue;
            };

            let is_dir = entry.file_type().is_dir();
            match (format, is_dir) {
                // Zarr stores are directories; take the store, not its contents
                (FileFormat::Zarr, true) => walker.skip_current_dir(),
                (FileFormat::Zarr, false) | (_, true) => continue,
                _ => {}
            }

            let relative = path.strip_prefix(source_dir).unwrap_or(path);
            tasks.push(ConversionTask {
                source: path.to_path_buf(),
                source_format: format,
                target: target_dir
                    .join(relative)
                    .with_extension(target_format.canonical_extension()),
                target_format,
            });
        }

        tasks.sort_by(|a, b| a.source.cmp(&b.source));
        tracing::debug!(tasks = tasks.len(), source_dir = %source_dir.display(), "Planned batch");
        Ok(tasks)
    }
}

/// For each task, the source of an earlier task with the same target.
///
/// `a.npy` and `a.npz` both map to `a.<ext>`; only the first one in plan
/// order converts.
fn target_collisions(tasks: &[ConversionTask]) -> Vec<Option<PathBuf>> {
    let mut claimed: HashMap<&Path, &Path> = HashMap::new();
    tasks
        .iter()
        .map(|task| match claimed.entry(task.target.as_path()) {
            Entry::Occupied(first) => Some(first.get().to_path_buf()),
            Entry::Vacant(slot) => {
                slot.insert(task.source.as_path());
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Group, NdArray, Value};
    use crate::io::traits::FormatCodec;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "robodata_test_engine_{}_{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn episode() -> Group {
        let mut g = Group::new();
        g.insert("actions".into(), Value::Array(NdArray::vector(vec![1.0f64, 2.0])));
        g.insert("episode_length".into(), Value::Int(2));
        g
    }

    fn save(registry: &FormatRegistry, path: &Path, format: FileFormat) {
        registry
            .open(path, format, AccessMode::Write, &RdmConfig::default())
            .unwrap()
            .save(&episode(), None)
            .unwrap();
    }

    #[test]
    fn test_convert_resolves_auto() {
        let dir = temp_dir("auto");
        let registry = FormatRegistry::with_builtin_loaders();
        let config = RdmConfig::default();
        save(&registry, &dir.join("in.json"), FileFormat::Json);

        let engine = ConversionEngine::new(&registry, &config);
        let task = engine
            .convert(&dir.join("in.json"), &dir.join("out.pkl"), FileFormat::Auto, FileFormat::Auto)
            .unwrap();
        assert_eq!(task.source_format, FileFormat::Json);
        assert_eq!(task.target_format, FileFormat::Pickle);

        let loaded = registry
            .open(&task.target, FileFormat::Pickle, AccessMode::Read, &config)
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(loaded, episode());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_convert_missing_source() {
        let registry = FormatRegistry::with_builtin_loaders();
        let config = RdmConfig::default();
        let err = ConversionEngine::new(&registry, &config)
            .convert(
                Path::new("/nonexistent/robodata/in.json"),
                Path::new("/tmp/out.json"),
                FileFormat::Auto,
                FileFormat::Auto,
            )
            .unwrap_err();
        assert!(matches!(err, DataError::PathNotFound { .. }));
    }

    #[test]
    fn test_unbound_target_fails_before_source_io() {
        let mut registry = FormatRegistry::new();
        registry.register_loader(
            FileFormat::Json,
            |path: &Path, mode: AccessMode, config: &RdmConfig| -> Result<Box<dyn FormatCodec>> {
                Ok(Box::new(crate::io::Codec::open(FileFormat::Json, path, mode, config)?))
            },
        );
        let config = RdmConfig::default();

        // The source does not exist, but the missing pickle binding wins
        let err = ConversionEngine::new(&registry, &config)
            .convert(
                Path::new("/nonexistent/robodata/in.json"),
                Path::new("/nonexistent/robodata/out.pkl"),
                FileFormat::Auto,
                FileFormat::Auto,
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::UnregisteredFormat);
        assert_eq!(err.to_string(), "No loader registered for format: pickle");
    }

    #[test]
    fn test_batch_reports_target_collisions() {
        let dir = temp_dir("collide");
        let src = dir.join("src");
        let registry = FormatRegistry::with_builtin_loaders();
        let config = RdmConfig::default();

        let mut single = Group::new();
        single.insert("data".into(), Value::Array(NdArray::vector(vec![1i64, 2, 3])));
        registry
            .open(&src.join("a.npy"), FileFormat::Numpy, AccessMode::Write, &config)
            .unwrap()
            .save(&single, None)
            .unwrap();
        save(&registry, &src.join("a.npz"), FileFormat::Numpy);

        let report = ConversionEngine::new(&registry, &config)
            .batch_convert(&src, &dir.join("out"), FileFormat::Numpy, FileFormat::Json)
            .unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.converted[0].source, src.join("a.npy"));

        let (task, err) = &report.failures[0];
        assert_eq!(task.source, src.join("a.npz"));
        assert_eq!(task.target, dir.join("out").join("a.json"));
        assert_eq!(err.kind(), crate::core::ErrorKind::Persistence);
        assert!(err.to_string().contains("a.npy"));

        // The first source's data is what lands in the target
        let loaded = registry
            .open(&task.target, FileFormat::Json, AccessMode::Read, &config)
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(loaded, single);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_plan_selects_and_renames() {
        let dir = temp_dir("plan");
        let src = dir.join("src");
        let registry = FormatRegistry::with_builtin_loaders();
        let config = RdmConfig::default();

        save(&registry, &src.join("b.json"), FileFormat::Json);
        save(&registry, &src.join("nested").join("a.json"), FileFormat::Json);
        save(&registry, &src.join("store.zarr"), FileFormat::Zarr);
        std::fs::write(src.join("notes.txt"), "skip me").unwrap();

        let engine = ConversionEngine::new(&registry, &config);
        let tasks = engine
            .plan(&src, &dir.join("out"), FileFormat::Json, FileFormat::Pickle)
            .unwrap();
        let targets: Vec<PathBuf> = tasks.iter().map(|t| t.target.clone()).collect();
        assert_eq!(
            targets,
            vec![dir.join("out").join("b.pkl"), dir.join("out").join("nested").join("a.pkl")]
        );

        // Auto picks up every known suffix, and Zarr stores are not descended into
        let tasks = engine
            .plan(&src, &dir.join("out.zarr"), FileFormat::Auto, FileFormat::Auto)
            .unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.target_format == FileFormat::Zarr));
        assert!(tasks.iter().any(|t| t.source_format == FileFormat::Zarr));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = temp_dir("batch");
        let src = dir.join("src");
        let registry = FormatRegistry::with_builtin_loaders();
        let config = RdmConfig::default();

        save(&registry, &src.join("good.json"), FileFormat::Json);
        std::fs::write(src.join("bad.json"), "{ not json").unwrap();

        let seen = std::sync::Mutex::new(0usize);
        let report = ConversionEngine::new(&registry, &config)
            .batch_convert_with(&src, &dir.join("out"), FileFormat::Json, FileFormat::Pickle, &|_| {
                *seen.lock().unwrap() += 1;
            })
            .unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert!(report.failures[0].1.is_validation());
        assert_eq!(*seen.lock().unwrap(), 2);
        assert!(dir.join("out").join("good.pkl").exists());
        assert!(!dir.join("out").join("bad.pkl").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_parallel_batch() {
        let dir = temp_dir("parallel");
        let src = dir.join("src");
        let registry = FormatRegistry::with_builtin_loaders();
        let mut config = RdmConfig::default();
        config.conversion.parallel = true;
        config.conversion.num_workers = Some(2);

        for i in 0..4 {
            save(&registry, &src.join(format!("ep_{i}.json")), FileFormat::Json);
        }

        let report = ConversionEngine::new(&registry, &config)
            .batch_convert(&src, &dir.join("out"), FileFormat::Json, FileFormat::Zarr)
            .unwrap();
        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.converted[0].source, src.join("ep_0.json"));
        assert!(dir.join("out").join("ep_3.zarr").join(".zgroup").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_batch_missing_source_dir() {
        let registry = FormatRegistry::with_builtin_loaders();
        let config = RdmConfig::default();
        let err = ConversionEngine::new(&registry, &config)
            .batch_convert(
                Path::new("/nonexistent/robodata"),
                Path::new("/tmp/out"),
                FileFormat::Auto,
                FileFormat::Json,
            )
            .unwrap_err();
        assert!(matches!(err, DataError::PathNotFound { .. }));
    }
}
