// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Unified facade over the registry, codecs and conversion engine.
//!
//! # Example
//!
//! ```rust,no_run
//! use robodata::{DataManager, FileFormat};
//!
//! let manager = DataManager::new();
//! let data = manager.load("episode_0.zarr", FileFormat::Auto)?;
//! manager.save(&data, "episode_0.json", FileFormat::Auto)?;
//! # Ok::<(), robodata::DataError>(())
//! ```

use std::path::Path;

use crate::config::RdmConfig;
use crate::convert::{BatchReport, ConversionEngine, ConversionTask, FileOutcome};
use crate::core::{ConverterFactory, FormatRegistry, Group, LoaderFactory, Result};
use crate::io::metadata::MetadataRecord;
use crate::io::traits::{AccessMode, FormatCodec};
use crate::FileFormat;

/// Loads, saves, validates and converts robot episode data.
#[derive(Debug, Clone)]
pub struct DataManager {
    registry: FormatRegistry,
    config: RdmConfig,
}

impl Default for DataManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DataManager {
    /// Create a manager with the built-in formats and default configuration.
    pub fn new() -> Self {
        Self::with_config(RdmConfig::default())
    }

    /// Create a manager with the built-in formats and `config`.
    pub fn with_config(config: RdmConfig) -> Self {
        Self {
            registry: FormatRegistry::with_builtin_loaders(),
            config,
        }
    }

    /// Detect a format from the path suffix.
    pub fn detect<P: AsRef<Path>>(&self, path: P) -> FileFormat {
        self.registry.detect(path.as_ref())
    }

    /// Load a file or store.
    pub fn load<P: AsRef<Path>>(&self, path: P, format: FileFormat) -> Result<Group> {
        self.registry
            .open(path.as_ref(), format, AccessMode::Read, &self.config)?
            .load()
    }

    /// Save a value, creating intermediate directories.
    pub fn save<P: AsRef<Path>>(&self, data: &Group, path: P, format: FileFormat) -> Result<()> {
        self.registry
            .open(path.as_ref(), format, AccessMode::Write, &self.config)?
            .save(data, None)
    }

    /// Convert one file or store.
    pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source: P,
        target: Q,
        source_format: FileFormat,
        target_format: FileFormat,
    ) -> Result<ConversionTask> {
        self.engine()
            .convert(source.as_ref(), target.as_ref(), source_format, target_format)
    }

    /// Convert every matching entry under a directory.
    pub fn batch_convert<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source_dir: P,
        target_dir: Q,
        source_format: FileFormat,
        target_format: FileFormat,
    ) -> Result<BatchReport> {
        self.engine().batch_convert(
            source_dir.as_ref(),
            target_dir.as_ref(),
            source_format,
            target_format,
        )
    }

    /// Batch conversion with a per-file observer.
    pub fn batch_convert_with<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source_dir: P,
        target_dir: Q,
        source_format: FileFormat,
        target_format: FileFormat,
        observer: &(dyn Fn(&FileOutcome) + Sync),
    ) -> Result<BatchReport> {
        self.engine().batch_convert_with(
            source_dir.as_ref(),
            target_dir.as_ref(),
            source_format,
            target_format,
            observer,
        )
    }

    /// Check whether a file loads cleanly.
    ///
    /// A load that fails validation returns `Ok(false)`. A missing path or
    /// a format with no loader is an error.
    pub fn validate<P: AsRef<Path>>(&self, path: P, format: FileFormat) -> Result<bool> {
        let path = path.as_ref();
        let codec = self.registry.open(path, format, AccessMode::Read, &self.config)?;
        match codec.load() {
            Ok(data) => Ok(codec.validate(&data)),
            Err(e) if e.is_validation() => {
                tracing::warn!(path = %path.display(), error = %e, "File failed validation");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Check whether a value could be saved as `format` at `path`.
    pub fn validate_value<P: AsRef<Path>>(
        &self,
        data: &Group,
        format: FileFormat,
        path: P,
    ) -> Result<bool> {
        let codec = self
            .registry
            .open(path.as_ref(), format, AccessMode::Write, &self.config)?;
        Ok(codec.validate(data))
    }

    /// Describe a file or store.
    pub fn metadata<P: AsRef<Path>>(&self, path: P, format: FileFormat) -> Result<MetadataRecord> {
        let codec = self
            .registry
            .open(path.as_ref(), format, AccessMode::Read, &self.config)?;
        Ok(codec.metadata())
    }

    /// Bind a loader factory to `format`, replacing any existing binding.
    pub fn register_loader(&mut self, format: FileFormat, factory: impl LoaderFactory + 'static) {
        tracing::debug!(format = %format, "Registering loader");
        self.registry.register_loader(format, factory);
    }

    /// Bind a converter factory to a format pair, replacing any existing
    /// binding.
    pub fn register_converter(
        &mut self,
        source: FileFormat,
        target: FileFormat,
        factory: impl ConverterFactory + 'static,
    ) {
        tracing::debug!(source = %source, target = %target, "Registering converter");
        self.registry.register_converter(source, target, factory);
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RdmConfig {
        &self.config
    }

    fn engine(&self) -> ConversionEngine<'_> {
        ConversionEngine::new(&self.registry, &self.config)
    }
}

/// Load a file, detecting its format from the suffix.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Group> {
    DataManager::new().load(path, FileFormat::Auto)
}

/// Save a value, detecting the format from the suffix.
pub fn save<P: AsRef<Path>>(data: &Group, path: P) -> Result<()> {
    DataManager::new().save(data, path, FileFormat::Auto)
}
