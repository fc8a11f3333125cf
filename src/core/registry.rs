// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Format registry.
//!
//! Maps format identifiers to loader factories and (source, target) pairs
//! to converter factories. A registry built with
//! [`FormatRegistry::with_builtin_loaders`] knows every codec compiled into
//! this build and the standard converter between every pair of them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::error::{DataError, Result};
use super::value::Group;
use super::FileFormat;
use crate::config::RdmConfig;
use crate::convert::StandardConverter;
use crate::io::detection::detect_format;
use crate::io::formats::Codec;
use crate::io::traits::{AccessMode, FormatCodec};

/// Constructs codecs for one format.
///
/// Implemented for any `Fn(&Path, AccessMode, &RdmConfig) ->
/// Result<Box<dyn FormatCodec>>`.
pub trait LoaderFactory: Send + Sync {
    /// Bind a codec to `path`.
    fn create(&self, path: &Path, mode: AccessMode, config: &RdmConfig)
        -> Result<Box<dyn FormatCodec>>;
}

impl<F> LoaderFactory for F
where
    F: Fn(&Path, AccessMode, &RdmConfig) -> Result<Box<dyn FormatCodec>> + Send + Sync,
{
    fn create(
        &self,
        path: &Path,
        mode: AccessMode,
        config: &RdmConfig,
    ) -> Result<Box<dyn FormatCodec>> {
        self(path, mode, config)
    }
}

/// Reshapes a loaded value for a target format.
pub trait DataConverter: Send + Sync {
    /// Convert `data`, consuming it.
    fn convert(&self, data: Group) -> Result<Group>;
}

/// Constructs converters for one (source, target) pair.
///
/// Implemented for any `Fn() -> Box<dyn DataConverter>`.
pub trait ConverterFactory: Send + Sync {
    /// Create a converter.
    fn create(&self) -> Box<dyn DataConverter>;
}

impl<F> ConverterFactory for F
where
    F: Fn() -> Box<dyn DataConverter> + Send + Sync,
{
    fn create(&self) -> Box<dyn DataConverter> {
        self()
    }
}

/// Loader for a built-in codec.
struct BuiltinLoader(FileFormat);

impl LoaderFactory for BuiltinLoader {
    fn create(
        &self,
        path: &Path,
        mode: AccessMode,
        config: &RdmConfig,
    ) -> Result<Box<dyn FormatCodec>> {
        Ok(Box::new(Codec::open(self.0, path, mode, config)?))
    }
}

/// Registry of loaders and converters.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    loaders: HashMap<FileFormat, Arc<dyn LoaderFactory>>,
    converters: HashMap<(FileFormat, FileFormat), Arc<dyn ConverterFactory>>,
}

impl FormatRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in codec and the standard
    /// converter for each ordered pair of distinct built-in formats.
    pub fn with_builtin_loaders() -> Self {
        let mut registry = Self::new();
        let formats = Codec::available_formats();

        for &format in &formats {
            registry.register_loader(format, BuiltinLoader(format));
        }
        for &source in &formats {
            for &target in &formats {
                if source != target {
                    registry.register_converter(source, target, move || {
                        Box::new(StandardConverter::new(target)) as Box<dyn DataConverter>
                    });
                }
            }
        }

        tracing::debug!(
            loaders = registry.loader_count(),
            converters = registry.converter_count(),
            "Registered built-in formats"
        );
        registry
    }

    /// Bind a loader factory to `format`, replacing any existing binding.
    pub fn register_loader(&mut self, format: FileFormat, factory: impl LoaderFactory + 'static) {
        self.loaders.insert(format, Arc::new(factory));
    }

    /// Bind a converter factory to a (source, target) pair, replacing any
    /// existing binding.
    pub fn register_converter(
        &mut self,
        source: FileFormat,
        target: FileFormat,
        factory: impl ConverterFactory + 'static,
    ) {
        self.converters.insert((source, target), Arc::new(factory));
    }

    /// Detect a format from the path suffix alone.
    pub fn detect(&self, path: &Path) -> FileFormat {
        detect_format(path)
    }

    /// Resolve `Auto` from the path; other formats are returned unchanged.
    pub fn resolve(&self, format: FileFormat, path: &Path) -> FileFormat {
        if format.is_auto() {
            detect_format(path)
        } else {
            format
        }
    }

    /// Bind a codec for `format` (resolved against `path`) to `path`.
    ///
    /// Fails with [`DataError::UnregisteredFormat`] before touching the
    /// filesystem when no loader is bound.
    pub fn open(
        &self,
        path: &Path,
        format: FileFormat,
        mode: AccessMode,
        config: &RdmConfig,
    ) -> Result<Box<dyn FormatCodec>> {
        let format = self.resolve(format, path);
        self.loader(format)?.create(path, mode, config)
    }

    /// Get the loader bound to `format`.
    pub fn loader(&self, format: FileFormat) -> Result<&dyn LoaderFactory> {
        self.loaders
            .get(&format)
            .map(|factory| factory.as_ref())
            .ok_or_else(|| DataError::unregistered_loader(format))
    }

    /// Create the converter bound to (source, target), if any.
    pub fn converter(&self, source: FileFormat, target: FileFormat) -> Option<Box<dyn DataConverter>> {
        self.converters.get(&(source, target)).map(|f| f.create())
    }

    /// Formats with a bound loader, in declaration order.
    pub fn formats(&self) -> Vec<FileFormat> {
        let mut formats: Vec<FileFormat> = self.loaders.keys().copied().collect();
        formats.sort();
        formats
    }

    /// Check if a loader is bound to `format`.
    pub fn has_loader(&self, format: FileFormat) -> bool {
        self.loaders.contains_key(&format)
    }

    /// Number of loader bindings.
    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }

    /// Number of converter bindings.
    pub fn converter_count(&self) -> usize {
        self.converters.len()
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.formats())
            .field("converters", &self.converter_count())
            .finish()
    }
}
