// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Configuration for codecs, validation, logging and batch conversion.
//!
//! Configuration is an explicit value passed to the data manager; there is
//! no process-wide instance. [`RdmConfig::default`] holds the built-in
//! defaults, and overrides (from a TOML/JSON file or a JSON value) are
//! deep-merged on top of them.
//!
//! # Example
//!
//! ```
//! use robodata::RdmConfig;
//!
//! let config = RdmConfig::default()
//!     .with_overrides(serde_json::json!({"formats": {"json": {"indent": 4}}}))
//!     .unwrap();
//! assert_eq!(config.formats.json.indent, 4);
//! assert_eq!(config.get("formats.hdf5.compression"), Some(serde_json::json!(9)));
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::core::{DataError, Result};
use crate::io::staging;
use crate::FileFormat;

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RdmConfig {
    /// Per-format codec settings
    pub formats: FormatsConfig,
    /// Structural validation settings
    pub validation: ValidationConfig,
    /// Logging settings used by the command line tool
    pub logging: LoggingConfig,
    /// Batch conversion settings
    pub conversion: ConversionConfig,
}

/// Per-format codec settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatsConfig {
    pub hdf5: Hdf5Config,
    pub zarr: ZarrConfig,
    pub json: JsonConfig,
    pub pickle: PickleConfig,
    pub numpy: NumpyConfig,
}

/// HDF5 dataset settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hdf5Config {
    /// Deflate level (0-9), or `None` for uncompressed datasets
    pub compression: Option<u8>,
}

impl Default for Hdf5Config {
    fn default() -> Self {
        Self {
            compression: Some(9),
        }
    }
}

/// Zarr array settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZarrConfig {
    /// Chunk compressor: `"zstd"` or `"none"`
    pub compression: String,
    /// Compressor level
    pub level: i32,
}

impl Default for ZarrConfig {
    fn default() -> Self {
        Self {
            compression: "zstd".to_string(),
            level: 3,
        }
    }
}

/// JSON output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    /// Spaces per indentation level; 0 writes compact JSON
    pub indent: usize,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

/// Pickle output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickleConfig {
    /// Pickle protocol (2 or 3)
    pub protocol: u8,
}

impl Default for PickleConfig {
    fn default() -> Self {
        Self { protocol: 3 }
    }
}

/// NumPy output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumpyConfig {
    /// Deflate `.npz` members
    pub compressed: bool,
}

impl Default for NumpyConfig {
    fn default() -> Self {
        Self { compressed: true }
    }
}

/// Structural validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Fail episodic loads on structural problems instead of warning
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. `info`, `robodata=debug`)
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Batch conversion settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Convert files on a worker pool
    pub parallel: bool,
    /// Worker count; `None` uses one per CPU
    pub num_workers: Option<usize>,
}

impl RdmConfig {
    /// Deep-merge `overrides` onto this configuration.
    pub fn with_overrides(&self, overrides: JsonValue) -> Result<Self> {
        self.with_overrides_from(overrides, "overrides")
    }

    fn with_overrides_from(&self, overrides: JsonValue, source: &str) -> Result<Self> {
        if !overrides.is_object() {
            return Err(DataError::config(source, "expected a table of settings"));
        }
        let base = serde_json::to_value(self).map_err(|e| DataError::config(source, e.to_string()))?;
        let merged = merge_json(base, overrides);
        let config: RdmConfig =
            serde_json::from_value(merged).map_err(|e| DataError::config(source, e.to_string()))?;
        config.check().map_err(|msg| DataError::config(source, msg))?;
        Ok(config)
    }

    /// Load overrides from a `.toml` or `.json` file on top of the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| DataError::config(&source, e.to_string()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let overrides: JsonValue = match ext.as_deref() {
            Some("toml") => {
                toml::from_str(&text).map_err(|e| DataError::config(&source, e.to_string()))?
            }
            Some("json") => {
                serde_json::from_str(&text).map_err(|e| DataError::config(&source, e.to_string()))?
            }
            _ => {
                return Err(DataError::config(
                    &source,
                    "unsupported configuration file type, expected .toml or .json",
                ))
            }
        };

        Self::default().with_overrides_from(overrides, &source)
    }

    /// Write the effective configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| DataError::persistence(FileFormat::Json, path, e.to_string()))?;
        staging::write_file(path, FileFormat::Json, &bytes)
    }

    /// Read a setting by dotted key, e.g. `"formats.json.indent"`.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        let mut node = serde_json::to_value(self).ok()?;
        for part in key.split('.') {
            node = node.get_mut(part)?.take();
        }
        Some(node)
    }

    fn check(&self) -> std::result::Result<(), String> {
        if let Some(level) = self.formats.hdf5.compression {
            if level > 9 {
                return Err(format!(
                    "formats.hdf5.compression must be between 0 and 9, got {level}"
                ));
            }
        }
        match self.formats.zarr.compression.as_str() {
            "zstd" | "none" => {}
            other => {
                return Err(format!(
                    "formats.zarr.compression must be 'zstd' or 'none', got '{other}'"
                ))
            }
        }
        if !matches!(self.formats.pickle.protocol, 2 | 3) {
            return Err(format!(
                "formats.pickle.protocol must be 2 or 3, got {}",
                self.formats.pickle.protocol
            ));
        }
        if self.conversion.num_workers == Some(0) {
            return Err("conversion.num_workers must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Deep-merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value replaces the base value.
pub fn merge_json(base: JsonValue, overlay: JsonValue) -> JsonValue {
    match (base, overlay) {
        (JsonValue::Object(mut base), JsonValue::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            JsonValue::Object(base)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "robodata_test_config_{}_{}",
            std::process::id(),
            name
        ))
    }

    #[test]
    fn test_defaults() {
        let config = RdmConfig::default();
        assert_eq!(config.formats.hdf5.compression, Some(9));
        assert_eq!(config.formats.zarr.compression, "zstd");
        assert_eq!(config.formats.json.indent, 2);
        assert_eq!(config.formats.pickle.protocol, 3);
        assert!(config.formats.numpy.compressed);
        assert!(config.validation.strict);
        assert_eq!(config.logging.level, "info");
        assert!(!config.conversion.parallel);
        assert_eq!(config.conversion.num_workers, None);
    }

    #[test]
    fn test_merge_json() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let overlay = json!({"a": {"y": 20, "z": 30}, "c": 4});
        assert_eq!(
            merge_json(base, overlay),
            json!({"a": {"x": 1, "y": 20, "z": 30}, "b": 3, "c": 4})
        );
    }

    #[test]
    fn test_merge_replaces_non_objects() {
        assert_eq!(merge_json(json!({"a": 1}), json!(5)), json!(5));
        assert_eq!(merge_json(json!({"a": [1, 2]}), json!({"a": [3]})), json!({"a": [3]}));
    }

    #[test]
    fn test_with_overrides_keeps_other_defaults() {
        let config = RdmConfig::default()
            .with_overrides(json!({"conversion": {"parallel": true, "num_workers": 2}}))
            .unwrap();
        assert!(config.conversion.parallel);
        assert_eq!(config.conversion.num_workers, Some(2));
        assert_eq!(config.formats.json.indent, 2);
    }

    #[test]
    fn test_with_overrides_rejects_bad_values() {
        let err = RdmConfig::default()
            .with_overrides(json!({"formats": {"pickle": {"protocol": 5}}}))
            .unwrap_err();
        assert!(matches!(err, DataError::Config { .. }));

        let err = RdmConfig::default()
            .with_overrides(json!({"formats": {"json": {"indent": "wide"}}}))
            .unwrap_err();
        assert!(matches!(err, DataError::Config { .. }));

        assert!(RdmConfig::default().with_overrides(json!([1])).is_err());
    }

    #[test]
    fn test_get_dotted() {
        let config = RdmConfig::default();
        assert_eq!(config.get("formats.json.indent"), Some(json!(2)));
        assert_eq!(config.get("validation.strict"), Some(json!(true)));
        assert_eq!(config.get("formats.nope"), None);
    }

    #[test]
    fn test_from_toml_file() {
        let path = temp_path("rdm.toml");
        std::fs::write(
            &path,
            "[formats.zarr]\ncompression = \"none\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = RdmConfig::from_file(&path).unwrap();
        assert_eq!(config.formats.zarr.compression, "none");
        assert_eq!(config.formats.zarr.level, 3);
        assert_eq!(config.logging.level, "debug");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_from_file_errors() {
        let missing = RdmConfig::from_file(&temp_path("missing.toml")).unwrap_err();
        assert!(matches!(missing, DataError::Config { .. }));

        let path = temp_path("rdm.yaml");
        std::fs::write(&path, "a: 1").unwrap();
        assert!(RdmConfig::from_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_round_trip() {
        let path = temp_path("saved.json");
        let config = RdmConfig::default()
            .with_overrides(json!({"validation": {"strict": false}}))
            .unwrap();
        config.save(&path).unwrap();
        assert_eq!(RdmConfig::from_file(&path).unwrap(), config);
        let _ = std::fs::remove_file(&path);
    }
}
