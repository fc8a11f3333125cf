// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Metadata types shared by every format.
//!
//! Two kinds of metadata live here:
//! - [`MetadataRecord`]: what a codec reports about a file or store when
//!   queried (size, format, format-specific details). Recomputed on every
//!   query and never persisted.
//! - [`MetadataFile`]: a summary of a loaded value (keys, types, shapes,
//!   size, source hash) that can be written next to a dataset as JSON.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::core::{DataError, Group, Result, Value};
use crate::FileFormat;

use super::staging;

/// Version written into every metadata file.
pub const METADATA_FORMAT_VERSION: &str = "1.0";

// =============================================================================
// Metadata Record
// =============================================================================

/// Metadata about a file or store, as reported by its codec.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    /// Path of the file or store
    pub path: String,
    /// Format of the codec that produced this record
    pub format: FileFormat,
    /// Size in bytes (directories: total of contained files), if available
    pub size: Option<u64>,
    /// Format-specific fields (e.g. `groups`, `num_records`)
    pub details: BTreeMap<String, serde_json::Value>,
}

impl MetadataRecord {
    /// Create a record with the on-disk size of `path` filled in.
    pub fn for_path(path: &Path, format: FileFormat) -> Self {
        Self {
            path: path.display().to_string(),
            format,
            size: path_size(path),
            details: BTreeMap::new(),
        }
    }

    /// Add a format-specific field.
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Add a format-specific field in place.
    pub fn insert_detail(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.details.insert(key.to_string(), value.into());
    }

    /// Check if the path existed when the record was taken.
    pub fn exists(&self) -> bool {
        self.size.is_some()
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("path".into(), self.path.clone().into());
        map.insert("format".into(), self.format.as_str().into());
        if let Some(size) = self.size {
            map.insert("size".into(), size.into());
        }
        for (key, value) in &self.details {
            map.insert(key.clone(), value.clone());
        }
        serde_json::Value::Object(map)
    }
}

/// Size of a file, or the total size of the files under a directory.
///
/// Returns `None` when the path does not exist.
pub fn path_size(path: &Path) -> Option<u64> {
    let meta = std::fs::metadata(path).ok()?;
    if meta.is_file() {
        return Some(meta.len());
    }
    let total = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum();
    Some(total)
}

// =============================================================================
// Metadata File
// =============================================================================

/// Summary of a value's top-level structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    /// Number of top-level keys
    pub num_keys: usize,
    /// Top-level keys in order
    pub keys: Vec<String>,
    /// Type description per key (e.g. `int`, `group`, `array<float64>`)
    pub data_types: BTreeMap<String, String>,
    /// Shape per key, for arrays and lists
    pub shapes: BTreeMap<String, Vec<usize>>,
    /// Approximate in-memory size in bytes
    pub memory_usage: usize,
}

impl DataInfo {
    /// Summarize a group.
    pub fn from_group(data: &Group) -> Self {
        let mut data_types = BTreeMap::new();
        let mut shapes = BTreeMap::new();
        for (key, value) in data {
            data_types.insert(key.clone(), describe(value));
            match value {
                Value::Array(a) => {
                    shapes.insert(key.clone(), a.shape().to_vec());
                }
                Value::List(l) => {
                    shapes.insert(key.clone(), vec![l.len()]);
                }
                _ => {}
            }
        }
        Self {
            num_keys: data.len(),
            keys: data.keys().cloned().collect(),
            data_types,
            shapes,
            memory_usage: data.values().map(Value::size_hint).sum(),
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Array(a) => format!("array<{}>", a.dtype()),
        other => other.type_name().to_string(),
    }
}

/// Persisted metadata describing a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFile {
    /// Structure summary
    pub data_info: DataInfo,
    /// Creation time (RFC 3339)
    pub created_at: Option<String>,
    /// File the data was loaded from
    pub source_path: Option<String>,
    /// Metadata layout version
    pub format_version: String,
    /// Size of the source file in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Hex SHA-256 of the source file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
}

/// Build the metadata for a value, optionally describing its source file.
///
/// Size and hash are filled in only when `source` is an existing regular
/// file; a hashing failure is logged and leaves the hash out.
pub fn create_metadata(data: &Group, source: Option<&Path>) -> MetadataFile {
    let mut metadata = MetadataFile {
        data_info: DataInfo::from_group(data),
        created_at: Some(chrono::Utc::now().to_rfc3339()),
        source_path: source.map(|p| p.display().to_string()),
        format_version: METADATA_FORMAT_VERSION.to_string(),
        file_size: None,
        file_hash: None,
    };

    if let Some(path) = source.filter(|p| p.is_file()) {
        metadata.file_size = path_size(path);
        match file_sha256(path) {
            Ok(hash) => metadata.file_hash = Some(hash),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to hash source file");
            }
        }
    }

    metadata
}

/// Write metadata as pretty-printed JSON.
pub fn save_metadata(metadata: &MetadataFile, path: &Path) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(metadata)
        .map_err(|e| DataError::persistence(FileFormat::Json, path, e.to_string()))?;
    staging::write_file(path, FileFormat::Json, &bytes)
}

/// Read a metadata file without interpreting its fields.
pub fn load_metadata(path: &Path) -> Result<serde_json::Value> {
    if !path.exists() {
        return Err(DataError::path_not_found(path));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| DataError::validation(FileFormat::Json, path, e.to_string()))?;
    serde_json::from_str(&text)
        .map_err(|e| DataError::validation(FileFormat::Json, path, e.to_string()))
}

/// Hex-encoded SHA-256 digest of a file's contents.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
