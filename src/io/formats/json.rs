// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Plain JSON documents.
//!
//! Groups map to objects, arrays to nested lists. On load, a list whose
//! elements form a rectangular, homogeneous block of numbers, booleans or
//! strings becomes an [`NdArray`]; anything else stays a
//! [`Value::List`]. Round trips are exact for groups, scalars and
//! `int64`/`float64`/`bool`/`string` arrays; narrower element types widen
//! and empty lists load as `float64` arrays of shape `[0]`.
//!
//! `null` has no counterpart in the value model and fails the load.
//! Non-finite floats have no JSON spelling and fail the save.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::config::{JsonConfig, RdmConfig};
use crate::core::{DataError, Group, NdArray, Result, Value, MAX_DEPTH};
use crate::io::metadata::MetadataRecord;
use crate::io::staging;
use crate::io::traits::{check_depth, require_exists, AccessMode, FormatCodec};
use crate::FileFormat;

/// Codec for `.json` documents.
#[derive(Debug, Clone)]
pub struct JsonCodec {
    path: PathBuf,
    config: JsonConfig,
}

impl JsonCodec {
    /// Bind a codec to `path`.
    pub fn new(path: impl Into<PathBuf>, config: JsonConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Bind a codec, checking that the path exists when reading.
    pub fn open(path: &Path, mode: AccessMode, config: &RdmConfig) -> Result<Self> {
        require_exists(path, mode)?;
        Ok(Self::new(path, config.formats.json.clone()))
    }

    fn encode(&self, data: &Group) -> std::result::Result<Vec<u8>, String> {
        check_depth(data)?;
        let doc = group_to_json(data)?;
        render(&doc, self.config.indent)
    }
}

impl FormatCodec for JsonCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Json
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Group> {
        let doc = read_document(&self.path, FileFormat::Json)?;
        let data = document_to_group(doc)
            .map_err(|msg| DataError::validation(FileFormat::Json, &self.path, msg))?;
        tracing::info!(path = %self.path.display(), keys = data.len(), "Loaded JSON data");
        Ok(data)
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        let target = target.unwrap_or(&self.path);
        let bytes = self
            .encode(data)
            .map_err(|msg| DataError::persistence(FileFormat::Json, target, msg))?;
        staging::write_file(target, FileFormat::Json, &bytes)?;
        tracing::info!(path = %target.display(), "Saved JSON data");
        Ok(())
    }

    fn validate(&self, data: &Group) -> bool {
        match check_depth(data).and_then(|_| group_to_json(data)) {
            Ok(_) => true,
            Err(msg) => {
                tracing::warn!(path = %self.path.display(), reason = %msg, "JSON validation failed");
                false
            }
        }
    }

    fn metadata(&self) -> MetadataRecord {
        let mut record = MetadataRecord::for_path(&self.path, FileFormat::Json);
        if let Ok(JsonValue::Object(map)) = read_document(&self.path, FileFormat::Json) {
            let keys: Vec<JsonValue> = map.keys().map(|k| JsonValue::from(k.as_str())).collect();
            record.insert_detail("keys", keys);
        }
        record
    }
}

// =============================================================================
// Document I/O
// =============================================================================

/// Parse a JSON file, reporting failures as validation errors of `format`.
pub(crate) fn read_document(path: &Path, format: FileFormat) -> Result<JsonValue> {
    let bytes =
        std::fs::read(path).map_err(|e| DataError::validation(format, path, e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| DataError::validation(format, path, e.to_string()))
}

/// Serialize a document with `indent` spaces per level (0 for compact).
pub(crate) fn render(doc: &JsonValue, indent: usize) -> std::result::Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    if indent == 0 {
        serde_json::to_writer(&mut buf, doc).map_err(|e| e.to_string())?;
    } else {
        let indent = vec![b' '; indent];
        let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        doc.serialize(&mut ser).map_err(|e| e.to_string())?;
    }
    buf.push(b'\n');
    Ok(buf)
}

/// Convert a parsed document to a group; non-objects are wrapped under `"data"`.
pub(crate) fn document_to_group(doc: JsonValue) -> std::result::Result<Group, String> {
    match json_to_value(doc, 0)? {
        Value::Group(g) => Ok(g),
        other => {
            let mut g = Group::new();
            g.insert("data".to_string(), other);
            Ok(g)
        }
    }
}

// =============================================================================
// Value Conversion
// =============================================================================

/// Convert a group to a JSON object.
pub(crate) fn group_to_json(group: &Group) -> std::result::Result<JsonValue, String> {
    let mut map = serde_json::Map::with_capacity(group.len());
    for (key, value) in group {
        map.insert(key.clone(), value_to_json(value).map_err(|e| format!("{key}: {e}"))?);
    }
    Ok(JsonValue::Object(map))
}

/// Convert a value to JSON.
pub(crate) fn value_to_json(value: &Value) -> std::result::Result<JsonValue, String> {
    match value {
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Int(i) => Ok(JsonValue::from(*i)),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| format!("non-finite float {f} cannot be written as JSON")),
        Value::String(s) => Ok(JsonValue::String(s.clone())),
        Value::Array(a) => value_to_json(&a.to_nested()),
        Value::List(items) => items
            .iter()
            .map(value_to_json)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        Value::Group(g) => group_to_json(g),
    }
}

/// Convert JSON to a value, inferring arrays from homogeneous lists.
pub(crate) fn json_to_value(doc: JsonValue, depth: usize) -> std::result::Result<Value, String> {
    if depth > MAX_DEPTH {
        return Err(format!("nesting deeper than {MAX_DEPTH} levels"));
    }
    match doc {
        JsonValue::Null => Err("null values are not supported".to_string()),
        JsonValue::Bool(b) => Ok(Value::Bool(b)),
        JsonValue::Number(n) => Ok(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        JsonValue::String(s) => Ok(Value::String(s)),
        JsonValue::Array(items) => {
            let items = items
                .into_iter()
                .map(|item| json_to_value(item, depth + 1))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(list_or_array(items))
        }
        JsonValue::Object(map) => {
            let mut group = Group::new();
            for (key, value) in map {
                let value = json_to_value(value, depth + 1).map_err(|e| format!("{key}: {e}"))?;
                group.insert(key, value);
            }
            Ok(Value::Group(group))
        }
    }
}

/// A sequence becomes an array when it is a homogeneous block, else a list.
pub(crate) fn list_or_array(items: Vec<Value>) -> Value {
    match NdArray::from_nested(&items) {
        Some(array) => Value::Array(array),
        None => Value::List(items),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArrayData;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "robodata_test_json_{}_{}",
            std::process::id(),
            name
        ))
    }

    fn codec(path: &Path, indent: usize) -> JsonCodec {
        JsonCodec::new(path, JsonConfig { indent })
    }

    fn sample() -> Group {
        let mut meta = Group::new();
        meta.insert("task".into(), Value::from("pick_and_place"));
        meta.insert("success".into(), Value::Bool(true));

        let mut g = Group::new();
        g.insert(
            "observations".into(),
            Value::Array(NdArray::new(vec![2, 3], vec![0.5f64, 1.0, 1.5, 2.0, 2.5, 3.0]).unwrap()),
        );
        g.insert("ids".into(), Value::Array(NdArray::vector(vec![1i64, 2, 3])));
        g.insert("metadata".into(), Value::Group(meta));
        g.insert("length".into(), Value::Int(2));
        g.insert("rate".into(), Value::Float(0.25));
        g
    }

    #[test]
    fn test_round_trip() {
        let path = temp_path("round_trip.json");
        let c = codec(&path, 2);
        let data = sample();

        c.save(&data, None).unwrap();
        assert_eq!(c.load().unwrap(), data);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_indent_setting() {
        let path = temp_path("compact.json");
        let mut g = Group::new();
        g.insert("a".into(), Value::Int(1));

        codec(&path, 0).save(&g, None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");

        codec(&path, 4).save(&g, None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\n    \"a\": 1\n}\n");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_infers_arrays_and_lists() {
        let doc = serde_json::json!({
            "matrix": [[1, 2], [3, 4]],
            "mixed": [1, "two"],
            "steps": [{"a": 1}, {"a": 2}],
            "empty": []
        });
        let g = document_to_group(doc).unwrap();

        let matrix = g["matrix"].as_array().unwrap();
        assert_eq!(matrix.shape(), &[2, 2]);
        assert_eq!(matrix.data(), &ArrayData::Int64(vec![1, 2, 3, 4]));

        assert_eq!(g["mixed"].as_list().unwrap().len(), 2);
        assert_eq!(g["steps"].as_list().unwrap().len(), 2);
        assert_eq!(g["empty"].as_array().unwrap().shape(), &[0]);
    }

    #[test]
    fn test_non_object_is_wrapped() {
        let g = document_to_group(serde_json::json!([1.5, 2.5])).unwrap();
        assert_eq!(g.keys().collect::<Vec<_>>(), vec!["data"]);
        assert_eq!(g["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_null_fails_load() {
        let path = temp_path("null.json");
        std::fs::write(&path, "{\"a\": null}").unwrap();

        let err = codec(&path, 2).load().unwrap_err();
        assert!(err.is_validation());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_fails_load() {
        let path = temp_path("broken.json");
        std::fs::write(&path, "{\"a\": ").unwrap();

        assert!(codec(&path, 2).load().unwrap_err().is_validation());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_non_finite_fails_save() {
        let path = temp_path("nan.json");
        let mut g = Group::new();
        g.insert("x".into(), Value::Float(f64::NAN));

        let c = codec(&path, 2);
        assert!(!c.validate(&g));
        let err = c.save(&g, None).unwrap_err();
        assert!(matches!(err, DataError::Persistence { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_metadata_keys() {
        let path = temp_path("meta.json");
        let c = codec(&path, 2);
        c.save(&sample(), None).unwrap();

        let record = c.metadata();
        assert_eq!(record.format, FileFormat::Json);
        assert!(record.size.unwrap() > 0);
        assert_eq!(record.details["keys"].as_array().unwrap().len(), 5);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_open_missing_for_read() {
        let err = JsonCodec::open(&temp_path("missing.json"), AccessMode::Read, &RdmConfig::default())
            .unwrap_err();
        assert!(matches!(err, DataError::PathNotFound { .. }));
    }
}
