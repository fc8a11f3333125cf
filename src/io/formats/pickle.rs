// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Python pickle files.
//!
//! Groups are written as dicts with string keys and arrays as nested lists,
//! using pickle protocol 2 or 3. Loading accepts dicts, lists, tuples,
//! booleans, 64-bit integers, floats, strings and bytes (bytes load as
//! `uint8` arrays). `None`, integers beyond 64 bits, sets and dicts with
//! non-string keys have no counterpart in the value model and fail the load.
//! A top-level object that is not a dict is wrapped under `"data"`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_pickle::{DeOptions, HashableValue, SerOptions, Value as PickleValue};

use crate::config::{PickleConfig, RdmConfig};
use crate::core::{DataError, Group, NdArray, Result, Value, MAX_DEPTH};
use crate::io::metadata::MetadataRecord;
use crate::io::staging;
use crate::io::traits::{check_depth, require_exists, AccessMode, FormatCodec};
use crate::FileFormat;

use super::json::list_or_array;

/// Codec for `.pkl` / `.pickle` files.
#[derive(Debug, Clone)]
pub struct PickleCodec {
    path: PathBuf,
    config: PickleConfig,
}

impl PickleCodec {
    /// Bind a codec to `path`.
    pub fn new(path: impl Into<PathBuf>, config: PickleConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Bind a codec, checking that the path exists when reading.
    pub fn open(path: &Path, mode: AccessMode, config: &RdmConfig) -> Result<Self> {
        require_exists(path, mode)?;
        Ok(Self::new(path, config.formats.pickle.clone()))
    }

    fn ser_options(&self) -> SerOptions {
        match self.config.protocol {
            2 => SerOptions::new().proto_v2(),
            _ => SerOptions::new(),
        }
    }

    fn read(&self) -> Result<Group> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| DataError::validation(FileFormat::Pickle, &self.path, e.to_string()))?;
        let object = serde_pickle::value_from_slice(&bytes, DeOptions::new())
            .map_err(|e| DataError::validation(FileFormat::Pickle, &self.path, e.to_string()))?;
        let value = pickle_to_value(object, 0)
            .map_err(|msg| DataError::validation(FileFormat::Pickle, &self.path, msg))?;
        Ok(match value {
            Value::Group(g) => g,
            other => {
                let mut g = Group::new();
                g.insert("data".to_string(), other);
                g
            }
        })
    }
}

impl FormatCodec for PickleCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Pickle
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Group> {
        let data = self.read()?;
        tracing::info!(path = %self.path.display(), keys = data.len(), "Loaded pickle data");
        Ok(data)
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        let target = target.unwrap_or(&self.path);
        check_depth(data).map_err(|msg| DataError::persistence(FileFormat::Pickle, target, msg))?;

        let object = group_to_pickle(data);
        let bytes = serde_pickle::value_to_vec(&object, self.ser_options())
            .map_err(|e| DataError::persistence(FileFormat::Pickle, target, e.to_string()))?;
        staging::write_file(target, FileFormat::Pickle, &bytes)?;

        tracing::info!(path = %target.display(), protocol = self.config.protocol, "Saved pickle data");
        Ok(())
    }

    fn validate(&self, data: &Group) -> bool {
        match check_depth(data) {
            Ok(()) => true,
            Err(msg) => {
                tracing::warn!(path = %self.path.display(), reason = %msg, "Pickle validation failed");
                false
            }
        }
    }

    fn metadata(&self) -> MetadataRecord {
        let mut record = MetadataRecord::for_path(&self.path, FileFormat::Pickle);
        if let Ok(data) = self.read() {
            let keys: Vec<serde_json::Value> = data.keys().map(|k| k.as_str().into()).collect();
            record.insert_detail("keys", keys);
        }
        record
    }
}

fn group_to_pickle(group: &Group) -> PickleValue {
    let dict: BTreeMap<HashableValue, PickleValue> = group
        .iter()
        .map(|(k, v)| (HashableValue::String(k.clone()), value_to_pickle(v)))
        .collect();
    PickleValue::Dict(dict)
}

fn value_to_pickle(value: &Value) -> PickleValue {
    match value {
        Value::Bool(b) => PickleValue::Bool(*b),
        Value::Int(i) => PickleValue::I64(*i),
        Value::Float(f) => PickleValue::F64(*f),
        Value::String(s) => PickleValue::String(s.clone()),
        Value::Array(a) => value_to_pickle(&a.to_nested()),
        Value::List(items) => PickleValue::List(items.iter().map(value_to_pickle).collect()),
        Value::Group(g) => group_to_pickle(g),
    }
}

fn pickle_to_value(object: PickleValue, depth: usize) -> std::result::Result<Value, String> {
    if depth > MAX_DEPTH {
        return Err(format!("nesting deeper than {MAX_DEPTH} levels"));
    }
    match object {
        PickleValue::None => Err("None values are not supported".to_string()),
        PickleValue::Bool(b) => Ok(Value::Bool(b)),
        PickleValue::I64(i) => Ok(Value::Int(i)),
        PickleValue::Int(big) => Err(format!("integer {big} does not fit in 64 bits")),
        PickleValue::F64(f) => Ok(Value::Float(f)),
        PickleValue::String(s) => Ok(Value::String(s)),
        PickleValue::Bytes(b) => Ok(Value::Array(NdArray::vector(b))),
        PickleValue::List(items) | PickleValue::Tuple(items) => {
            let items = items
                .into_iter()
                .map(|item| pickle_to_value(item, depth + 1))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(list_or_array(items))
        }
        PickleValue::Set(_) | PickleValue::FrozenSet(_) => {
            Err("sets are not supported".to_string())
        }
        PickleValue::Dict(dict) => {
            let mut group = Group::new();
            for (key, value) in dict {
                let key = match key {
                    HashableValue::String(s) => s,
                    other => return Err(format!("dict key {other:?} is not a string")),
                };
                let value = pickle_to_value(value, depth + 1).map_err(|e| format!("{key}: {e}"))?;
                group.insert(key, value);
            }
            Ok(Value::Group(group))
        }
    }
}
