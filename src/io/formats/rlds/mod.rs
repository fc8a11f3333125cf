// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! RLDS episodes in TFRecord files.
//!
//! Each episode is one `tf.train.Example` record. Leaves become features
//! named by their `/`-joined path, with list positions as path segments
//! (`steps/0/action`). A JSON document in the `rdm/layout` feature records
//! the tree shape, element types and array shapes so the episode can be
//! rebuilt exactly.
//!
//! | element type                    | feature                       |
//! |---------------------------------|-------------------------------|
//! | `float32`                       | `float_list`                  |
//! | `bool`, integers up to 32 bits, `int64` | `int64_list`          |
//! | `float64`, `uint64`             | `bytes_list`, raw little-endian |
//! | `string`                        | `bytes_list`, UTF-8           |
//!
//! Records without a layout feature (written by other tools) load as flat
//! 1-D arrays, one per feature, nested by splitting names on `/`.

mod example;
mod tfrecord;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::config::RdmConfig;
use crate::core::value::{coerce_leaf, unflatten};
use crate::core::{ArrayData, DType, DataError, Group, NdArray, Result, Value};
use crate::io::metadata::MetadataRecord;
use crate::io::staging;
use crate::io::traits::{check_depth, require_exists, AccessMode, FormatCodec};
use crate::FileFormat;

use example::{feature::Kind, Example, Feature, Features};

/// Feature holding the episode layout document.
pub const LAYOUT_FEATURE: &str = "rdm/layout";

/// Codec for `.tfrecord` RLDS episode files.
#[derive(Debug, Clone)]
pub struct RldsCodec {
    path: PathBuf,
    strict: bool,
}

impl RldsCodec {
    /// Bind a codec to `path`.
    pub fn new(path: impl Into<PathBuf>, strict: bool) -> Self {
        Self {
            path: path.into(),
            strict,
        }
    }

    /// Bind a codec, checking that the path exists when reading.
    pub fn open(path: &Path, mode: AccessMode, config: &RdmConfig) -> Result<Self> {
        require_exists(path, mode)?;
        Ok(Self::new(path, config.validation.strict))
    }

    fn read_records(&self) -> Result<Vec<Vec<u8>>> {
        let invalid = |msg: String| DataError::validation(FileFormat::Rlds, &self.path, msg);
        let bytes = std::fs::read(&self.path).map_err(|e| invalid(e.to_string()))?;
        tfrecord::read_records(&bytes).map_err(invalid)
    }
}

impl FormatCodec for RldsCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Rlds
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Group> {
        let invalid = |msg: String| DataError::validation(FileFormat::Rlds, &self.path, msg);

        let mut episodes = Vec::new();
        for (i, record) in self.read_records()?.iter().enumerate() {
            let example = Example::decode(record.as_slice())
                .map_err(|e| invalid(format!("record {i}: {e}")))?;
            let episode = decode_episode(example).map_err(|e| invalid(format!("record {i}: {e}")))?;

            if !episode.contains_key("steps") {
                let msg = format!("episode {i} has no 'steps' entry");
                if self.strict {
                    return Err(invalid(msg));
                }
                tracing::warn!(path = %self.path.display(), reason = %msg, "RLDS structure check failed");
            }
            episodes.push(Value::Group(episode));
        }

        tracing::info!(path = %self.path.display(), episodes = episodes.len(), "Loaded RLDS episodes");
        Ok(dataset(episodes))
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        let target = target.unwrap_or(&self.path);
        let persist = |msg: String| DataError::persistence(FileFormat::Rlds, target, msg);

        check_depth(data).map_err(persist)?;
        let episodes = episodes_of(data).map_err(persist)?;

        let mut buf = Vec::new();
        for (i, episode) in episodes.iter().enumerate() {
            let example = encode_episode(episode).map_err(|e| persist(format!("episode {i}: {e}")))?;
            tfrecord::write_record(&mut buf, &example.encode_to_vec())
                .map_err(|e| persist(e.to_string()))?;
        }
        staging::write_file(target, FileFormat::Rlds, &buf)?;

        tracing::info!(path = %target.display(), episodes = episodes.len(), "Saved RLDS episodes");
        Ok(())
    }

    fn validate(&self, data: &Group) -> bool {
        let result = check_depth(data).and_then(|_| {
            episodes_of(data)?
                .into_iter()
                .try_for_each(|episode| encode_episode(episode).map(|_| ()))
        });
        match result {
            Ok(()) => true,
            Err(msg) => {
                tracing::warn!(path = %self.path.display(), reason = %msg, "RLDS validation failed");
                false
            }
        }
    }

    fn metadata(&self) -> MetadataRecord {
        let mut record = MetadataRecord::for_path(&self.path, FileFormat::Rlds);
        record.insert_detail("dataset_type", "TFRecord");
        if let Ok(records) = self.read_records() {
            record.insert_detail("num_records", records.len());
        }
        record
    }
}

fn dataset(episodes: Vec<Value>) -> Group {
    let mut metadata = Group::new();
    metadata.insert("num_episodes".into(), Value::Int(episodes.len() as i64));
    metadata.insert("format".into(), Value::from("rlds"));

    let mut g = Group::new();
    g.insert("episodes".into(), Value::List(episodes));
    g.insert("metadata".into(), Value::Group(metadata));
    g
}

/// The episodes to write: the `episodes` list, or the value itself.
fn episodes_of(data: &Group) -> std::result::Result<Vec<&Group>, String> {
    let episodes: Vec<&Value> = match data.get("episodes") {
        None => return check_steps(data, 0).map(|_| vec![data]),
        Some(Value::List(items)) => items.iter().collect(),
        Some(Value::Array(a)) if a.is_empty() => Vec::new(),
        Some(other) => return Err(format!("'episodes' must be a list, found {}", other.type_name())),
    };

    episodes
        .into_iter()
        .enumerate()
        .map(|(i, episode)| {
            let group = episode
                .as_group()
                .ok_or_else(|| format!("episode {i} is not a mapping"))?;
            check_steps(group, i).map(|_| group)
        })
        .collect()
}

fn check_steps(episode: &Group, index: usize) -> std::result::Result<(), String> {
    if episode.contains_key("steps") {
        Ok(())
    } else {
        Err(format!("episode {index} has no 'steps' entry"))
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Shape of an episode tree, stored alongside its features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Layout {
    Group {
        children: BTreeMap<String, Layout>,
    },
    List {
        items: Vec<Layout>,
    },
    Leaf {
        feature: String,
        dtype: DType,
        shape: Vec<usize>,
    },
}

fn encode_episode(episode: &Group) -> std::result::Result<Example, String> {
    let mut features = HashMap::new();
    let layout = encode_group(episode, "", &mut features)?;

    let doc = serde_json::to_vec(&layout).map_err(|e| e.to_string())?;
    if features
        .insert(LAYOUT_FEATURE.to_string(), Feature::bytes(vec![doc]))
        .is_some()
    {
        return Err(format!("key path '{LAYOUT_FEATURE}' is reserved"));
    }

    Ok(Example {
        features: Some(Features { feature: features }),
    })
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}

fn encode_group(
    group: &Group,
    prefix: &str,
    features: &mut HashMap<String, Feature>,
) -> std::result::Result<Layout, String> {
    let mut children = BTreeMap::new();
    for (key, value) in group {
        children.insert(key.clone(), encode_value(value, &join(prefix, key), features)?);
    }
    Ok(Layout::Group { children })
}

fn encode_value(
    value: &Value,
    name: &str,
    features: &mut HashMap<String, Feature>,
) -> std::result::Result<Layout, String> {
    match value {
        Value::Group(g) => encode_group(g, name, features),
        Value::List(items) if items.iter().any(|v| matches!(v, Value::Group(_) | Value::List(_))) => {
            let items = items
                .iter()
                .enumerate()
                .map(|(i, item)| encode_value(item, &join(name, &i.to_string()), features))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Layout::List { items })
        }
        leaf => {
            let coerced = coerce_leaf(leaf, name).ok_or_else(|| format!("{name}: not a leaf"))?;
            let array = coerced.array;
            if features
                .insert(name.to_string(), encode_array(array.data()))
                .is_some()
            {
                return Err(format!("feature name '{name}' is used twice"));
            }
            Ok(Layout::Leaf {
                feature: name.to_string(),
                dtype: array.dtype(),
                shape: array.shape().to_vec(),
            })
        }
    }
}

fn encode_array(data: &ArrayData) -> Feature {
    fn ints<T: Copy + Into<i64>>(v: &[T]) -> Feature {
        Feature::int64s(v.iter().map(|&x| x.into()).collect())
    }

    match data {
        ArrayData::Bool(v) => Feature::int64s(v.iter().map(|&b| i64::from(b)).collect()),
        ArrayData::Int8(v) => ints(v),
        ArrayData::Int16(v) => ints(v),
        ArrayData::Int32(v) => ints(v),
        ArrayData::Int64(v) => Feature::int64s(v.clone()),
        ArrayData::UInt8(v) => ints(v),
        ArrayData::UInt16(v) => ints(v),
        ArrayData::UInt32(v) => ints(v),
        ArrayData::UInt64(v) => {
            Feature::bytes(vec![v.iter().flat_map(|x| x.to_le_bytes()).collect()])
        }
        ArrayData::Float32(v) => Feature::floats(v.clone()),
        ArrayData::Float64(v) => {
            Feature::bytes(vec![v.iter().flat_map(|x| x.to_le_bytes()).collect()])
        }
        ArrayData::String(v) => Feature::bytes(v.iter().map(|s| s.as_bytes().to_vec()).collect()),
    }
}

// =============================================================================
// Decoding
// =============================================================================

fn decode_episode(example: Example) -> std::result::Result<Group, String> {
    let mut features = example.features.map(|f| f.feature).unwrap_or_default();

    let Some(layout) = features.remove(LAYOUT_FEATURE) else {
        return decode_flat(features);
    };
    let doc = match layout.kind {
        Some(Kind::BytesList(list)) if list.value.len() == 1 => list.value.into_iter().next(),
        _ => None,
    }
    .ok_or_else(|| format!("'{LAYOUT_FEATURE}' must hold one JSON document"))?;
    let layout: Layout = serde_json::from_slice(&doc).map_err(|e| format!("layout: {e}"))?;

    match decode_layout(layout, &mut features)? {
        Value::Group(g) => Ok(g),
        other => Err(format!("layout root is a {}, expected a group", other.type_name())),
    }
}

fn decode_layout(
    layout: Layout,
    features: &mut HashMap<String, Feature>,
) -> std::result::Result<Value, String> {
    match layout {
        Layout::Group { children } => {
            let mut group = Group::new();
            for (key, child) in children {
                group.insert(key, decode_layout(child, features)?);
            }
            Ok(Value::Group(group))
        }
        Layout::List { items } => items
            .into_iter()
            .map(|item| decode_layout(item, features))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::List),
        Layout::Leaf {
            feature,
            dtype,
            shape,
        } => {
            let stored = features
                .remove(&feature)
                .ok_or_else(|| format!("feature '{feature}' is missing"))?;
            let data = decode_array(stored, dtype).map_err(|e| format!("{feature}: {e}"))?;
            let array = NdArray::new(shape, data).map_err(|e| format!("{feature}: {e}"))?;
            Ok(Value::from_array(array))
        }
    }
}

fn decode_array(feature: Feature, dtype: DType) -> std::result::Result<ArrayData, String> {
    fn narrow<T: TryFrom<i64>>(v: Vec<i64>) -> std::result::Result<Vec<T>, String> {
        v.into_iter()
            .map(|x| T::try_from(x).map_err(|_| format!("value {x} out of range")))
            .collect()
    }

    fn raw<const N: usize, T>(
        bytes: Vec<Vec<u8>>,
        from_le: fn([u8; N]) -> T,
    ) -> std::result::Result<Vec<T>, String> {
        let bytes = match <[Vec<u8>; 1]>::try_from(bytes) {
            Ok([b]) => b,
            Err(v) if v.is_empty() => Vec::new(),
            Err(_) => return Err("expected a single raw byte string".to_string()),
        };
        if bytes.len() % N != 0 {
            return Err(format!("{} raw bytes is not a multiple of {N}", bytes.len()));
        }
        Ok(bytes
            .chunks_exact(N)
            .map(|c| {
                let mut word = [0u8; N];
                word.copy_from_slice(c);
                from_le(word)
            })
            .collect())
    }

    let kind = feature.kind.ok_or_else(|| "feature has no value list".to_string())?;
    let data = match (dtype, kind) {
        (DType::Bool, Kind::Int64List(l)) => ArrayData::Bool(l.value.into_iter().map(|x| x != 0).collect()),
        (DType::Int8, Kind::Int64List(l)) => ArrayData::Int8(narrow(l.value)?),
        (DType::Int16, Kind::Int64List(l)) => ArrayData::Int16(narrow(l.value)?),
        (DType::Int32, Kind::Int64List(l)) => ArrayData::Int32(narrow(l.value)?),
        (DType::Int64, Kind::Int64List(l)) => ArrayData::Int64(l.value),
        (DType::UInt8, Kind::Int64List(l)) => ArrayData::UInt8(narrow(l.value)?),
        (DType::UInt16, Kind::Int64List(l)) => ArrayData::UInt16(narrow(l.value)?),
        (DType::UInt32, Kind::Int64List(l)) => ArrayData::UInt32(narrow(l.value)?),
        (DType::UInt64, Kind::BytesList(l)) => ArrayData::UInt64(raw(l.value, u64::from_le_bytes)?),
        (DType::Float32, Kind::FloatList(l)) => ArrayData::Float32(l.value),
        (DType::Float64, Kind::BytesList(l)) => ArrayData::Float64(raw(l.value, f64::from_le_bytes)?),
        (DType::String, Kind::BytesList(l)) => ArrayData::String(
            l.value
                .into_iter()
                .map(|b| String::from_utf8(b).map_err(|e| e.to_string()))
                .collect::<std::result::Result<_, _>>()?,
        ),
        (dtype, _) => return Err(format!("feature kind does not match element type {dtype}")),
    };
    Ok(data)
}

/// Records without a layout: one 1-D array per feature.
fn decode_flat(features: HashMap<String, Feature>) -> std::result::Result<Group, String> {
    let mut flat = BTreeMap::new();
    for (name, feature) in features {
        let data = match feature.kind {
            Some(Kind::FloatList(l)) => ArrayData::Float32(l.value),
            Some(Kind::Int64List(l)) => ArrayData::Int64(l.value),
            Some(Kind::BytesList(l)) => match l
                .value
                .iter()
                .map(|b| String::from_utf8(b.clone()))
                .collect::<std::result::Result<Vec<_>, _>>()
            {
                Ok(strings) => ArrayData::String(strings),
                Err(_) => ArrayData::UInt8(l.value.concat()),
            },
            None => continue,
        };
        flat.insert(name, Value::Array(NdArray::vector(data)));
    }
    Ok(unflatten(flat, "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "robodata_test_rlds_{}_{}",
            std::process::id(),
            name
        ))
    }

    fn step(t: i64) -> Value {
        let mut s = Group::new();
        s.insert(
            "observation".into(),
            Value::Array(NdArray::new(vec![2, 2], vec![t as f32, 0.5, 1.5, 2.5]).unwrap()),
        );
        s.insert("action".into(), Value::Array(NdArray::vector(vec![0.1f64 * t as f64, -1.0])));
        s.insert("reward".into(), Value::Float(0.25));
        s.insert("is_terminal".into(), Value::Bool(t == 1));
        Value::Group(s)
    }

    fn episode(id: i64) -> Group {
        let mut meta = Group::new();
        meta.insert("task".into(), Value::from("open_drawer"));
        meta.insert("seed".into(), Value::Array(NdArray::vector(vec![u64::MAX, 3])));

        let mut ep = Group::new();
        ep.insert("episode_id".into(), Value::Int(id));
        ep.insert("steps".into(), Value::List(vec![step(0), step(1)]));
        ep.insert("episode_metadata".into(), Value::Group(meta));
        ep.insert("joint_limits".into(), Value::Array(NdArray::vector(vec![-3i16, 3])));
        ep
    }

    #[test]
    fn test_round_trip_dataset() {
        let path = temp_path("dataset.tfrecord");
        let mut data = Group::new();
        data.insert(
            "episodes".into(),
            Value::List(vec![Value::Group(episode(0)), Value::Group(episode(1))]),
        );

        let c = RldsCodec::new(&path, true);
        c.save(&data, None).unwrap();
        let loaded = c.load().unwrap();

        let episodes = loaded["episodes"].as_list().unwrap();
        assert_eq!(episodes, &[Value::Group(episode(0)), Value::Group(episode(1))]);
        let meta = loaded["metadata"].as_group().unwrap();
        assert_eq!(meta["num_episodes"], Value::Int(2));
        assert_eq!(meta["format"], Value::from("rlds"));

        let record = c.metadata();
        assert_eq!(record.details["dataset_type"], "TFRecord");
        assert_eq!(record.details["num_records"], 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_bare_episode_is_one_record() {
        let path = temp_path("single.tfrecord");
        let c = RldsCodec::new(&path, true);
        c.save(&episode(5), None).unwrap();

        let loaded = c.load().unwrap();
        assert_eq!(loaded["episodes"].as_list().unwrap(), &[Value::Group(episode(5))]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_without_steps_fails() {
        let path = temp_path("no_steps.tfrecord");
        let mut g = Group::new();
        g.insert("observations".into(), Value::Int(1));

        let c = RldsCodec::new(&path, true);
        assert!(!c.validate(&g));
        let err = c.save(&g, None).unwrap_err();
        assert!(matches!(err, DataError::Persistence { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_fails_load() {
        let path = temp_path("corrupt.tfrecord");
        std::fs::write(&path, b"definitely not a tfrecord file").unwrap();
        assert!(RldsCodec::new(&path, true).load().unwrap_err().is_validation());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_flat_records_without_layout() {
        let mut feature = HashMap::new();
        feature.insert("steps/reward".to_string(), Feature::floats(vec![0.0, 1.0]));
        feature.insert("steps/action".to_string(), Feature::int64s(vec![2, 3]));
        feature.insert("name".to_string(), Feature::bytes(vec![b"ep0".to_vec()]));
        let example = Example {
            features: Some(Features { feature }),
        };
        let mut buf = Vec::new();
        tfrecord::write_record(&mut buf, &example.encode_to_vec()).unwrap();

        let path = temp_path("flat.tfrecord");
        std::fs::write(&path, buf).unwrap();
        let loaded = RldsCodec::new(&path, true).load().unwrap();
        let ep = loaded["episodes"].as_list().unwrap()[0].as_group().unwrap().clone();
        let steps = ep["steps"].as_group().unwrap();
        assert_eq!(steps["reward"].as_array().unwrap().data(), &ArrayData::Float32(vec![0.0, 1.0]));
        assert_eq!(ep["name"].as_array().unwrap().data(), &ArrayData::String(vec!["ep0".into()]));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_non_strict_allows_missing_steps() {
        let mut feature = HashMap::new();
        feature.insert("reward".to_string(), Feature::floats(vec![1.0]));
        let example = Example {
            features: Some(Features { feature }),
        };
        let mut buf = Vec::new();
        tfrecord::write_record(&mut buf, &example.encode_to_vec()).unwrap();

        let path = temp_path("lenient.tfrecord");
        std::fs::write(&path, buf).unwrap();
        assert!(RldsCodec::new(&path, true).load().unwrap_err().is_validation());
        assert!(RldsCodec::new(&path, false).load().is_ok());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_reserved_layout_key() {
        let mut rdm = Group::new();
        rdm.insert("layout".into(), Value::Int(1));
        let mut ep = episode(0);
        ep.insert("rdm".into(), Value::Group(rdm));
        assert!(encode_episode(&ep).is_err());
    }
}
