// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! NumPy `.npy` and `.npz` files.
//!
//! A value that is exactly `{"data": <array>}` is written as a single
//! `.npy` array. Anything else is written as an `.npz` archive with one
//! member per leaf, nested keys joined with `/`. Loading sniffs the zip
//! signature, so an archive saved under a `.npy` name still loads.
//!
//! Every numeric and boolean element type round-trips exactly; scalars are
//! stored as zero-dimensional arrays and load back as scalars. Strings are
//! stored as `<U{n}` arrays.

mod strings;

use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::{NumpyConfig, RdmConfig};
use crate::core::value::{coerce_leaf, flatten, unflatten};
use crate::core::{ArrayData, DataError, Group, NdArray, Result, Value};
use crate::io::metadata::MetadataRecord;
use crate::io::staging;
use crate::io::traits::{check_depth, require_exists, AccessMode, FormatCodec};
use crate::FileFormat;

/// Separator for nested keys inside an `.npz` archive.
pub const KEY_SEPARATOR: &str = "/";

const ZIP_MAGIC: &[u8] = b"PK";
const DATA_KEY: &str = "data";

/// Codec for `.npy` / `.npz` files.
#[derive(Debug, Clone)]
pub struct NumpyCodec {
    path: PathBuf,
    config: NumpyConfig,
}

impl NumpyCodec {
    /// Bind a codec to `path`.
    pub fn new(path: impl Into<PathBuf>, config: NumpyConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Bind a codec, checking that the path exists when reading.
    pub fn open(path: &Path, mode: AccessMode, config: &RdmConfig) -> Result<Self> {
        require_exists(path, mode)?;
        Ok(Self::new(path, config.formats.numpy.clone()))
    }

    fn read(&self) -> Result<Group> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| DataError::validation(FileFormat::Numpy, &self.path, e.to_string()))?;
        let result = if bytes.starts_with(ZIP_MAGIC) {
            read_npz(Cursor::new(bytes))
        } else {
            decode_npy(&bytes).map(|array| {
                let mut g = Group::new();
                g.insert(DATA_KEY.to_string(), Value::from_array(array));
                g
            })
        };
        result.map_err(|msg| DataError::validation(FileFormat::Numpy, &self.path, msg))
    }

    fn encode(&self, data: &Group, target: &Path) -> std::result::Result<Vec<u8>, String> {
        check_depth(data)?;
        let arrays = collect_arrays(data)?;

        let wants_npz = target
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("npz"));
        match arrays.as_slice() {
            [(key, array)] if key == DATA_KEY && !wants_npz => encode_npy(array),
            _ => encode_npz(&arrays, self.config.compressed),
        }
    }
}

impl FormatCodec for NumpyCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Numpy
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Group> {
        let data = self.read()?;
        tracing::info!(path = %self.path.display(), keys = data.len(), "Loaded NumPy data");
        Ok(data)
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        let target = target.unwrap_or(&self.path);
        let bytes = self
            .encode(data, target)
            .map_err(|msg| DataError::persistence(FileFormat::Numpy, target, msg))?;
        staging::write_file(target, FileFormat::Numpy, &bytes)?;
        tracing::info!(path = %target.display(), "Saved NumPy data");
        Ok(())
    }

    fn validate(&self, data: &Group) -> bool {
        match check_depth(data).and_then(|_| collect_arrays(data).map(|_| ())) {
            Ok(()) => true,
            Err(msg) => {
                tracing::warn!(path = %self.path.display(), reason = %msg, "NumPy validation failed");
                false
            }
        }
    }

    fn metadata(&self) -> MetadataRecord {
        let mut record = MetadataRecord::for_path(&self.path, FileFormat::Numpy);
        if let Ok(bytes) = std::fs::read(&self.path) {
            let container = if bytes.starts_with(ZIP_MAGIC) { "npz" } else { "npy" };
            record.insert_detail("container", container);
        }
        if let Ok(data) = self.read() {
            let names: Vec<serde_json::Value> = flatten(&data, KEY_SEPARATOR)
                .into_keys()
                .map(serde_json::Value::from)
                .collect();
            record.insert_detail("arrays", names);
        }
        record
    }
}

/// Flatten a value into named arrays.
fn collect_arrays(data: &Group) -> std::result::Result<Vec<(String, NdArray)>, String> {
    let mut arrays = Vec::new();
    for (key, leaf) in flatten(data, KEY_SEPARATOR) {
        let coerced = coerce_leaf(&leaf, &key).ok_or_else(|| format!("{key}: not an array"))?;
        arrays.push((key, coerced.array));
    }
    Ok(arrays)
}

// =============================================================================
// Reading
// =============================================================================

fn from_ndarray<T>(array: ArrayD<T>) -> std::result::Result<NdArray, String>
where
    T: Clone,
    Vec<T>: Into<ArrayData>,
{
    let shape = array.shape().to_vec();
    let data: Vec<T> = array.iter().cloned().collect();
    NdArray::new(shape, data).map_err(|e| e.to_string())
}

fn decode_npy(bytes: &[u8]) -> std::result::Result<NdArray, String> {
    if let Some((shape, text)) = strings::decode(bytes)? {
        return NdArray::new(shape, text).map_err(|e| e.to_string());
    }

    let mut cursor = Cursor::new(bytes);
    macro_rules! attempt {
        ($($ty:ty),*) => {
            $(
                cursor.set_position(0);
                if let Ok(array) = ArrayD::<$ty>::read_npy(&mut cursor) {
                    return from_ndarray(array);
                }
            )*
        };
    }
    attempt!(f64, f32, i64, i32, i16, i8, u64, u32, u16, u8, bool);

    Err("unsupported dtype or invalid .npy data".to_string())
}

fn read_npz<R: Read + Seek>(reader: R) -> std::result::Result<Group, String> {
    let mut archive =
        ZipArchive::new(reader).map_err(|e| format!("failed to read npz archive: {e}"))?;

    let mut flat = std::collections::BTreeMap::new();
    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(|e| e.to_string())?;
        if member.is_dir() {
            continue;
        }
        let name = member.name().to_string();
        let mut bytes = Vec::new();
        member
            .read_to_end(&mut bytes)
            .map_err(|e| format!("{name}: {e}"))?;
        let array = decode_npy(&bytes).map_err(|e| format!("{name}: {e}"))?;
        let key = name.strip_suffix(".npy").unwrap_or(&name).to_string();
        flat.insert(key, Value::from_array(array));
    }
    Ok(unflatten(flat, KEY_SEPARATOR))
}

// =============================================================================
// Writing
// =============================================================================

fn to_ndarray<T>(shape: &[usize], data: &[T]) -> std::result::Result<ArrayD<T>, String>
where
    T: Clone,
{
    ArrayD::from_shape_vec(IxDyn(shape), data.to_vec()).map_err(|e| e.to_string())
}

fn write_npy<T>(shape: &[usize], data: &[T]) -> std::result::Result<Vec<u8>, String>
where
    T: Clone + ndarray_npy::WritableElement,
{
    let mut buf = Vec::new();
    to_ndarray(shape, data)?
        .write_npy(&mut buf)
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

fn encode_npy(array: &NdArray) -> std::result::Result<Vec<u8>, String> {
    let shape = array.shape();
    match array.data() {
        ArrayData::Bool(v) => write_npy(shape, v),
        ArrayData::Int8(v) => write_npy(shape, v),
        ArrayData::Int16(v) => write_npy(shape, v),
        ArrayData::Int32(v) => write_npy(shape, v),
        ArrayData::Int64(v) => write_npy(shape, v),
        ArrayData::UInt8(v) => write_npy(shape, v),
        ArrayData::UInt16(v) => write_npy(shape, v),
        ArrayData::UInt32(v) => write_npy(shape, v),
        ArrayData::UInt64(v) => write_npy(shape, v),
        ArrayData::Float32(v) => write_npy(shape, v),
        ArrayData::Float64(v) => write_npy(shape, v),
        ArrayData::String(v) => strings::encode(shape, v),
    }
}

fn encode_npz(
    arrays: &[(String, NdArray)],
    compressed: bool,
) -> std::result::Result<Vec<u8>, String> {
    let method = if compressed {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, array) in arrays {
        let bytes = encode_npy(array).map_err(|e| format!("{name}: {e}"))?;
        let options = SimpleFileOptions::default()
            .compression_method(method)
            .large_file(bytes.len() >= u32::MAX as usize);
        zip.start_file(format!("{name}.npy"), options)
            .map_err(|e| format!("{name}: {e}"))?;
        zip.write_all(&bytes).map_err(|e| format!("{name}: {e}"))?;
    }
    let cursor = zip.finish().map_err(|e| e.to_string())?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "robodata_test_numpy_{}_{}",
            std::process::id(),
            name
        ))
    }

    fn codec(path: &Path) -> NumpyCodec {
        NumpyCodec::new(path, NumpyConfig::default())
    }

    #[test]
    fn test_single_array_writes_npy() {
        let path = temp_path("single.npy");
        let mut g = Group::new();
        g.insert(
            "data".into(),
            Value::Array(NdArray::new(vec![2, 2], vec![1u16, 2, 3, 4]).unwrap()),
        );

        let c = codec(&path);
        c.save(&g, None).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x93NUMPY"));
        assert_eq!(c.load().unwrap(), g);
        assert_eq!(c.metadata().details["container"], "npy");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_nested_value_writes_npz() {
        let path = temp_path("nested.npy");
        let mut meta = Group::new();
        meta.insert("episode_length".into(), Value::Int(3));
        meta.insert("success".into(), Value::Bool(true));

        let mut g = Group::new();
        g.insert(
            "observations".into(),
            Value::Array(NdArray::new(vec![3, 2], vec![0.5f32; 6]).unwrap()),
        );
        g.insert("ids".into(), Value::Array(NdArray::vector(vec![7i8, 8, 9])));
        g.insert("metadata".into(), Value::Group(meta));

        let c = codec(&path);
        c.save(&g, None).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert_eq!(c.load().unwrap(), g);

        let record = c.metadata();
        assert_eq!(record.details["container"], "npz");
        assert_eq!(record.details["arrays"].as_array().unwrap().len(), 4);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_uncompressed_npz() {
        let path = temp_path("plain.npz");
        let mut g = Group::new();
        g.insert("data".into(), Value::Array(NdArray::vector(vec![1.0f64, 2.0])));

        let c = NumpyCodec::new(&path, NumpyConfig { compressed: false });
        c.save(&g, None).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"PK"));
        assert_eq!(c.load().unwrap(), g);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_lists_are_coerced() {
        let path = temp_path("lists.npz");
        let mut g = Group::new();
        g.insert(
            "rewards".into(),
            Value::List(vec![Value::Float(0.0), Value::Float(1.0)]),
        );

        let c = codec(&path);
        c.save(&g, None).unwrap();
        let loaded = c.load().unwrap();
        assert_eq!(
            loaded["rewards"].as_array().unwrap().data(),
            &ArrayData::Float64(vec![0.0, 1.0])
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_strings_round_trip() {
        let path = temp_path("strings.npz");
        let mut meta = Group::new();
        meta.insert("task".into(), Value::from("pick_and_place"));
        meta.insert("episode_length".into(), Value::Int(100));

        let mut g = Group::new();
        g.insert("metadata".into(), Value::Group(meta));
        g.insert(
            "labels".into(),
            Value::Array(NdArray::vector(vec!["grasp".to_string(), "lift".to_string()])),
        );

        let c = codec(&path);
        assert!(c.validate(&g));
        c.save(&g, None).unwrap();
        assert_eq!(c.load().unwrap(), g);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_single_string_array_writes_npy() {
        let path = temp_path("names.npy");
        let mut g = Group::new();
        g.insert(
            "data".into(),
            Value::Array(
                NdArray::new(
                    vec![2, 2],
                    vec!["a".to_string(), "bb".to_string(), "".to_string(), "dddd".to_string()],
                )
                .unwrap(),
            ),
        );

        let c = codec(&path);
        c.save(&g, None).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x93NUMPY"));
        assert!(String::from_utf8_lossy(&bytes[..128]).contains("'<U4'"));
        assert_eq!(c.load().unwrap(), g);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_garbage_fails_load() {
        let path = temp_path("garbage.npy");
        std::fs::write(&path, b"definitely not numpy").unwrap();
        assert!(codec(&path).load().unwrap_err().is_validation());
        let _ = std::fs::remove_file(&path);
    }
}
