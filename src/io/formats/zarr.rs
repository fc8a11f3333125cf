// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Zarr v2 directory stores.
//!
//! Groups become directories holding a `.zgroup` document, leaves become
//! array directories holding `.zarray` metadata and chunk files. Writing
//! always produces a single chunk per array; reading accepts any regular
//! chunk grid, either byte order, and fills missing chunks with the array's
//! `fill_value`.
//!
//! Supported element types are `|b1 |i1 <i2 <i4 <i8 |u1 <u2 <u4 <u8 <f4
//! <f8` and `|O` strings encoded with the `vlen-utf8` filter. Chunks are
//! compressed with `zstd` or left raw. Leaves that cannot be stored as a
//! typed array are written as string arrays and marked with
//! `"coerced": "string"` in `.zattrs`.

use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::config::{RdmConfig, ZarrConfig};
use crate::core::value::coerce_leaf;
use crate::core::{ArrayData, DType, DataError, Group, NdArray, Result, Value, MAX_DEPTH};
use crate::io::metadata::MetadataRecord;
use crate::io::staging;
use crate::io::traits::{check_depth, require_exists, AccessMode, FormatCodec};
use crate::FileFormat;

const ZARR_FORMAT: u8 = 2;
const ZGROUP: &str = ".zgroup";
const ZARRAY: &str = ".zarray";
const ZATTRS: &str = ".zattrs";
const VLEN_UTF8: &str = "vlen-utf8";

/// Codec for `.zarr` directory stores.
#[derive(Debug, Clone)]
pub struct ZarrCodec {
    path: PathBuf,
    /// zstd level, or `None` for raw chunks
    level: Option<i32>,
}

impl ZarrCodec {
    /// Bind a codec to `path`.
    pub fn new(path: impl Into<PathBuf>, config: &ZarrConfig) -> Self {
        let level = match config.compression.as_str() {
            "none" => None,
            _ => Some(config.level),
        };
        Self {
            path: path.into(),
            level,
        }
    }

    /// Bind a codec, checking that the path exists when reading.
    pub fn open(path: &Path, mode: AccessMode, config: &RdmConfig) -> Result<Self> {
        require_exists(path, mode)?;
        Ok(Self::new(path, &config.formats.zarr))
    }

    fn write_group(&self, dir: &Path, group: &Group) -> std::result::Result<(), String> {
        std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        write_json(&dir.join(ZGROUP), &json!({ "zarr_format": ZARR_FORMAT }))?;

        for (key, value) in group {
            check_key(key)?;
            let child = dir.join(key);
            match value {
                Value::Group(inner) => self.write_group(&child, inner)?,
                leaf => {
                    let coerced =
                        coerce_leaf(leaf, key).ok_or_else(|| format!("{key}: not a leaf"))?;
                    self.write_array(&child, &coerced.array, coerced.lossy)
                        .map_err(|e| format!("{key}: {e}"))?;
                }
            }
        }
        Ok(())
    }

    fn write_array(
        &self,
        dir: &Path,
        array: &NdArray,
        lossy: bool,
    ) -> std::result::Result<(), String> {
        std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;

        let dtype = array.dtype();
        let meta = ArrayMeta {
            zarr_format: ZARR_FORMAT,
            shape: array.shape().to_vec(),
            chunks: array.shape().iter().map(|&d| d.max(1)).collect(),
            dtype: zarr_dtype(dtype).to_string(),
            compressor: self.level.map(|level| json!({ "id": "zstd", "level": level })),
            fill_value: default_fill(dtype),
            order: "C".to_string(),
            filters: (dtype == DType::String).then(|| vec![json!({ "id": VLEN_UTF8 })]),
            dimension_separator: Some(".".to_string()),
        };
        let text = serde_json::to_value(&meta).map_err(|e| e.to_string())?;
        write_json(&dir.join(ZARRAY), &text)?;

        if lossy {
            write_json(&dir.join(ZATTRS), &json!({ "coerced": "string" }))?;
        }

        if array.is_empty() {
            return Ok(());
        }

        let raw = encode_elements(array.data());
        let bytes = match self.level {
            Some(level) => zstd::bulk::compress(&raw, level).map_err(|e| e.to_string())?,
            None => raw,
        };
        let key = if array.ndim() == 0 {
            "0".to_string()
        } else {
            vec!["0"; array.ndim()].join(".")
        };
        std::fs::write(dir.join(key), bytes).map_err(|e| e.to_string())
    }
}

impl FormatCodec for ZarrCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Zarr
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Group> {
        let invalid = |msg: String| DataError::validation(FileFormat::Zarr, &self.path, msg);

        let data = if self.path.join(ZARRAY).is_file() {
            let array = read_array(&self.path).map_err(invalid)?;
            let mut g = Group::new();
            g.insert("data".to_string(), Value::from_array(array));
            g
        } else {
            read_group(&self.path, 1).map_err(invalid)?
        };

        tracing::info!(path = %self.path.display(), keys = data.len(), "Loaded Zarr store");
        Ok(data)
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        let target = target.unwrap_or(&self.path);
        let persist = |msg: String| DataError::persistence(FileFormat::Zarr, target, msg);

        check_depth(data).map_err(persist)?;
        staging::write_with(target, FileFormat::Zarr, |staging| {
            self.write_group(staging, data).map_err(persist)
        })?;

        tracing::info!(path = %target.display(), "Saved Zarr store");
        Ok(())
    }

    fn validate(&self, data: &Group) -> bool {
        match check_depth(data).and_then(|_| check_keys(data)) {
            Ok(()) => true,
            Err(msg) => {
                tracing::warn!(path = %self.path.display(), reason = %msg, "Zarr validation failed");
                false
            }
        }
    }

    fn metadata(&self) -> MetadataRecord {
        let mut record = MetadataRecord::for_path(&self.path, FileFormat::Zarr);
        if self.path.is_dir() {
            let groups = walkdir::WalkDir::new(&self.path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && e.file_name() == ZGROUP)
                .count();
            record.insert_detail("groups", groups);
            record.insert_detail("zarr_format", ZARR_FORMAT);
        }
        record
    }
}

// =============================================================================
// Metadata Documents
// =============================================================================

/// Contents of a `.zarray` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArrayMeta {
    zarr_format: u8,
    shape: Vec<usize>,
    chunks: Vec<usize>,
    dtype: String,
    compressor: Option<JsonValue>,
    fill_value: JsonValue,
    order: String,
    filters: Option<Vec<JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimension_separator: Option<String>,
}

fn write_json(path: &Path, doc: &JsonValue) -> std::result::Result<(), String> {
    let text = serde_json::to_vec_pretty(doc).map_err(|e| e.to_string())?;
    std::fs::write(path, text).map_err(|e| e.to_string())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> std::result::Result<T, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("{}: {e}", path.display()))
}

fn check_key(key: &str) -> std::result::Result<(), String> {
    if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
        return Err(format!("'{key}' is not a valid Zarr node name"));
    }
    Ok(())
}

fn check_keys(group: &Group) -> std::result::Result<(), String> {
    for (key, value) in group {
        check_key(key)?;
        if let Value::Group(inner) = value {
            check_keys(inner)?;
        }
    }
    Ok(())
}

fn zarr_dtype(dtype: DType) -> &'static str {
    match dtype {
        DType::Bool => "|b1",
        DType::Int8 => "|i1",
        DType::Int16 => "<i2",
        DType::Int32 => "<i4",
        DType::Int64 => "<i8",
        DType::UInt8 => "|u1",
        DType::UInt16 => "<u2",
        DType::UInt32 => "<u4",
        DType::UInt64 => "<u8",
        DType::Float32 => "<f4",
        DType::Float64 => "<f8",
        DType::String => "|O",
    }
}

/// Parse a Zarr dtype string into an element type and "is big endian".
fn parse_dtype(s: &str) -> Option<(DType, bool)> {
    let (order, code) = s.split_at_checked(1)?;
    let big_endian = match order {
        "<" | "|" => false,
        ">" => true,
        _ => return None,
    };
    let dtype = match code {
        "b1" => DType::Bool,
        "i1" => DType::Int8,
        "i2" => DType::Int16,
        "i4" => DType::Int32,
        "i8" => DType::Int64,
        "u1" => DType::UInt8,
        "u2" => DType::UInt16,
        "u4" => DType::UInt32,
        "u8" => DType::UInt64,
        "f4" => DType::Float32,
        "f8" => DType::Float64,
        "O" => DType::String,
        _ => return None,
    };
    Some((dtype, big_endian))
}

fn default_fill(dtype: DType) -> JsonValue {
    match dtype {
        DType::Bool => json!(false),
        DType::Float32 | DType::Float64 => json!(0.0),
        DType::String => JsonValue::Null,
        _ => json!(0),
    }
}

// =============================================================================
// Reading
// =============================================================================

fn read_group(dir: &Path, depth: usize) -> std::result::Result<Group, String> {
    if depth > MAX_DEPTH {
        return Err(format!("nesting deeper than {MAX_DEPTH} levels"));
    }
    if !dir.join(ZGROUP).is_file() {
        return Err(format!("{} has no {ZGROUP} document", dir.display()));
    }
    let zgroup: JsonValue = read_json(&dir.join(ZGROUP))?;
    if zgroup.get("zarr_format").and_then(JsonValue::as_u64) != Some(u64::from(ZARR_FORMAT)) {
        return Err(format!("{} is not a Zarr v2 group", dir.display()));
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| e.to_string())?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    let mut group = Group::new();
    for child in entries {
        let Some(name) = child.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if child.join(ZARRAY).is_file() {
            let array = read_array(&child).map_err(|e| format!("{name}: {e}"))?;
            group.insert(name, Value::from_array(array));
        } else if child.join(ZGROUP).is_file() {
            group.insert(name, Value::Group(read_group(&child, depth + 1)?));
        } else {
            tracing::debug!(path = %child.display(), "Skipping directory that is not a Zarr node");
        }
    }
    Ok(group)
}

fn read_array(dir: &Path) -> std::result::Result<NdArray, String> {
    let meta: ArrayMeta = read_json(&dir.join(ZARRAY))?;

    if meta.zarr_format != ZARR_FORMAT {
        return Err(format!("unsupported zarr_format {}", meta.zarr_format));
    }
    if meta.order != "C" {
        return Err(format!("unsupported memory order '{}'", meta.order));
    }
    if meta.chunks.len() != meta.shape.len() || meta.chunks.contains(&0) {
        return Err("chunk shape does not match array shape".to_string());
    }
    let (dtype, big_endian) =
        parse_dtype(&meta.dtype).ok_or_else(|| format!("unsupported dtype '{}'", meta.dtype))?;

    let filter_ids: Vec<&str> = meta
        .filters
        .iter()
        .flatten()
        .map(|f| f.get("id").and_then(JsonValue::as_str).unwrap_or(""))
        .collect();
    match (dtype, filter_ids.as_slice()) {
        (DType::String, [VLEN_UTF8]) => {}
        (DType::String, _) => return Err("object arrays require the vlen-utf8 filter".to_string()),
        (_, []) => {}
        (_, ids) => return Err(format!("unsupported filters {ids:?}")),
    }

    let compressed = match &meta.compressor {
        None | Some(JsonValue::Null) => false,
        Some(c) => match c.get("id").and_then(JsonValue::as_str) {
            Some("zstd") => true,
            other => return Err(format!("unsupported compressor {other:?}")),
        },
    };

    let total = checked_product(&meta.shape)
        .ok_or_else(|| format!("shape {:?} is too large", meta.shape))?;
    let chunk_len = checked_product(&meta.chunks)
        .ok_or_else(|| format!("chunk shape {:?} is too large", meta.chunks))?;
    if let Some(size) = dtype.size() {
        total
            .checked_mul(size)
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or_else(|| format!("shape {:?} is too large", meta.shape))?;
    }
    let mut out = filled(dtype, total, &meta.fill_value)?;

    let grid: Vec<usize> = meta
        .shape
        .iter()
        .zip(&meta.chunks)
        .map(|(&s, &c)| s.div_ceil(c))
        .collect();
    let separator = meta.dimension_separator.as_deref().unwrap_or(".");

    for (key, coords) in chunk_files(dir, separator, &grid)? {
        let stored = std::fs::read(dir.join(&key)).map_err(|e| format!("chunk {key}: {e}"))?;
        let raw = if compressed {
            zstd::stream::decode_all(stored.as_slice()).map_err(|e| format!("chunk {key}: {e}"))?
        } else {
            stored
        };
        let chunk = decode_elements(dtype, big_endian, &raw, chunk_len)
            .map_err(|e| format!("chunk {key}: {e}"))?;
        scatter(&mut out, chunk, &meta.shape, &meta.chunks, &coords)?;
    }

    NdArray::new(meta.shape, out).map_err(|e| e.to_string())
}

fn checked_product(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Chunk files present in an array directory, with their grid coordinates.
///
/// Names that are not a key inside `grid` are skipped.
fn chunk_files(
    dir: &Path,
    separator: &str,
    grid: &[usize],
) -> std::result::Result<Vec<(String, Vec<usize>)>, String> {
    let mut found = Vec::new();
    let walker = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(grid.len().max(1))
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| e.to_string())?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match parse_chunk_key(&key, separator, grid) {
            Some(coords) => found.push((key, coords)),
            None if key.starts_with('.') => {}
            None => tracing::debug!(path = %entry.path().display(), "Skipping file that is not a chunk"),
        }
    }
    Ok(found)
}

fn parse_chunk_key(key: &str, separator: &str, grid: &[usize]) -> Option<Vec<usize>> {
    if grid.is_empty() {
        return (key == "0").then(Vec::new);
    }
    let coords = key
        .split(separator)
        .map(|part| part.parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;
    let inside = coords.len() == grid.len() && coords.iter().zip(grid).all(|(c, g)| c < g);
    inside.then_some(coords)
}

/// Row-major coordinates of `index` within `dims`.
fn unravel(mut index: usize, dims: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    for d in (0..dims.len()).rev() {
        coords[d] = index % dims[d];
        index /= dims[d];
    }
    coords
}

fn repeat<T: Clone>(item: T, len: usize) -> std::result::Result<Vec<T>, String> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|e| format!("cannot allocate {len} elements: {e}"))?;
    v.resize(len, item);
    Ok(v)
}

/// Storage of `len` copies of the fill value.
fn filled(dtype: DType, len: usize, fill: &JsonValue) -> std::result::Result<ArrayData, String> {
    let int = fill.as_i64().unwrap_or(0);
    let float = match fill {
        JsonValue::String(s) if s == "NaN" => f64::NAN,
        JsonValue::String(s) if s == "Infinity" => f64::INFINITY,
        JsonValue::String(s) if s == "-Infinity" => f64::NEG_INFINITY,
        other => other.as_f64().unwrap_or(0.0),
    };
    Ok(match dtype {
        DType::Bool => ArrayData::Bool(repeat(fill.as_bool().unwrap_or(int != 0), len)?),
        DType::Int8 => ArrayData::Int8(repeat(int as i8, len)?),
        DType::Int16 => ArrayData::Int16(repeat(int as i16, len)?),
        DType::Int32 => ArrayData::Int32(repeat(int as i32, len)?),
        DType::Int64 => ArrayData::Int64(repeat(int, len)?),
        DType::UInt8 => ArrayData::UInt8(repeat(int as u8, len)?),
        DType::UInt16 => ArrayData::UInt16(repeat(int as u16, len)?),
        DType::UInt32 => ArrayData::UInt32(repeat(int as u32, len)?),
        DType::UInt64 => ArrayData::UInt64(repeat(fill.as_u64().unwrap_or(0), len)?),
        DType::Float32 => ArrayData::Float32(repeat(float as f32, len)?),
        DType::Float64 => ArrayData::Float64(repeat(float, len)?),
        DType::String => ArrayData::String(repeat(fill.as_str().unwrap_or("").to_string(), len)?),
    })
}

/// Copy a decoded chunk into its place in the full array, clipping edges.
fn scatter(
    out: &mut ArrayData,
    chunk: ArrayData,
    shape: &[usize],
    chunks: &[usize],
    coords: &[usize],
) -> std::result::Result<(), String> {
    fn copy<T: Clone>(out: &mut [T], chunk: &[T], shape: &[usize], chunks: &[usize], coords: &[usize]) {
        for (local, item) in chunk.iter().enumerate() {
            let pos = unravel(local, chunks);
            let mut flat = 0;
            let mut inside = true;
            for d in 0..shape.len() {
                let g = coords[d] * chunks[d] + pos[d];
                if g >= shape[d] {
                    inside = false;
                    break;
                }
                flat = flat * shape[d] + g;
            }
            if inside {
                out[flat] = item.clone();
            }
        }
    }

    match (out, &chunk) {
        (ArrayData::Bool(o), ArrayData::Bool(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::Int8(o), ArrayData::Int8(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::Int16(o), ArrayData::Int16(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::Int32(o), ArrayData::Int32(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::Int64(o), ArrayData::Int64(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::UInt8(o), ArrayData::UInt8(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::UInt16(o), ArrayData::UInt16(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::UInt32(o), ArrayData::UInt32(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::UInt64(o), ArrayData::UInt64(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::Float32(o), ArrayData::Float32(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::Float64(o), ArrayData::Float64(c)) => copy(o, c, shape, chunks, coords),
        (ArrayData::String(o), ArrayData::String(c)) => copy(o, c, shape, chunks, coords),
        _ => return Err("chunk element type does not match array".to_string()),
    }
    Ok(())
}

// =============================================================================
// Element Encoding
// =============================================================================

fn encode_elements(data: &ArrayData) -> Vec<u8> {
    fn fixed<T: Copy>(v: &[T], size: usize, write: fn(&[T], &mut [u8])) -> Vec<u8> {
        let mut buf = vec![0u8; v.len() * size];
        write(v, &mut buf);
        buf
    }

    match data {
        ArrayData::Bool(v) => v.iter().map(|&b| u8::from(b)).collect(),
        ArrayData::Int8(v) => v.iter().map(|&x| x as u8).collect(),
        ArrayData::UInt8(v) => v.clone(),
        ArrayData::Int16(v) => fixed(v, 2, LittleEndian::write_i16_into),
        ArrayData::Int32(v) => fixed(v, 4, LittleEndian::write_i32_into),
        ArrayData::Int64(v) => fixed(v, 8, LittleEndian::write_i64_into),
        ArrayData::UInt16(v) => fixed(v, 2, LittleEndian::write_u16_into),
        ArrayData::UInt32(v) => fixed(v, 4, LittleEndian::write_u32_into),
        ArrayData::UInt64(v) => fixed(v, 8, LittleEndian::write_u64_into),
        ArrayData::Float32(v) => fixed(v, 4, LittleEndian::write_f32_into),
        ArrayData::Float64(v) => fixed(v, 8, LittleEndian::write_f64_into),
        ArrayData::String(v) => encode_vlen_utf8(v),
    }
}

fn decode_elements(
    dtype: DType,
    big_endian: bool,
    raw: &[u8],
    len: usize,
) -> std::result::Result<ArrayData, String> {
    if let Some(size) = dtype.size() {
        if len.checked_mul(size) != Some(raw.len()) {
            return Err(format!(
                "expected {len} elements of {size} bytes, found {} bytes",
                raw.len()
            ));
        }
    }

    macro_rules! read_into {
        ($ty:ty, $variant:ident, $method:ident) => {{
            let mut v: Vec<$ty> = vec![Default::default(); len];
            if big_endian {
                BigEndian::$method(raw, &mut v);
            } else {
                LittleEndian::$method(raw, &mut v);
            }
            ArrayData::$variant(v)
        }};
    }

    Ok(match dtype {
        DType::Bool => ArrayData::Bool(raw.iter().map(|&b| b != 0).collect()),
        DType::Int8 => ArrayData::Int8(raw.iter().map(|&b| b as i8).collect()),
        DType::UInt8 => ArrayData::UInt8(raw.to_vec()),
        DType::Int16 => read_into!(i16, Int16, read_i16_into),
        DType::Int32 => read_into!(i32, Int32, read_i32_into),
        DType::Int64 => read_into!(i64, Int64, read_i64_into),
        DType::UInt16 => read_into!(u16, UInt16, read_u16_into),
        DType::UInt32 => read_into!(u32, UInt32, read_u32_into),
        DType::UInt64 => read_into!(u64, UInt64, read_u64_into),
        DType::Float32 => read_into!(f32, Float32, read_f32_into),
        DType::Float64 => read_into!(f64, Float64, read_f64_into),
        DType::String => ArrayData::String(decode_vlen_utf8(raw, len)?),
    })
}

/// `vlen-utf8`: item count, then a length-prefixed UTF-8 string per item.
fn encode_vlen_utf8(items: &[String]) -> Vec<u8> {
    let total: usize = items.iter().map(|s| 4 + s.len()).sum();
    let mut buf = Vec::with_capacity(4 + total);
    buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
    for s in items {
        buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        buf.extend_from_slice(s.as_bytes());
    }
    buf
}

fn decode_vlen_utf8(raw: &[u8], len: usize) -> std::result::Result<Vec<String>, String> {
    let truncated = || "truncated vlen-utf8 chunk".to_string();
    if raw.len() < 4 {
        return Err(truncated());
    }
    let count = LittleEndian::read_u32(&raw[..4]) as usize;
    if count != len {
        return Err(format!("expected {len} strings, found {count}"));
    }

    // Each item takes at least its 4-byte length prefix
    let mut items = Vec::with_capacity(count.min(raw.len() / 4));
    let mut pos = 4;
    for _ in 0..count {
        let header = raw.get(pos..pos + 4).ok_or_else(truncated)?;
        let n = LittleEndian::read_u32(header) as usize;
        pos += 4;
        let bytes = raw.get(pos..pos.saturating_add(n)).ok_or_else(truncated)?;
        items.push(String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())?);
        pos += n;
    }
    Ok(items)
}
