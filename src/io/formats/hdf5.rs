// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! HDF5 files, backed by the system HDF5 library.
//!
//! Groups map to HDF5 groups and leaves to datasets. Non-scalar datasets
//! are written chunked with gzip (deflate) compression at the configured
//! level; if the filter is unavailable the dataset is written uncompressed.
//! Strings are written variable-length UTF-8. Fixed-length ASCII and UTF-8
//! datasets, as written by h5py for NumPy `S` and `U` arrays, are read with
//! their NUL padding removed. Leaves that are not homogeneous arrays are
//! stored as string datasets.

use std::path::{Path, PathBuf};

use hdf5::types::{
    FixedAscii, FixedUnicode, FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode,
};
use hdf5::H5Type;

use crate::config::RdmConfig;
use crate::core::value::coerce_leaf;
use crate::core::{ArrayData, DataError, Group, NdArray, Result, Value, MAX_DEPTH};
use crate::io::metadata::MetadataRecord;
use crate::io::staging;
use crate::io::traits::{check_depth, require_exists, AccessMode, FormatCodec};
use crate::FileFormat;

/// Codec for `.h5` / `.hdf5` files.
#[derive(Debug, Clone)]
pub struct Hdf5Codec {
    path: PathBuf,
    compression: Option<u8>,
}

impl Hdf5Codec {
    /// Bind a codec to `path` with a deflate level (`None` disables it).
    pub fn new(path: impl Into<PathBuf>, compression: Option<u8>) -> Self {
        Self {
            path: path.into(),
            compression,
        }
    }

    /// Bind a codec, checking that the path exists when reading.
    pub fn open(path: &Path, mode: AccessMode, config: &RdmConfig) -> Result<Self> {
        require_exists(path, mode)?;
        Ok(Self::new(path, config.formats.hdf5.compression))
    }

    fn write_group(&self, parent: &hdf5::Group, group: &Group) -> std::result::Result<(), String> {
        for (key, value) in group {
            check_key(key)?;
            match value {
                Value::Group(inner) => {
                    let child = parent.create_group(key).map_err(|e| format!("{key}: {e}"))?;
                    self.write_group(&child, inner)?;
                }
                leaf => {
                    let coerced =
                        coerce_leaf(leaf, key).ok_or_else(|| format!("{key}: not a leaf"))?;
                    self.write_array(parent, key, &coerced.array)
                        .map_err(|e| format!("{key}: {e}"))?;
                }
            }
        }
        Ok(())
    }

    fn write_array(
        &self,
        parent: &hdf5::Group,
        name: &str,
        array: &NdArray,
    ) -> std::result::Result<(), String> {
        let shape = array.shape();
        let level = self.compression;
        let result = match array.data() {
            ArrayData::Bool(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::Int8(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::Int16(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::Int32(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::Int64(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::UInt8(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::UInt16(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::UInt32(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::UInt64(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::Float32(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::Float64(v) => write_dataset(parent, name, shape, v, level),
            ArrayData::String(v) => {
                let strings = v
                    .iter()
                    .map(|s| s.parse::<VarLenUnicode>().map_err(|e| e.to_string()))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                write_dataset(parent, name, shape, &strings, level)
            }
        };
        result.map_err(|e| e.to_string())
    }
}

impl FormatCodec for Hdf5Codec {
    fn format(&self) -> FileFormat {
        FileFormat::Hdf5
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Group> {
        let invalid = |msg: String| DataError::validation(FileFormat::Hdf5, &self.path, msg);
        let file = hdf5::File::open(&self.path).map_err(|e| invalid(e.to_string()))?;
        let data = read_group(&file, 1).map_err(invalid)?;

        tracing::info!(path = %self.path.display(), keys = data.len(), "Loaded HDF5 file");
        Ok(data)
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        let target = target.unwrap_or(&self.path);
        let persist = |msg: String| DataError::persistence(FileFormat::Hdf5, target, msg);

        check_depth(data).map_err(persist)?;
        staging::write_with(target, FileFormat::Hdf5, |staging| {
            let file = hdf5::File::create(staging).map_err(|e| persist(e.to_string()))?;
            self.write_group(&file, data).map_err(persist)?;
            file.close().map_err(|e| persist(e.to_string()))
        })?;

        tracing::info!(path = %target.display(), compression = ?self.compression, "Saved HDF5 file");
        Ok(())
    }

    fn validate(&self, data: &Group) -> bool {
        match check_depth(data).and_then(|_| check_keys(data)) {
            Ok(()) => true,
            Err(msg) => {
                tracing::warn!(path = %self.path.display(), reason = %msg, "HDF5 validation failed");
                false
            }
        }
    }

    fn metadata(&self) -> MetadataRecord {
        let mut record = MetadataRecord::for_path(&self.path, FileFormat::Hdf5);
        let (major, minor, patch) = hdf5::library_version();
        record.insert_detail("hdf5_version", format!("{major}.{minor}.{patch}"));
        if let Ok(file) = hdf5::File::open(&self.path) {
            let (groups, datasets) = count_members(&file);
            record.insert_detail("groups", groups);
            record.insert_detail("datasets", datasets);
        }
        record
    }
}

fn check_key(key: &str) -> std::result::Result<(), String> {
    if key.is_empty() || key == "." || key.contains('/') {
        return Err(format!("'{key}' is not a valid HDF5 link name"));
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

fn write_dataset<T: H5Type>(
    parent: &hdf5::Group,
    name: &str,
    shape: &[usize],
    data: &[T],
    level: Option<u8>,
) -> hdf5::Result<()> {
    if shape.is_empty() {
        let ds = parent.new_dataset::<T>().shape(()).create(name)?;
        return ds.write_raw(data);
    }

    // Chunked layouts need every dimension to be non-zero
    if let Some(level) = level.filter(|_| !shape.contains(&0)) {
        let compressed = parent
            .new_dataset::<T>()
            .shape(shape.to_vec())
            .chunk(shape.to_vec())
            .deflate(level)
            .create(name);
        match compressed {
            Ok(ds) => return ds.write_raw(data),
            Err(e) => tracing::warn!(
                dataset = name,
                error = %e,
                "Deflate filter unavailable, writing uncompressed"
            ),
        }
    }

    let ds = parent.new_dataset::<T>().shape(shape.to_vec()).create(name)?;
    ds.write_raw(data)
}

/// Final path component of an HDF5 object name.
fn base_name(full: &str) -> String {
    full.rsplit('/').next().unwrap_or(full).to_string()
}

fn read_group(group: &hdf5::Group, depth: usize) -> std::result::Result<Group, String> {
    if depth > MAX_DEPTH {
        return Err(format!("nesting deeper than {MAX_DEPTH} levels"));
    }

    let mut out = Group::new();
    for child in group.groups().map_err(|e| e.to_string())? {
        out.insert(base_name(&child.name()), Value::Group(read_group(&child, depth + 1)?));
    }
    for ds in group.datasets().map_err(|e| e.to_string())? {
        let name = base_name(&ds.name());
        let array = read_dataset(&ds).map_err(|e| format!("{name}: {e}"))?;
        out.insert(name, Value::from_array(array));
    }
    Ok(out)
}

/// Read a fixed-length string dataset through the narrowest buffer type
/// wider than `$len` bytes. HDF5 converts between string widths.
macro_rules! read_fixed {
    ($ds:expr, $ty:ident, $len:expr, [$($width:literal),+]) => {
        match $len {
            $(len if len < $width => $ds
                .read_raw::<$ty<$width>>()
                .map_err(|e| e.to_string())?
                .iter()
                .map(|s| s.as_str().trim_end_matches('\0').to_string())
                .collect::<Vec<String>>(),)+
            len => return Err(format!("fixed-length strings of {len} bytes are not supported")),
        }
    };
}

fn read_dataset(ds: &hdf5::Dataset) -> std::result::Result<NdArray, String> {
    let descriptor = ds
        .dtype()
        .and_then(|t| t.to_descriptor())
        .map_err(|e| e.to_string())?;
    let e = |e: hdf5::Error| e.to_string();

    let data = match descriptor {
        TypeDescriptor::Boolean => ArrayData::Bool(ds.read_raw::<bool>().map_err(e)?),
        TypeDescriptor::Integer(IntSize::U1) => ArrayData::Int8(ds.read_raw::<i8>().map_err(e)?),
        TypeDescriptor::Integer(IntSize::U2) => ArrayData::Int16(ds.read_raw::<i16>().map_err(e)?),
        TypeDescriptor::Integer(IntSize::U4) => ArrayData::Int32(ds.read_raw::<i32>().map_err(e)?),
        TypeDescriptor::Integer(IntSize::U8) => ArrayData::Int64(ds.read_raw::<i64>().map_err(e)?),
        TypeDescriptor::Unsigned(IntSize::U1) => ArrayData::UInt8(ds.read_raw::<u8>().map_err(e)?),
        TypeDescriptor::Unsigned(IntSize::U2) => {
            ArrayData::UInt16(ds.read_raw::<u16>().map_err(e)?)
        }
        TypeDescriptor::Unsigned(IntSize::U4) => {
            ArrayData::UInt32(ds.read_raw::<u32>().map_err(e)?)
        }
        TypeDescriptor::Unsigned(IntSize::U8) => {
            ArrayData::UInt64(ds.read_raw::<u64>().map_err(e)?)
        }
        TypeDescriptor::Float(FloatSize::U4) => {
            ArrayData::Float32(ds.read_raw::<f32>().map_err(e)?)
        }
        TypeDescriptor::Float(FloatSize::U8) => {
            ArrayData::Float64(ds.read_raw::<f64>().map_err(e)?)
        }
        TypeDescriptor::VarLenUnicode => ArrayData::String(
            ds.read_raw::<VarLenUnicode>()
                .map_err(e)?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::VarLenAscii => ArrayData::String(
            ds.read_raw::<VarLenAscii>()
                .map_err(e)?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::FixedAscii(len) => ArrayData::String(read_fixed!(
            ds,
            FixedAscii,
            len,
            [16, 64, 256, 1024, 4096, 16384]
        )),
        TypeDescriptor::FixedUnicode(len) => ArrayData::String(read_fixed!(
            ds,
            FixedUnicode,
            len,
            [16, 64, 256, 1024, 4096, 16384]
        )),
        other => return Err(format!("unsupported dataset type {other}")),
    };

    NdArray::new(ds.shape(), data).map_err(|e| e.to_string())
}

fn count_members(group: &hdf5::Group) -> (usize, usize) {
    let mut groups = 0;
    let mut datasets = group.datasets().map(|d| d.len()).unwrap_or(0);
    for child in group.groups().unwrap_or_default() {
        let (g, d) = count_members(&child);
        groups += 1 + g;
        datasets += d;
    }
    (groups, datasets)
}
