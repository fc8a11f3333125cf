// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout robodata.
//!
//! This module provides the foundational types for the library:
//! - [`DataError`] - Error taxonomy shared by every codec
//! - [`Value`] - Hierarchical value model
//! - [`FormatRegistry`] - Loader and converter bindings
//! - [`FileFormat`] - On-disk format identifier

pub mod error;
pub mod registry;
pub mod value;

pub use error::{DataError, ErrorKind, Result};
pub use registry::{ConverterFactory, DataConverter, FormatRegistry, LoaderFactory};
pub use value::{ArrayData, DType, Group, NdArray, Value, MAX_DEPTH};

/// On-disk format identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileFormat {
    /// Hierarchical binary container (HDF5)
    Hdf5,
    /// Chunked array directory store (Zarr v2)
    Zarr,
    /// Reinforcement-learning episode records (TFRecord)
    Rlds,
    /// Episodic robot dataset (JSON episodes)
    LeRobot,
    /// Plain JSON document
    Json,
    /// Python pickle
    Pickle,
    /// NumPy `.npy` / `.npz`
    Numpy,
    /// Resolve from the path suffix
    Auto,
}

/// Error returned when parsing a `FileFormat` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseFormatError {
    _private: (),
}

impl std::fmt::Display for ParseFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid format name, expected one of 'hdf5', 'zarr', 'rlds', 'lerobot', \
             'json', 'pickle', 'numpy' or 'auto'"
        )
    }
}

impl std::error::Error for ParseFormatError {}

impl std::str::FromStr for FileFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hdf5" => Ok(FileFormat::Hdf5),
            "zarr" => Ok(FileFormat::Zarr),
            "rlds" => Ok(FileFormat::Rlds),
            "lerobot" => Ok(FileFormat::LeRobot),
            "json" => Ok(FileFormat::Json),
            "pickle" => Ok(FileFormat::Pickle),
            "numpy" => Ok(FileFormat::Numpy),
            "auto" => Ok(FileFormat::Auto),
            _ => Err(ParseFormatError { _private: () }),
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FileFormat {
    /// Every concrete format, in declaration order.
    pub const ALL: [FileFormat; 7] = [
        FileFormat::Hdf5,
        FileFormat::Zarr,
        FileFormat::Rlds,
        FileFormat::LeRobot,
        FileFormat::Json,
        FileFormat::Pickle,
        FileFormat::Numpy,
    ];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Hdf5 => "hdf5",
            FileFormat::Zarr => "zarr",
            FileFormat::Rlds => "rlds",
            FileFormat::LeRobot => "lerobot",
            FileFormat::Json => "json",
            FileFormat::Pickle => "pickle",
            FileFormat::Numpy => "numpy",
            FileFormat::Auto => "auto",
        }
    }

    /// Check if this is the `Auto` placeholder.
    pub fn is_auto(&self) -> bool {
        matches!(self, FileFormat::Auto)
    }

    /// Suffixes (without the dot) that batch conversion selects for this format.
    ///
    /// `Auto` has no extensions of its own; batch conversion uses the
    /// detection table instead.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileFormat::Hdf5 => &["h5", "hdf5"],
            FileFormat::Zarr => &["zarr"],
            FileFormat::Rlds => &["tfrecord"],
            FileFormat::LeRobot => &["json"],
            FileFormat::Json => &["json"],
            FileFormat::Pickle => &["pkl", "pickle"],
            FileFormat::Numpy => &["npy", "npz"],
            FileFormat::Auto => &[],
        }
    }

    /// Suffix (without the dot) given to files written in this format.
    pub fn canonical_extension(&self) -> &'static str {
        match self {
            FileFormat::Hdf5 | FileFormat::Auto => "h5",
            FileFormat::Zarr => "zarr",
            FileFormat::Rlds => "tfrecord",
            FileFormat::LeRobot | FileFormat::Json => "json",
            FileFormat::Pickle => "pkl",
            FileFormat::Numpy => "npy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("HDF5".parse::<FileFormat>(), Ok(FileFormat::Hdf5));
        assert_eq!("LeRobot".parse::<FileFormat>(), Ok(FileFormat::LeRobot));
        assert_eq!("auto".parse::<FileFormat>(), Ok(FileFormat::Auto));
        assert!("parquet".parse::<FileFormat>().is_err());
    }

    #[test]
    fn test_as_str_round_trip() {
        for format in FileFormat::ALL {
            assert_eq!(format.as_str().parse::<FileFormat>(), Ok(format));
            assert_eq!(format.to_string(), format.as_str());
        }
    }

    #[test]
    fn test_canonical_extension_is_selected() {
        for format in FileFormat::ALL {
            assert!(format
                .extensions()
                .contains(&format.canonical_extension()));
        }
    }
}
