// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Built-in format codecs.
//!
//! - [`hdf5`]: HDF5 files (requires the `hdf5` feature)
//! - [`zarr`]: Zarr v2 directory stores
//! - [`rlds`]: RLDS episodes in TFRecord files
//! - [`lerobot`]: LeRobot JSON episodes
//! - [`json`]: plain JSON documents
//! - [`pickle`]: Python pickle files
//! - [`numpy`]: `.npy` arrays and `.npz` archives

#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod json;
pub mod lerobot;
pub mod numpy;
pub mod pickle;
pub mod rlds;
pub mod zarr;

use std::path::Path;

use crate::config::RdmConfig;
use crate::core::{DataError, Group, Result};
use crate::io::metadata::MetadataRecord;
use crate::io::traits::{AccessMode, FormatCodec};
use crate::FileFormat;

#[cfg(feature = "hdf5")]
pub use self::hdf5::Hdf5Codec;
pub use json::JsonCodec;
pub use lerobot::LeRobotCodec;
pub use numpy::NumpyCodec;
pub use pickle::PickleCodec;
pub use rlds::RldsCodec;
pub use zarr::ZarrCodec;

/// A built-in codec bound to one path.
#[derive(Debug, Clone)]
pub enum Codec {
    #[cfg(feature = "hdf5")]
    Hdf5(Hdf5Codec),
    Zarr(ZarrCodec),
    Rlds(RldsCodec),
    LeRobot(LeRobotCodec),
    Json(JsonCodec),
    Pickle(PickleCodec),
    Numpy(NumpyCodec),
}

macro_rules! dispatch {
    ($self:expr, $codec:ident => $body:expr) => {
        match $self {
            #[cfg(feature = "hdf5")]
            Codec::Hdf5($codec) => $body,
            Codec::Zarr($codec) => $body,
            Codec::Rlds($codec) => $body,
            Codec::LeRobot($codec) => $body,
            Codec::Json($codec) => $body,
            Codec::Pickle($codec) => $body,
            Codec::Numpy($codec) => $body,
        }
    };
}

impl Codec {
    /// Bind the built-in codec for `format` to `path`.
    ///
    /// Fails with [`DataError::UnregisteredFormat`] for `Auto` and for
    /// formats not compiled into this build.
    pub fn open(format: FileFormat, path: &Path, mode: AccessMode, config: &RdmConfig) -> Result<Self> {
        Ok(match format {
            #[cfg(feature = "hdf5")]
            FileFormat::Hdf5 => Codec::Hdf5(Hdf5Codec::open(path, mode, config)?),
            FileFormat::Zarr => Codec::Zarr(ZarrCodec::open(path, mode, config)?),
            FileFormat::Rlds => Codec::Rlds(RldsCodec::open(path, mode, config)?),
            FileFormat::LeRobot => Codec::LeRobot(LeRobotCodec::open(path, mode, config)?),
            FileFormat::Json => Codec::Json(JsonCodec::open(path, mode, config)?),
            FileFormat::Pickle => Codec::Pickle(PickleCodec::open(path, mode, config)?),
            FileFormat::Numpy => Codec::Numpy(NumpyCodec::open(path, mode, config)?),
            other => return Err(DataError::unregistered_loader(other)),
        })
    }

    /// Formats with a built-in codec in this build.
    pub fn available_formats() -> Vec<FileFormat> {
        FileFormat::ALL
            .into_iter()
            .filter(|f| cfg!(feature = "hdf5") || *f != FileFormat::Hdf5)
            .collect()
    }
}

impl FormatCodec for Codec {
    fn format(&self) -> FileFormat {
        dispatch!(self, c => c.format())
    }

    fn path(&self) -> &Path {
        dispatch!(self, c => c.path())
    }

    fn load(&self) -> Result<Group> {
        dispatch!(self, c => c.load())
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        dispatch!(self, c => c.save(data, target))
    }

    fn validate(&self, data: &Group) -> bool {
        dispatch!(self, c => c.validate(data))
    }

    fn metadata(&self) -> MetadataRecord {
        dispatch!(self, c => c.metadata())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_has_no_codec() {
        let err = Codec::open(
            FileFormat::Auto,
            Path::new("x.dat"),
            AccessMode::Write,
            &RdmConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::UnregisteredFormat { .. }));
    }

    #[test]
    fn test_open_binds_format() {
        let config = RdmConfig::default();
        for format in Codec::available_formats() {
            let codec = Codec::open(format, Path::new("out.bin"), AccessMode::Write, &config).unwrap();
            assert_eq!(codec.format(), format);
            assert_eq!(codec.path(), Path::new("out.bin"));
        }
    }

    #[test]
    fn test_read_requires_existing_path() {
        let err = Codec::open(
            FileFormat::Json,
            Path::new("/nonexistent/robodata/in.json"),
            AccessMode::Read,
            &RdmConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::PathNotFound { .. }));
    }

    #[test]
    fn test_available_formats() {
        let formats = Codec::available_formats();
        assert!(formats.contains(&FileFormat::Zarr));
        assert!(!formats.contains(&FileFormat::Auto));
        assert_eq!(formats.contains(&FileFormat::Hdf5), cfg!(feature = "hdf5"));
    }
}
