// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Format detection from path suffixes.
//!
//! Detection looks only at the final suffix of the path, compared
//! case-insensitively against a static table. It never opens the file and
//! never consults the registry, so the same path always yields the same
//! format. Paths with an unknown suffix, or none, fall back to
//! [`DEFAULT_FORMAT`].
//!
//! # Example
//!
//! ```rust
//! use robodata::io::detection::detect_format;
//! use robodata::FileFormat;
//!
//! assert_eq!(detect_format("episode_0.zarr"), FileFormat::Zarr);
//! assert_eq!(detect_format("EPISODE.NPZ"), FileFormat::Numpy);
//! assert_eq!(detect_format("notes.txt"), FileFormat::Hdf5);
//! ```

use std::path::Path;

use crate::FileFormat;

/// Format assumed for paths whose suffix is not in the table.
pub const DEFAULT_FORMAT: FileFormat = FileFormat::Hdf5;

/// Suffix to format table (suffixes without the dot, lowercase).
pub const EXTENSION_TABLE: &[(&str, FileFormat)] = &[
    ("h5", FileFormat::Hdf5),
    ("hdf5", FileFormat::Hdf5),
    ("zarr", FileFormat::Zarr),
    ("json", FileFormat::Json),
    ("pkl", FileFormat::Pickle),
    ("pickle", FileFormat::Pickle),
    ("npy", FileFormat::Numpy),
    ("npz", FileFormat::Numpy),
];

/// Detect the format of a path from its suffix.
pub fn detect_format<P: AsRef<Path>>(path: P) -> FileFormat {
    lookup_extension(path.as_ref()).unwrap_or(DEFAULT_FORMAT)
}

/// Look up the path's suffix in the detection table.
///
/// Returns `None` when the suffix is missing or not in the table.
pub fn lookup_extension(path: &Path) -> Option<FileFormat> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    EXTENSION_TABLE
        .iter()
        .find(|(suffix, _)| *suffix == ext)
        .map(|(_, format)| *format)
}

/// Check if the path's suffix appears in the detection table.
pub fn is_known_extension(path: &Path) -> bool {
    lookup_extension(path).is_some()
}

/// Check if the path's suffix is one of `format`'s extensions.
///
/// For `Auto`, any suffix in the detection table matches.
pub fn matches_format(path: &Path, format: FileFormat) -> bool {
    if format.is_auto() {
        return is_known_extension(path);
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            format.extensions().iter().any(|candidate| *candidate == ext)
        })
        .unwrap_or(false)
}
