// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core traits for format codecs.
//!
//! Every on-disk format is handled by a [`FormatCodec`] bound to one path.
//! The built-in formats are dispatched through the closed
//! [`Codec`](super::formats::Codec) enum; externally registered formats
//! are any boxed implementation of the trait.

use std::path::Path;

use crate::core::value::group_depth;
use crate::core::{DataError, Group, Result, MAX_DEPTH};
use crate::FileFormat;

use super::metadata::MetadataRecord;

/// How a codec is going to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// The path must exist
    Read,
    /// The path will be created or replaced
    Write,
}

/// A codec for one on-disk format, bound to one path.
///
/// # Example
///
/// ```no_run
/// use robodata::io::FormatCodec;
///
/// fn describe(codec: &dyn FormatCodec) -> robodata::Result<()> {
///     let data = codec.load()?;
///     println!("{}: {} top-level keys", codec.path().display(), data.len());
///     Ok(())
/// }
/// ```
pub trait FormatCodec: Send + Sync {
    /// Format this codec reads and writes.
    fn format(&self) -> FileFormat;

    /// Bound path.
    fn path(&self) -> &Path;

    /// Read the bound path into a value tree.
    ///
    /// Fails with a validation error when the data is unreadable, malformed,
    /// or fails the format's structural checks. Never modifies the source.
    fn load(&self) -> Result<Group>;

    /// Write a value tree to `target`, or to the bound path when `None`.
    ///
    /// Intermediate directories are created. Nothing is left at the target
    /// when the write fails. Fails with a persistence error.
    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()>;

    /// Check whether a value satisfies this format's structural requirements.
    ///
    /// Never touches the filesystem and never fails; problems are logged.
    fn validate(&self, data: &Group) -> bool;

    /// Describe the bound path. Unavailable fields are omitted.
    fn metadata(&self) -> MetadataRecord;
}

impl<T: FormatCodec + ?Sized> FormatCodec for Box<T> {
    fn format(&self) -> FileFormat {
        (**self).format()
    }

    fn path(&self) -> &Path {
        (**self).path()
    }

    fn load(&self) -> Result<Group> {
        (**self).load()
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        (**self).save(data, target)
    }

    fn validate(&self, data: &Group) -> bool {
        (**self).validate(data)
    }

    fn metadata(&self) -> MetadataRecord {
        (**self).metadata()
    }
}

/// Fail with "path not found" when a codec opened for reading has no input.
pub fn require_exists(path: &Path, mode: AccessMode) -> Result<()> {
    if mode == AccessMode::Read && !path.exists() {
        return Err(DataError::path_not_found(path));
    }
    Ok(())
}

/// Check that a value tree is within [`MAX_DEPTH`].
///
/// Returns a message describing the violation.
pub fn check_depth(data: &Group) -> std::result::Result<(), String> {
    let depth = group_depth(data);
    if depth > MAX_DEPTH {
        return Err(format!(
            "value nesting depth {depth} exceeds the maximum of {MAX_DEPTH}"
        ));
    }
    Ok(())
}
