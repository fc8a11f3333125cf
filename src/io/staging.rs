// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Staged writes.
//!
//! Every save goes to a hidden sibling of the target (`.<name>.tmp-<uuid>`)
//! and is renamed over the target only once it has been written completely.
//! On failure the staging path is removed and the previous target, if any,
//! is left untouched. Works for single files and for directory stores.

use std::path::{Path, PathBuf};

use crate::core::{DataError, Result};
use crate::FileFormat;

/// Write `target` by running `write` against a staging path.
///
/// Parent directories of `target` are created first. The closure receives
/// the staging path and must create the file or directory there.
pub fn write_with<F>(target: &Path, format: FileFormat, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let staging = staging_path(target, format)?;

    if let Err(e) = write(&staging) {
        remove_path(&staging);
        return Err(e);
    }

    if target.exists() {
        if let Err(e) = remove_existing(target) {
            remove_path(&staging);
            return Err(DataError::persistence(
                format,
                target,
                format!("failed to replace existing target: {e}"),
            ));
        }
    }

    std::fs::rename(&staging, target).map_err(|e| {
        remove_path(&staging);
        DataError::persistence(format, target, format!("failed to move staged output: {e}"))
    })
}

/// Write a byte buffer to `target` through a staging file.
pub fn write_file(target: &Path, format: FileFormat, bytes: &[u8]) -> Result<()> {
    write_with(target, format, |staging| {
        std::fs::write(staging, bytes)
            .map_err(|e| DataError::persistence(format, target, e.to_string()))
    })
}

/// Hidden sibling path that receives the output before the final rename.
fn staging_path(target: &Path, format: FileFormat) -> Result<PathBuf> {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DataError::persistence(format, target, "target has no file name"))?;

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| {
        DataError::persistence(
            format,
            target,
            format!("failed to create parent directory: {e}"),
        )
    })?;

    Ok(parent.join(format!(".{name}.tmp-{}", uuid::Uuid::new_v4().simple())))
}

fn remove_existing(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Best-effort removal of a file or directory.
fn remove_path(path: &Path) {
    if path.exists() {
        let _ = remove_existing(path);
    }
}
