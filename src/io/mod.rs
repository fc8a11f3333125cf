// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for robot episode data.
//!
//! This module provides format detection, the codec trait every format
//! implements, the built-in codecs, and helpers for describing and
//! atomically writing files.

pub mod detection;
pub mod formats;
pub mod metadata;
pub mod staging;

// Format codec trait
pub mod traits;

// Re-exports
pub use detection::{detect_format, is_known_extension, matches_format, DEFAULT_FORMAT};
pub use formats::Codec;
pub use metadata::{
    create_metadata, load_metadata, save_metadata, DataInfo, MetadataFile, MetadataRecord,
};
pub use traits::{AccessMode, FormatCodec};
