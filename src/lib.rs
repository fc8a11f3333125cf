// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Robodata
//!
//! Robot episode data interchange between HDF5, Zarr, RLDS, LeRobot, JSON,
//! pickle and NumPy.
//!
//! Every format loads into and saves from one hierarchical value model
//! ([`Group`] / [`Value`]), so any supported format can be converted to any
//! other:
//! - **Value model** in [`core::value`](crate::core::value)
//! - **Codecs** for each format in [`io::formats`](crate::io::formats)
//! - **Registry** of loaders and converters in [`core::registry`](crate::core::registry)
//! - **Conversion** of single files and directory trees in [`convert`](crate::convert)
//! - **Facade** over all of the above in [`DataManager`]
//!
//! ## Architecture
//!
//! - `core/` - Value model, format identifiers, errors, registry
//! - `io/` - Detection, codec trait, built-in codecs, metadata, staging
//! - `convert/` - Conversion engine and standard converter
//! - `config` - Layered configuration
//! - `manager` - Unified facade
//!
//! ## Example: Converting a Zarr store to JSON
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use robodata::{DataManager, FileFormat};
//!
//! let manager = DataManager::new();
//! manager.convert("episode_0.zarr", "episode_0.json", FileFormat::Auto, FileFormat::Auto)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Batch conversion
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use robodata::{DataManager, FileFormat};
//!
//! let report = DataManager::new().batch_convert(
//!     "raw_episodes",
//!     "converted",
//!     FileFormat::Zarr,
//!     FileFormat::Numpy,
//! )?;
//! println!("{} converted, {} failed", report.succeeded(), report.failed());
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{
    ArrayData, DType, DataError, ErrorKind, FileFormat, FormatRegistry, Group, NdArray, Result,
    Value,
};

// Configuration
pub mod config;
pub use config::RdmConfig;

// I/O types (detection, codecs, metadata, staging)
pub mod io;
pub use io::{detect_format, AccessMode, FormatCodec, MetadataRecord};

// Conversion
pub mod convert;
pub use convert::{BatchReport, ConversionEngine, ConversionTask};

// Facade
pub mod manager;
pub use manager::{load, save, DataManager};
