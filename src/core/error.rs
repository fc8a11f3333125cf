// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for robodata.
//!
//! Every fallible operation in the library reports one of a small set of
//! error kinds:
//! - Missing input paths
//! - Data that does not parse into a well-formed value (validation)
//! - Write failures (persistence)
//! - Formats with no registered loader
//! - Unreadable or invalid configuration

use std::fmt;
use std::path::Path;

use super::FileFormat;

/// Errors that can occur while loading, saving or converting data.
#[derive(Debug, Clone)]
pub enum DataError {
    /// The input path does not exist
    PathNotFound {
        /// Path that was requested
        path: String,
    },

    /// Data is present but malformed, or violates a format's structure
    Validation {
        /// Format that rejected the data
        format: String,
        /// File or store involved
        path: String,
        /// Error message
        message: String,
    },

    /// Writing failed
    Persistence {
        /// Format being written
        format: String,
        /// Target file or store
        path: String,
        /// Error message
        message: String,
    },

    /// No binding exists for the requested format
    UnregisteredFormat {
        /// Format that was requested
        format: String,
        /// Which binding was missing (e.g. "loader")
        role: String,
    },

    /// Configuration could not be read or merged
    Config {
        /// Where the configuration came from
        source: String,
        /// Error message
        message: String,
    },
}

/// Coarse classification of a [`DataError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`DataError::PathNotFound`]
    PathNotFound,
    /// See [`DataError::Validation`]
    Validation,
    /// See [`DataError::Persistence`]
    Persistence,
    /// See [`DataError::UnregisteredFormat`]
    UnregisteredFormat,
    /// See [`DataError::Config`]
    Config,
}

impl DataError {
    /// Create a "path not found" error.
    pub fn path_not_found(path: impl AsRef<Path>) -> Self {
        DataError::PathNotFound {
            path: path.as_ref().display().to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(
        format: FileFormat,
        path: impl AsRef<Path>,
        message: impl Into<String>,
    ) -> Self {
        DataError::Validation {
            format: format.as_str().to_string(),
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a persistence error.
    pub fn persistence(
        format: FileFormat,
        path: impl AsRef<Path>,
        message: impl Into<String>,
    ) -> Self {
        DataError::Persistence {
            format: format.as_str().to_string(),
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create an "unregistered format" error for a missing loader.
    pub fn unregistered_loader(format: FileFormat) -> Self {
        DataError::UnregisteredFormat {
            format: format.as_str().to_string(),
            role: "loader".to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(source: impl Into<String>, message: impl Into<String>) -> Self {
        DataError::Config {
            source: source.into(),
            message: message.into(),
        }
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::PathNotFound { .. } => ErrorKind::PathNotFound,
            DataError::Validation { .. } => ErrorKind::Validation,
            DataError::Persistence { .. } => ErrorKind::Persistence,
            DataError::UnregisteredFormat { .. } => ErrorKind::UnregisteredFormat,
            DataError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Check if this error means "this file is bad" rather than a setup problem.
    pub fn is_validation(&self) -> bool {
        matches!(self, DataError::Validation { .. })
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            DataError::PathNotFound { path } => vec![("path", path.clone())],
            DataError::Validation {
                format,
                path,
                message,
            }
            | DataError::Persistence {
                format,
                path,
                message,
            } => vec![
                ("format", format.clone()),
                ("path", path.clone()),
                ("message", message.clone()),
            ],
            DataError::UnregisteredFormat { format, role } => {
                vec![("format", format.clone()), ("role", role.clone())]
            }
            DataError::Config { source, message } => {
                vec![("source", source.clone()), ("message", message.clone())]
            }
        }
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::PathNotFound { path } => write!(f, "Path does not exist: {path}"),
            DataError::Validation {
                format,
                path,
                message,
            } => write!(f, "Invalid {format} data in '{path}': {message}"),
            DataError::Persistence {
                format,
                path,
                message,
            } => write!(f, "Failed to write {format} data to '{path}': {message}"),
            DataError::UnregisteredFormat { format, role } => {
                write!(f, "No {role} registered for format: {format}")?;
                if format == FileFormat::Hdf5.as_str() && !cfg!(feature = "hdf5") {
                    write!(f, " (built without HDF5 support, rebuild with `--features hdf5`)")?;
                }
                Ok(())
            }
            DataError::Config { source, message } => {
                write!(f, "Invalid configuration from {source}: {message}")
            }
        }
    }
}

impl std::error::Error for DataError {}

/// Result type for robodata operations.
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_not_found_error() {
        let err = DataError::path_not_found("/data/missing.h5");
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
        assert_eq!(err.to_string(), "Path does not exist: /data/missing.h5");
    }

    #[test]
    fn test_validation_error() {
        let err = DataError::validation(FileFormat::Json, "a.json", "expected value at line 1");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Invalid json data in 'a.json': expected value at line 1"
        );
    }

    #[test]
    fn test_persistence_error() {
        let err = DataError::persistence(FileFormat::Numpy, "out.npy", "string arrays");
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(!err.is_validation());
        assert_eq!(
            err.to_string(),
            "Failed to write numpy data to 'out.npy': string arrays"
        );
    }

    #[test]
    fn test_unregistered_loader_error() {
        let err = DataError::unregistered_loader(FileFormat::Rlds);
        assert_eq!(err.kind(), ErrorKind::UnregisteredFormat);
        assert_eq!(err.to_string(), "No loader registered for format: rlds");
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_unregistered_hdf5_names_the_feature() {
        let err = DataError::unregistered_loader(FileFormat::Hdf5);
        assert_eq!(
            err.to_string(),
            "No loader registered for format: hdf5 (built without HDF5 support, rebuild with `--features hdf5`)"
        );
    }

    #[test]
    fn test_config_error() {
        let err = DataError::config("rdm.toml", "expected a table");
        assert_eq!(
            err.to_string(),
            "Invalid configuration from rdm.toml: expected a table"
        );
    }

    #[test]
    fn test_log_fields_validation() {
        let err = DataError::validation(FileFormat::Zarr, "x.zarr", "missing .zgroup");
        let fields = err.log_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], ("format", "zarr".to_string()));
        assert_eq!(fields[1], ("path", "x.zarr".to_string()));
        assert_eq!(fields[2], ("message", "missing .zgroup".to_string()));
    }

    #[test]
    fn test_log_fields_unregistered() {
        let err = DataError::unregistered_loader(FileFormat::Pickle);
        let fields = err.log_fields();
        assert_eq!(fields, vec![("format", "pickle".to_string()), ("role", "loader".to_string())]);
    }

    #[test]
    fn test_error_clone() {
        let err1 = DataError::path_not_found("a");
        let err2 = err1.clone();
        assert_eq!(err1.to_string(), err2.to_string());
    }
}
