// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Standard converter between built-in formats.

use crate::core::{DataConverter, Group, NdArray, Result, Value};
use crate::FileFormat;

/// Converter bound to every pair of distinct built-in formats.
///
/// For NumPy targets, top-level lists that form a homogeneous rectangular
/// array are turned into arrays. Every other value passes through; the
/// target codec applies its own leaf coercion when saving.
#[derive(Debug, Clone, Copy)]
pub struct StandardConverter {
    target: FileFormat,
}

impl StandardConverter {
    pub fn new(target: FileFormat) -> Self {
        Self { target }
    }
}

impl DataConverter for StandardConverter {
    fn convert(&self, mut data: Group) -> Result<Group> {
        if self.target == FileFormat::Numpy {
            for value in data.values_mut() {
                if let Value::List(items) = value {
                    if let Some(array) = NdArray::from_nested(items) {
                        *value = Value::Array(array);
                    }
                }
            }
        }
        Ok(data)
    }
}
