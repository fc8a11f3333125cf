// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Format conversion.
//!
//! - [`ConversionEngine`] - Single-file and batch conversion over a registry
//! - [`StandardConverter`] - Converter bound to every built-in format pair
//! - [`BatchReport`] - Per-file outcomes of a batch

pub mod converter;
pub mod engine;

pub use converter::StandardConverter;
pub use engine::{BatchReport, ConversionEngine, ConversionTask, FileOutcome};
