// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use robodata::{Group, NdArray, Value};

// ============================================================================
// Temporary Directories
// ============================================================================

/// Cleanup guard for test temporary files
#[derive(Debug)]
pub struct CleanupGuard(pub PathBuf);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Create a fresh temporary directory, removed when the guard drops.
pub fn temp_dir(name: &str) -> (PathBuf, CleanupGuard) {
    // Process ID plus a time component keeps parallel runs apart
    let random = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let dir = std::env::temp_dir().join(format!(
        "robodata_{}_{}_{}",
        name,
        std::process::id(),
        random
    ));
    std::fs::create_dir_all(&dir).unwrap();
    (dir.clone(), CleanupGuard(dir))
}

// ============================================================================
// Sample Data
// ============================================================================

/// A row-major `rows x cols` float64 array with distinct values.
pub fn matrix(rows: usize, cols: usize) -> NdArray {
    let data: Vec<f64> = (0..rows * cols).map(|i| i as f64 * 0.01).collect();
    NdArray::new(vec![rows, cols], data).unwrap()
}

/// The standard episode: 100 steps of 10-d observations and 7-d actions.
pub fn standard_episode() -> Group {
    let mut metadata = Group::new();
    metadata.insert("episode_length".into(), Value::Int(100));
    metadata.insert("task".into(), Value::from("pick_and_place"));

    let mut episode = Group::new();
    episode.insert("observations".into(), Value::Array(matrix(100, 10)));
    episode.insert("actions".into(), Value::Array(matrix(100, 7)));
    episode.insert("metadata".into(), Value::Group(metadata));
    episode
}

/// An RLDS/LeRobot style episode with a list of step mappings.
pub fn stepped_episode(id: i64, steps: usize) -> Group {
    let steps = (0..steps)
        .map(|t| {
            let mut step = Group::new();
            step.insert(
                "observation".into(),
                Value::Array(NdArray::vector(vec![t as f32, 0.5, -0.5])),
            );
            step.insert("action".into(), Value::Array(NdArray::vector(vec![0.1f32, 0.2])));
            step.insert("reward".into(), Value::Float(if t + 1 == steps { 1.0 } else { 0.0 }));
            step.insert("is_terminal".into(), Value::Bool(t + 1 == steps));
            Value::Group(step)
        })
        .collect();

    let mut episode = Group::new();
    episode.insert("episode_id".into(), Value::Int(id));
    episode.insert("steps".into(), Value::List(steps));
    episode
}

/// Keys and values shared by every format, for cross-format checks.
pub fn assert_standard_episode(data: &Group) {
    let metadata = data["metadata"].as_group().expect("metadata group");
    assert_eq!(metadata["episode_length"], Value::Int(100));
    assert_eq!(metadata["task"], Value::from("pick_and_place"));
    assert_eq!(data["observations"].as_array().unwrap().shape(), &[100, 10]);
    assert_eq!(data["actions"].as_array().unwrap().shape(), &[100, 7]);
}

/// Write bytes that no codec accepts.
pub fn write_garbage(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"\x00\x01 this is not a valid file \xff\xfe").unwrap();
}
