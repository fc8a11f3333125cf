// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Batch conversion tests.

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{standard_episode, temp_dir, write_garbage};
use robodata::{DataManager, ErrorKind, FileFormat, RdmConfig};

/// Three valid JSON episodes and one corrupt one, two of them nested.
fn populate(source: &Path, manager: &DataManager) {
    for name in ["a.json", "b.json", "sub/c.json"] {
        manager
            .save(&standard_episode(), source.join(name), FileFormat::Json)
            .unwrap();
    }
    write_garbage(&source.join("sub/broken.json"));
    std::fs::write(source.join("notes.txt"), "ignored").unwrap();
}

fn parallel_manager(workers: usize) -> DataManager {
    let mut config = RdmConfig::default();
    config.conversion.parallel = true;
    config.conversion.num_workers = Some(workers);
    DataManager::with_config(config)
}

#[test]
fn test_one_bad_file_does_not_stop_batch() {
    let (dir, _guard) = temp_dir("batch_partial");
    let source = dir.join("in");
    let target = dir.join("out");
    let manager = DataManager::new();
    populate(&source, &manager);

    let report = manager
        .batch_convert(&source, &target, FileFormat::Json, FileFormat::Zarr)
        .unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());

    let (task, error) = &report.failures[0];
    assert!(task.source.ends_with("sub/broken.json"));
    assert!(error.is_validation());

    for name in ["a.zarr", "b.zarr", "sub/c.zarr"] {
        let out = target.join(name);
        assert!(out.is_dir(), "missing {}", out.display());
        assert_eq!(manager.load(&out, FileFormat::Auto).unwrap(), standard_episode());
    }
    assert!(!target.join("sub/broken.zarr").exists());
}

#[test]
fn test_parallel_matches_sequential() {
    let (dir, _guard) = temp_dir("batch_parallel");
    let source = dir.join("in");
    let manager = parallel_manager(2);
    populate(&source, &manager);

    let report = manager
        .batch_convert(&source, dir.join("out"), FileFormat::Json, FileFormat::Pickle)
        .unwrap();

    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    assert!(dir.join("out/sub/c.pkl").is_file());
}

#[test]
fn test_auto_source_picks_known_suffixes() {
    let (dir, _guard) = temp_dir("batch_auto");
    let source = dir.join("in");
    let manager = DataManager::new();

    manager
        .save(&standard_episode(), source.join("one.zarr"), FileFormat::Auto)
        .unwrap();
    manager
        .save(&standard_episode(), source.join("two.pkl"), FileFormat::Auto)
        .unwrap();
    std::fs::write(source.join("readme.md"), "ignored").unwrap();

    let report = manager
        .batch_convert(&source, dir.join("out"), FileFormat::Auto, FileFormat::Json)
        .unwrap();

    // The store counts once, not once per chunk file
    assert_eq!(report.total, 2);
    assert!(report.is_success());
    assert!(dir.join("out/one.json").is_file());
    assert!(dir.join("out/two.json").is_file());
}

#[test]
fn test_observer_sees_every_file() {
    let (dir, _guard) = temp_dir("batch_observer");
    let source = dir.join("in");
    let manager = DataManager::new();
    populate(&source, &manager);

    let seen = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let observer = |outcome: &robodata::convert::FileOutcome| {
        seen.fetch_add(1, Ordering::SeqCst);
        if !outcome.is_success() {
            failed.fetch_add(1, Ordering::SeqCst);
        }
    };
    manager
        .batch_convert_with(
            &source,
            dir.join("out"),
            FileFormat::Json,
            FileFormat::Zarr,
            &observer,
        )
        .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 4);
    assert_eq!(failed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_source_dir() {
    let (dir, _guard) = temp_dir("batch_empty");
    let source = dir.join("in");
    std::fs::create_dir_all(&source).unwrap();

    let report = DataManager::new()
        .batch_convert(&source, dir.join("out"), FileFormat::Auto, FileFormat::Json)
        .unwrap();
    assert_eq!(report.total, 0);
    assert!(report.is_success());
}

#[test]
fn test_missing_source_dir() {
    let (dir, _guard) = temp_dir("batch_missing");
    let err = DataManager::new()
        .batch_convert(
            dir.join("absent"),
            dir.join("out"),
            FileFormat::Auto,
            FileFormat::Json,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathNotFound);
}

#[test]
fn test_oversized_zarr_shape_is_a_failed_entry() {
    let (dir, _guard) = temp_dir("batch_zarr_shape");
    let source = dir.join("in");
    let target = dir.join("out");
    let manager = DataManager::new();

    for name in ["a.zarr", "b.zarr", "c.zarr"] {
        manager
            .save(&standard_episode(), source.join(name), FileFormat::Zarr)
            .unwrap();
    }
    // A store whose declared shape cannot be allocated
    let bad = source.join("bad.zarr");
    std::fs::create_dir_all(bad.join("observations")).unwrap();
    std::fs::write(bad.join(".zgroup"), r#"{"zarr_format": 2}"#).unwrap();
    std::fs::write(
        bad.join("observations/.zarray"),
        r#"{"zarr_format": 2, "shape": [2305843009213693952], "chunks": [1000],
            "dtype": "<f8", "compressor": null, "fill_value": 0.0,
            "order": "C", "filters": null}"#,
    )
    .unwrap();

    let report = manager
        .batch_convert(&source, &target, FileFormat::Zarr, FileFormat::Json)
        .unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    let (task, error) = &report.failures[0];
    assert!(task.source.ends_with("bad.zarr"));
    assert!(error.is_validation());
    assert!(error.to_string().contains("too large"));
    assert!(!target.join("bad.json").exists());
}
