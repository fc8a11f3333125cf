// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Single-file conversion tests.

mod common;

use common::{assert_standard_episode, standard_episode, stepped_episode, temp_dir};
use robodata::{DataManager, ErrorKind, FileFormat, Group, Value};

#[test]
fn test_zarr_to_json() {
    let (dir, _guard) = temp_dir("conv_zarr_json");
    let source = dir.join("episode.zarr");
    let target = dir.join("episode.json");
    let manager = DataManager::new();

    manager.save(&standard_episode(), &source, FileFormat::Zarr).unwrap();
    manager
        .convert(&source, &target, FileFormat::Zarr, FileFormat::Json)
        .unwrap();

    let text = std::fs::read_to_string(&target).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let observations = doc["observations"].as_array().unwrap();
    assert_eq!(observations.len(), 100);
    assert_eq!(observations[0].as_array().unwrap().len(), 10);
    assert_eq!(doc["metadata"]["task"], "pick_and_place");
    assert_eq!(doc["metadata"]["episode_length"], 100);

    assert_standard_episode(&manager.load(&target, FileFormat::Auto).unwrap());
}

#[test]
fn test_auto_matches_explicit_formats() {
    let (dir, _guard) = temp_dir("conv_auto");
    let source = dir.join("episode.zarr");
    let explicit = dir.join("explicit.pkl");
    let auto = dir.join("auto.pkl");
    let manager = DataManager::new();

    manager.save(&standard_episode(), &source, FileFormat::Auto).unwrap();
    manager
        .convert(&source, &explicit, FileFormat::Zarr, FileFormat::Pickle)
        .unwrap();
    manager
        .convert(&source, &auto, FileFormat::Auto, FileFormat::Auto)
        .unwrap();

    assert_eq!(
        manager.load(&explicit, FileFormat::Auto).unwrap(),
        manager.load(&auto, FileFormat::Auto).unwrap()
    );
}

#[test]
fn test_json_to_zarr_preserves_values() {
    let (dir, _guard) = temp_dir("conv_json_zarr");
    let source = dir.join("episode.json");
    let target = dir.join("nested").join("episode.zarr");
    let manager = DataManager::new();

    manager.save(&standard_episode(), &source, FileFormat::Auto).unwrap();
    manager
        .convert(&source, &target, FileFormat::Auto, FileFormat::Auto)
        .unwrap();

    assert_eq!(manager.load(&target, FileFormat::Zarr).unwrap(), standard_episode());
}

#[test]
fn test_rlds_to_lerobot() {
    let (dir, _guard) = temp_dir("conv_rlds_lerobot");
    let source = dir.join("dataset.tfrecord");
    let target = dir.join("dataset.json");
    let manager = DataManager::new();

    let mut data = Group::new();
    data.insert(
        "episodes".into(),
        Value::List(vec![
            Value::Group(stepped_episode(0, 3)),
            Value::Group(stepped_episode(1, 2)),
        ]),
    );
    manager.save(&data, &source, FileFormat::Rlds).unwrap();
    manager
        .convert(&source, &target, FileFormat::Rlds, FileFormat::LeRobot)
        .unwrap();

    let loaded = manager.load(&target, FileFormat::LeRobot).unwrap();
    let episodes = loaded["episodes"].as_list().unwrap();
    assert_eq!(episodes.len(), 2);
    let steps = episodes[1].as_group().unwrap()["steps"].as_list().unwrap();
    assert_eq!(steps.len(), 2);
}

#[test]
fn test_zarr_to_numpy() {
    let (dir, _guard) = temp_dir("conv_zarr_numpy");
    let source = dir.join("episode.zarr");
    let target = dir.join("episode.npz");
    let manager = DataManager::new();

    manager.save(&standard_episode(), &source, FileFormat::Auto).unwrap();
    manager
        .convert(&source, &target, FileFormat::Auto, FileFormat::Auto)
        .unwrap();

    assert!(std::fs::read(&target).unwrap().starts_with(b"PK"));
    let loaded = manager.load(&target, FileFormat::Numpy).unwrap();
    assert_eq!(loaded["metadata"].as_group().unwrap()["task"], Value::from("pick_and_place"));
    assert_eq!(loaded, standard_episode());
}

#[test]
fn test_missing_source() {
    let (dir, _guard) = temp_dir("conv_missing");
    let err = DataManager::new()
        .convert(
            dir.join("absent.zarr"),
            dir.join("out.json"),
            FileFormat::Auto,
            FileFormat::Auto,
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PathNotFound);
    assert!(!dir.join("out.json").exists());
}

#[test]
fn test_corrupt_source() {
    let (dir, _guard) = temp_dir("conv_corrupt");
    let source = dir.join("broken.json");
    common::write_garbage(&source);

    let err = DataManager::new()
        .convert(&source, dir.join("out.pkl"), FileFormat::Auto, FileFormat::Auto)
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_top_level_helpers() {
    let (dir, _guard) = temp_dir("conv_helpers");
    let path = dir.join("episode.pkl");

    robodata::save(&standard_episode(), &path).unwrap();
    assert_eq!(robodata::load(&path).unwrap(), standard_episode());
}
