// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! LeRobot-style episodic datasets.
//!
//! A dataset is either a single JSON document holding
//! `{"episodes": [...], "metadata": {...}}`, or a directory of
//! `episode_*.json` files with one episode each. Every episode must be a
//! mapping with a `steps` entry.
//!
//! Values are converted with the same rules as plain JSON. Saving a value
//! without an `episodes` key wraps it as a single-episode dataset.

use std::path::{Path, PathBuf};

use crate::config::RdmConfig;
use crate::core::{DataError, Group, Result, Value};
use crate::io::metadata::MetadataRecord;
use crate::io::staging;
use crate::io::traits::{check_depth, require_exists, AccessMode, FormatCodec};
use crate::FileFormat;

use super::json;

/// Codec for LeRobot JSON episodes.
#[derive(Debug, Clone)]
pub struct LeRobotCodec {
    path: PathBuf,
    indent: usize,
    strict: bool,
}

impl LeRobotCodec {
    /// Bind a codec to a file or episode directory.
    pub fn new(path: impl Into<PathBuf>, indent: usize, strict: bool) -> Self {
        Self {
            path: path.into(),
            indent,
            strict,
        }
    }

    /// Bind a codec, checking that the path exists when reading.
    pub fn open(path: &Path, mode: AccessMode, config: &RdmConfig) -> Result<Self> {
        require_exists(path, mode)?;
        Ok(Self::new(
            path,
            config.formats.json.indent,
            config.validation.strict,
        ))
    }

    fn load_directory(&self) -> Result<Group> {
        let files = episode_files(&self.path)
            .map_err(|e| DataError::validation(FileFormat::LeRobot, &self.path, e.to_string()))?;

        let mut episodes = Vec::with_capacity(files.len());
        for file in &files {
            let doc = json::read_document(file, FileFormat::LeRobot)?;
            let episode = json::document_to_group(doc)
                .map_err(|msg| DataError::validation(FileFormat::LeRobot, file, msg))?;
            episodes.push(Value::Group(episode));
        }

        Ok(dataset(episodes))
    }

    fn check(&self, data: &Group, path: &Path) -> std::result::Result<(), String> {
        match check_episodes(data) {
            Err(msg) if !self.strict => {
                tracing::warn!(path = %path.display(), reason = %msg, "LeRobot structure check failed");
                Ok(())
            }
            other => other,
        }
    }
}

impl FormatCodec for LeRobotCodec {
    fn format(&self) -> FileFormat {
        FileFormat::LeRobot
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Group> {
        let data = if self.path.is_dir() {
            self.load_directory()?
        } else {
            let doc = json::read_document(&self.path, FileFormat::LeRobot)?;
            json::document_to_group(doc)
                .map_err(|msg| DataError::validation(FileFormat::LeRobot, &self.path, msg))?
        };

        self.check(&data, &self.path)
            .map_err(|msg| DataError::validation(FileFormat::LeRobot, &self.path, msg))?;

        tracing::info!(path = %self.path.display(), "Loaded LeRobot data");
        Ok(data)
    }

    fn save(&self, data: &Group, target: Option<&Path>) -> Result<()> {
        let target = target.unwrap_or(&self.path);
        let persist = |msg: String| DataError::persistence(FileFormat::LeRobot, target, msg);

        check_depth(data).map_err(persist)?;
        let wrapped = wrap(data);
        self.check(&wrapped, target).map_err(persist)?;

        let doc = json::group_to_json(&wrapped).map_err(persist)?;
        let bytes = json::render(&doc, self.indent).map_err(persist)?;
        staging::write_file(target, FileFormat::LeRobot, &bytes)?;

        tracing::info!(path = %target.display(), "Saved LeRobot data");
        Ok(())
    }

    fn validate(&self, data: &Group) -> bool {
        let result = check_depth(data)
            .and_then(|_| check_episodes(&wrap(data)))
            .and_then(|_| json::group_to_json(data).map(|_| ()));
        match result {
            Ok(()) => true,
            Err(msg) => {
                tracing::warn!(path = %self.path.display(), reason = %msg, "LeRobot validation failed");
                false
            }
        }
    }

    fn metadata(&self) -> MetadataRecord {
        let mut record = MetadataRecord::for_path(&self.path, FileFormat::LeRobot);
        if self.path.is_dir() {
            record.insert_detail("file_type", "directory");
            if let Ok(files) = episode_files(&self.path) {
                record.insert_detail("num_episode_files", files.len());
            }
        } else if self.path.is_file() {
            record.insert_detail("file_type", "single_file");
            if let Ok(doc) = json::read_document(&self.path, FileFormat::LeRobot) {
                if let Some(episodes) = doc.get("episodes").and_then(|e| e.as_array()) {
                    record.insert_detail("num_episodes", episodes.len());
                }
            }
        }
        record
    }
}

/// `episode_*.json` files in a directory, sorted by name.
fn episode_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_episode = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("episode_") && n.ends_with(".json"));
        if is_episode && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn dataset(episodes: Vec<Value>) -> Group {
    let mut metadata = Group::new();
    metadata.insert("num_episodes".into(), Value::Int(episodes.len() as i64));
    metadata.insert("format".into(), Value::from("lerobot"));

    let mut g = Group::new();
    g.insert("episodes".into(), Value::List(episodes));
    g.insert("metadata".into(), Value::Group(metadata));
    g
}

/// The value as written: datasets as-is, bare episodes wrapped.
fn wrap(data: &Group) -> Group {
    if data.contains_key("episodes") {
        data.clone()
    } else {
        dataset(vec![Value::Group(data.clone())])
    }
}

/// Check the dataset layout: an `episodes` list of mappings with `steps`.
fn check_episodes(data: &Group) -> std::result::Result<(), String> {
    let episodes = data
        .get("episodes")
        .ok_or_else(|| "missing 'episodes' entry".to_string())?;

    let episodes: Vec<&Value> = match episodes {
        Value::List(items) => items.iter().collect(),
        // An empty list loads as an empty array
        Value::Array(a) if a.is_empty() => Vec::new(),
        other => return Err(format!("'episodes' must be a list, found {}", other.type_name())),
    };

    for (i, episode) in episodes.iter().enumerate() {
        let episode = episode
            .as_group()
            .ok_or_else(|| format!("episode {i} is not a mapping"))?;
        if !episode.contains_key("steps") {
            return Err(format!("episode {i} has no 'steps' entry"));
        }
    }
    Ok(())
}
