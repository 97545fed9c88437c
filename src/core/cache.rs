//! Incremental build cache.
//!
//! One manifest per folder records the checksum of every input file, the
//! checksum of the generated output and the services it contained:
//!
//! ```json
//! {
//!   "version": 1,
//!   "files": { "users.go": "9f86d0...", "handlers.go": "60303a..." },
//!   "output": "2c26b4...",
//!   "services": ["Users"]
//! }
//! ```
//!
//! The manifest is the only state that survives between invocations. It is
//! safe to delete: a missing or unreadable manifest just means every file is
//! treated as updated.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::error::GenError;

pub const MANIFEST_VERSION: u32 = 1;

/// Default manifest file name inside each folder.
pub const DEFAULT_CACHE_FILE: &str = ".wiregen-cache.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// File name (relative to the folder) -> sha256 hex.
    pub files: BTreeMap<String, String>,
    /// Checksum of the output written by the last pass.
    pub output: Option<String>,
    /// Services contained in that output.
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Updated,
    Unchanged,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub path: String,
    pub state: FileState,
}

/// sha256 of the content, lowercase hex.
pub fn checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Manifest loaded at the start of a pass.
#[derive(Debug)]
pub struct BuildCache {
    path: PathBuf,
    manifest: Option<Manifest>,
}

impl BuildCache {
    /// Load the manifest at `path`. Corruption is logged and healed by
    /// starting from an empty manifest.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let manifest = match read_manifest(&path) {
            Ok(manifest) => manifest,
            Err(err) => {
                tracing::warn!("{}; reprocessing every file", err);
                None
            }
        };
        Self { path, manifest }
    }

    /// Cache that treats every file as updated.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            manifest: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Services recorded for the last output, empty without a manifest.
    pub fn recorded_services(&self) -> &[String] {
        self.manifest
            .as_ref()
            .map(|m| m.services.as_slice())
            .unwrap_or_default()
    }

    /// Compare current inputs (name, checksum) against the manifest.
    /// Files recorded but no longer present come back as `Deleted`.
    pub fn fingerprint(&self, inputs: &[(String, String)]) -> Vec<FileFingerprint> {
        let recorded = self.manifest.as_ref().map(|m| &m.files);
        let mut fingerprints: Vec<FileFingerprint> = inputs
            .iter()
            .map(|(path, sum)| {
                let state = match recorded.and_then(|files| files.get(path)) {
                    Some(previous) if previous == sum => FileState::Unchanged,
                    _ => FileState::Updated,
                };
                FileFingerprint {
                    path: path.clone(),
                    state,
                }
            })
            .collect();

        if let Some(files) = recorded {
            for path in files.keys() {
                if !inputs.iter().any(|(p, _)| p == path) {
                    fingerprints.push(FileFingerprint {
                        path: path.clone(),
                        state: FileState::Deleted,
                    });
                }
            }
        }

        fingerprints
    }

    /// True if the output on disk is the one the manifest recorded.
    pub fn output_matches(&self, current: Option<&str>) -> bool {
        match &self.manifest {
            Some(manifest) => manifest.output.as_deref() == current,
            None => false,
        }
    }

    /// Atomically replace the manifest on disk.
    pub fn store(&self, manifest: &Manifest) -> Result<()> {
        let json = serde_json::to_string_pretty(manifest)
            .context("Failed to serialize cache manifest")?;
        write_atomic(&self.path, format!("{}\n", json).as_bytes())
    }
}

fn read_manifest(path: &Path) -> Result<Option<Manifest>, GenError> {
    let corrupt = |reason: String| GenError::CacheCorruption {
        path: path.display().to_string(),
        reason,
    };

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(corrupt(err.to_string())),
    };
    let manifest: Manifest = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(corrupt(format!(
            "version {} (expected {})",
            manifest.version, MANIFEST_VERSION
        )));
    }
    Ok(Some(manifest))
}

/// Write to a sibling temp file, then rename over `path`.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid output path: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    fs::write(&tmp, content)
        .with_context(|| format!("Failed to write file: {}", tmp.display()))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("Failed to replace file: {}", path.display()));
    }
    Ok(())
}

/// Remove a file if it exists.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("Failed to remove file: {}", path.display())),
    }
}
