//! Package folder discovery.
//!
//! Every directory holding Go sources is one package and one unit of
//! generation. A directory that only holds a stale generated file or cache
//! manifest is still reported, so its leftovers can be cleaned up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::{Pattern, glob};
use walkdir::{DirEntry, WalkDir};

use crate::config::{SKIPPED_DIRS, TEST_FILE_PATTERNS};

/// Check if a pattern contains glob wildcards (* or ?).
/// Patterns without wildcards are treated as literal directory paths.
fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions<'a> {
    pub includes: &'a [String],
    pub ignores: &'a [String],
    pub ignore_test_files: bool,
    /// Generated file name; never treated as an input.
    pub output_file: &'a str,
    pub cache_file: &'a str,
}

/// One package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFolder {
    pub path: PathBuf,
    /// Input sources, sorted by file name.
    pub sources: Vec<PathBuf>,
}

impl PackageFolder {
    pub fn output_path(&self, output_file: &str) -> PathBuf {
        self.path.join(output_file)
    }
}

/// Result of scanning for package folders.
pub struct ScanResult {
    /// Sorted by path.
    pub folders: Vec<PackageFolder>,
    pub skipped_count: usize,
}

pub fn scan_folders(base_dir: &Path, options: &ScanOptions<'_>) -> ScanResult {
    let mut folders: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut skipped_count = 0;

    let mut literal_ignore_paths: Vec<PathBuf> = Vec::new();
    let mut glob_patterns: Vec<Pattern> = Vec::new();

    for p in options.ignores {
        if is_glob_pattern(p) {
            match Pattern::new(p) {
                Ok(pattern) => glob_patterns.push(pattern),
                Err(e) => tracing::warn!("Invalid ignore pattern '{}': {}", p, e),
            }
        } else {
            literal_ignore_paths.push(base_dir.join(p));
        }
    }

    if options.ignore_test_files {
        for p in TEST_FILE_PATTERNS {
            if let Ok(pattern) = Pattern::new(p) {
                glob_patterns.push(pattern);
            }
        }
    }

    let dirs_to_scan: Vec<PathBuf> = if options.includes.is_empty() {
        vec![base_dir.to_path_buf()]
    } else {
        let mut paths = Vec::new();
        for inc in options.includes {
            if is_glob_pattern(inc) {
                let full_pattern = base_dir.join(inc);
                match glob(&full_pattern.to_string_lossy()) {
                    Ok(entries) => paths.extend(entries.flatten().filter(|entry| entry.is_dir())),
                    Err(e) => tracing::warn!("Invalid glob pattern '{}': {}", inc, e),
                }
            } else {
                let path = base_dir.join(inc);
                if path.exists() {
                    paths.push(path);
                } else {
                    tracing::warn!("Include path does not exist: {}", path.display());
                }
            }
        }
        paths
    };

    for dir in dirs_to_scan {
        let walker = WalkDir::new(&dir)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    skipped_count += 1;
                    tracing::warn!("Cannot access path: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            let path_str = path.to_string_lossy();

            if literal_ignore_paths
                .iter()
                .any(|ignore_path| path.starts_with(ignore_path))
            {
                continue;
            }
            if glob_patterns.iter().any(|p| p.matches(&path_str)) {
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(parent) = path.parent() else {
                continue;
            };
            if is_source_file(path, options.output_file) {
                folders
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push(path.to_path_buf());
            } else if is_generated_state(path, options) {
                folders.entry(parent.to_path_buf()).or_default();
            }
        }
    }

    let folders = folders
        .into_iter()
        .map(|(path, mut sources)| {
            sources.sort();
            sources.dedup();
            PackageFolder { path, sources }
        })
        .collect();

    ScanResult {
        folders,
        skipped_count,
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name.starts_with('_') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn is_source_file(path: &Path, output_file: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("go")
        && path.file_name().and_then(|n| n.to_str()) != Some(output_file)
}

fn is_generated_state(path: &Path, options: &ScanOptions<'_>) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(name) if name == options.output_file || name == options.cache_file
    )
}
