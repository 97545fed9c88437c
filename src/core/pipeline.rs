//! One generation pass over one package folder.
//!
//! ```text
//! read sources -> fingerprint against manifest -> (cache hit: done)
//!   -> parse + index every file
//!   -> collect + validate directives per file
//!   -> aggregate services across files
//!   -> synthesize + emit
//!   -> write output, then manifest
//! ```
//!
//! Any change in the folder reparses the whole folder: services are spread
//! across files, so a change in one file can alter another file's output.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::aggregate::{FileContribution, TypeCapabilities, aggregate};
use crate::core::cache::{BuildCache, FileState, MANIFEST_VERSION, Manifest, checksum};
use crate::core::cache::{remove_if_exists, write_atomic};
use crate::core::collect::AnnotationCollector;
use crate::core::collect::scanner::{has_directives, has_service_marker};
use crate::core::emit::{Emitter, GENERATED_HEADER, GeneratedCode, extract_preserved_blocks};
use crate::core::error::GenError;
use crate::core::file_scanner::PackageFolder;
use crate::core::imports::ImportEntry;
use crate::core::source::{SourceFile, display_path};
use crate::core::validate::validate_file;
use crate::issues::{ConflictIssue, InternalIssue, Issue, ReadErrorIssue, Report};

#[derive(Debug, Clone)]
pub struct FolderOptions<'a> {
    pub output_file: &'a str,
    pub cache_file: &'a str,
    pub runtime: ImportEntry,
    /// Ignore the manifest and regenerate.
    pub force: bool,
    /// Compute everything, write nothing.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderOutcome {
    /// Output already up to date (or nothing to do).
    Unchanged,
    /// Output written (or would be, in a dry run).
    Generated,
    /// Stale output removed (or would be).
    Deleted,
    /// No services and no previous output.
    NoServices,
}

#[derive(Debug)]
pub struct FolderReport {
    pub folder: PathBuf,
    pub outcome: FolderOutcome,
    pub issues: Vec<Issue>,
    /// Services in the folder's output.
    pub services: Vec<String>,
}

impl FolderReport {
    fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
            outcome: FolderOutcome::Unchanged,
            issues: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_error)
    }

    fn internal(mut self, path: &Path, err: impl std::fmt::Display) -> Self {
        self.issues.push(Issue::Internal(InternalIssue {
            file_path: display_path(path),
            error: err.to_string(),
        }));
        self
    }
}

/// A source read from disk.
struct Input {
    /// File name, used as the manifest key.
    name: String,
    path: PathBuf,
    content: String,
    checksum: String,
}

pub fn process_folder(folder: &PackageFolder, options: &FolderOptions<'_>) -> FolderReport {
    let mut report = FolderReport::new(&folder.path);
    let output_path = folder.output_path(options.output_file);
    let cache_path = folder.path.join(options.cache_file);

    let mut inputs: Vec<Input> = Vec::with_capacity(folder.sources.len());
    let mut unreadable = false;
    for path in &folder.sources {
        match fs::read_to_string(path) {
            Ok(content) => inputs.push(Input {
                name: file_key(path),
                path: path.clone(),
                checksum: checksum(content.as_bytes()),
                content,
            }),
            Err(err) => {
                unreadable = true;
                report.issues.push(Issue::ReadError(ReadErrorIssue {
                    file_path: display_path(path),
                    error: format!("Failed to read file: {}", err),
                }));
            }
        }
    }

    let existing = match fs::read_to_string(&output_path) {
        Ok(text) => Some(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => return report.internal(&output_path, format!("Failed to read output: {}", err)),
    };
    if let Some(text) = &existing
        && !text.starts_with(GENERATED_HEADER)
    {
        return report.internal(
            &output_path,
            "refusing to overwrite a file that was not generated by wiregen",
        );
    }
    let existing_checksum = existing.as_deref().map(|t| checksum(t.as_bytes()));

    let cache = if options.force {
        BuildCache::empty(&cache_path)
    } else {
        BuildCache::load(&cache_path)
    };
    let pairs: Vec<(String, String)> = inputs
        .iter()
        .map(|i| (i.name.clone(), i.checksum.clone()))
        .collect();
    let fingerprints = cache.fingerprint(&pairs);
    let changed = fingerprints.iter().filter(|f| f.state != FileState::Unchanged).count();

    // A matching manifest can still sit next to an output whose services are
    // gone, e.g. after an earlier pass that recorded a marker-less edit.
    let stale_output =
        existing.is_some() && !inputs.iter().any(|i| has_service_marker(&i.content));
    if changed == 0
        && !unreadable
        && !stale_output
        && cache.output_matches(existing_checksum.as_deref())
    {
        tracing::debug!(folder = %display_path(&folder.path), "up to date");
        report.services = cache.recorded_services().to_vec();
        return report;
    }
    tracing::debug!(
        folder = %display_path(&folder.path),
        changed,
        files = inputs.len(),
        "regenerating"
    );

    // Parse and validate.
    let files: Vec<SourceFile> = inputs
        .iter()
        .map(|input| SourceFile::parse(&input.path, &input.content))
        .collect();
    let capabilities = TypeCapabilities::discover(&files);
    let mut contributions: Vec<FileContribution<'_>> = Vec::new();
    for (file, input) in files.iter().zip(&inputs) {
        if !has_directives(&input.content) {
            continue;
        }
        let collected = AnnotationCollector::collect(file);
        report.issues.extend(collected.issues);
        let validated = validate_file(file, collected.annotations);
        report.issues.extend(validated.issues);
        contributions.push(FileContribution {
            file,
            annotations: validated.annotations,
        });
    }

    let mut code = GeneratedCode {
        package: package_name(&files, &folder.path),
        preserved_blocks: existing.as_deref().map(extract_preserved_blocks).unwrap_or_default(),
        ..Default::default()
    };
    if inputs.iter().any(|i| has_service_marker(&i.content)) {
        let aggregation = aggregate(&contributions);
        report.issues.extend(aggregation.issues);
        code.services = aggregation.services;
    }

    let emission = match Emitter::new(&options.runtime, &capabilities).emit(&code) {
        Ok(emission) => emission,
        Err(err) => return report.internal(&folder.path, err),
    };
    for rejected in emission.rejected {
        let (message, other) = match rejected.error {
            GenError::Conflict { message, other } => (message, other),
            err => (err.to_string(), None),
        };
        report.issues.push(Issue::Conflict(ConflictIssue {
            location: rejected.service.location.clone(),
            service: rejected.service.name.clone(),
            message,
            other,
        }));
    }
    report.issues.sort();
    report.services = emission.services;

    // Write.
    let output_checksum = emission.text.as_deref().map(|t| checksum(t.as_bytes()));
    report.outcome = match (&emission.text, &existing) {
        (None, Some(_)) => FolderOutcome::Deleted,
        (None, None) => FolderOutcome::NoServices,
        (Some(text), Some(old)) if text == old => FolderOutcome::Unchanged,
        (Some(_), _) => FolderOutcome::Generated,
    };
    if options.dry_run {
        return report;
    }

    let written = match (&report.outcome, &emission.text) {
        (FolderOutcome::Deleted, _) => remove_if_exists(&output_path).map(|_| ()),
        (FolderOutcome::Generated, Some(text)) => write_atomic(&output_path, text.as_bytes()),
        _ => Ok(()),
    };
    if let Err(err) = written {
        return report.internal(&output_path, format!("{:#}", err));
    }

    let errored: HashSet<&str> = report
        .issues
        .iter()
        .filter(|issue| issue.is_error())
        .map(|issue| issue.location().file_path())
        .collect();
    let manifest = Manifest {
        version: MANIFEST_VERSION,
        files: inputs
            .iter()
            .filter(|input| !errored.contains(display_path(&input.path).as_str()))
            .map(|input| (input.name.clone(), input.checksum.clone()))
            .collect(),
        output: output_checksum,
        services: report.services.clone(),
    };
    if let Err(err) = cache.store(&manifest) {
        return report.internal(cache.path(), format!("{:#}", err));
    }

    report
}

/// Remove a folder's generated output and manifest. Outputs without the
/// generated-code header are left alone.
pub fn clean_folder(folder: &Path, output_file: &str, cache_file: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let output = folder.join(output_file);
    if let Ok(text) = fs::read_to_string(&output) {
        if text.starts_with(GENERATED_HEADER) {
            if remove_if_exists(&output)? {
                removed.push(output);
            }
        } else {
            tracing::warn!(path = %display_path(&output), "not a generated file, kept");
        }
    }

    let manifest = folder.join(cache_file);
    if remove_if_exists(&manifest)? {
        removed.push(manifest);
    }
    Ok(removed)
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_path(path))
}

/// Package clause of the first file that has one, else the folder name.
fn package_name(files: &[SourceFile], folder: &Path) -> String {
    files
        .iter()
        .filter_map(|f| f.index.package.as_deref())
        .find(|p| !p.is_empty())
        .map(str::to_string)
        .or_else(|| {
            folder
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "main".to_string())
        .replace('-', "_")
}
