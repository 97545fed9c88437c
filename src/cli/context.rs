//! Per-invocation project context: resolved root, merged configuration and
//! the package folders to process.

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::args::CommonArgs;
use crate::config::{Config, load_config};
use crate::core::file_scanner::{PackageFolder, ScanOptions, scan_folders};
use crate::core::imports::ImportEntry;
use crate::core::pipeline::FolderOptions;

pub struct ProjectContext {
    pub root: PathBuf,
    pub config: Config,
}

impl ProjectContext {
    pub fn new(args: &CommonArgs) -> Result<Self> {
        let root = args.path.clone();
        if !root.is_dir() {
            anyhow::bail!("Path is not a directory: {}", root.display());
        }
        let absolute = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve path: {}", root.display()))?;

        let loaded = load_config(&absolute)?;
        let mut config = loaded.config;
        if let Some(output_file) = &args.output_file {
            config.output_file = output_file.clone();
            config.validate()?;
        }

        tracing::debug!(root = %root.display(), from_file = loaded.from_file, "project context");
        Ok(Self { root, config })
    }

    pub fn scan(&self) -> Vec<PackageFolder> {
        let options = ScanOptions {
            includes: &self.config.includes,
            ignores: &self.config.ignores,
            ignore_test_files: self.config.ignore_test_files,
            output_file: &self.config.output_file,
            cache_file: &self.config.cache_file,
        };
        let result = scan_folders(&self.root, &options);
        if result.skipped_count > 0 {
            tracing::warn!("{} path(s) could not be accessed", result.skipped_count);
        }
        result.folders
    }

    pub fn folder_options(&self, force: bool, dry_run: bool) -> FolderOptions<'_> {
        FolderOptions {
            output_file: &self.config.output_file,
            cache_file: &self.config.cache_file,
            runtime: ImportEntry::new(&self.config.runtime_import, &self.config.runtime_alias),
            force,
            dry_run,
        }
    }
}
