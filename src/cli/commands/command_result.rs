use std::path::PathBuf;

use crate::core::pipeline::FolderOutcome;
use crate::issues::Issue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Generate,
    Check,
    Clean,
    Init,
}

#[derive(Debug)]
pub enum CommandSummary {
    Generate(GenerateSummary),
    Check(CheckSummary),
    Clean(CleanSummary),
    Init(InitSummary),
}

/// Outcome of one folder, for the per-folder lines of the report.
#[derive(Debug)]
pub struct FolderLine {
    /// Generated file path.
    pub output: PathBuf,
    pub outcome: FolderOutcome,
    pub service_count: usize,
}

#[derive(Debug)]
pub struct GenerateSummary {
    pub folders: Vec<FolderLine>,
    pub generated_count: usize,
    pub deleted_count: usize,
    pub unchanged_count: usize,
    pub service_count: usize,
    pub is_dry_run: bool,
}

#[derive(Debug)]
pub struct CheckSummary {
    pub service_count: usize,
    /// Outputs that `generate` would rewrite or remove.
    pub stale_outputs: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct CleanSummary {
    pub removed: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct InitSummary {
    pub created: bool,
    pub error: Option<String>,
}

/// Result of running wiregen commands
pub struct CommandResult {
    pub kind: CommandKind,
    pub summary: CommandSummary,
    pub error_count: usize,
    pub warning_count: usize,
    /// Number of errors that are wiregen failures rather than source problems.
    pub internal_error_count: usize,
    /// All issues found, sorted.
    pub issues: Vec<Issue>,
    /// Number of package folders processed.
    pub folders_checked: usize,
}
