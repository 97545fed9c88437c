use anyhow::{Ok, Result};
use rayon::prelude::*;

use super::super::{args::CheckCommand, context::ProjectContext};
use super::helper::finish;
use super::{CheckSummary, CommandKind, CommandResult, CommandSummary};
use crate::core::pipeline::{FolderOutcome, process_folder};
use crate::issues::Issue;

/// Run the full pass on every folder as a forced dry run: every file is
/// reparsed and nothing is written.
pub fn check(cmd: CheckCommand) -> Result<CommandResult> {
    let ctx = ProjectContext::new(&cmd.common)?;
    let folders = ctx.scan();
    let options = ctx.folder_options(true, true);

    let reports: Vec<_> = folders
        .par_iter()
        .map(|folder| process_folder(folder, &options))
        .collect();

    let mut summary = CheckSummary {
        service_count: 0,
        stale_outputs: Vec::new(),
    };
    let mut issues: Vec<Issue> = Vec::new();
    for report in reports {
        summary.service_count += report.services.len();
        if matches!(
            report.outcome,
            FolderOutcome::Generated | FolderOutcome::Deleted
        ) {
            summary
                .stale_outputs
                .push(report.folder.join(options.output_file));
        }
        issues.extend(report.issues);
    }

    Ok(finish(
        CommandKind::Check,
        CommandSummary::Check(summary),
        issues,
        folders.len(),
    ))
}
