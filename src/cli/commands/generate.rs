use anyhow::{Ok, Result};
use rayon::prelude::*;

use super::super::{args::GenerateCommand, context::ProjectContext};
use super::helper::finish;
use super::{CommandKind, CommandResult, CommandSummary, FolderLine, GenerateSummary};
use crate::core::pipeline::{FolderOutcome, FolderReport, process_folder};
use crate::issues::Issue;

pub fn generate(cmd: GenerateCommand) -> Result<CommandResult> {
    let ctx = ProjectContext::new(&cmd.common)?;
    let folders = ctx.scan();
    let options = ctx.folder_options(cmd.force, cmd.dry_run);

    let reports: Vec<FolderReport> = folders
        .par_iter()
        .map(|folder| process_folder(folder, &options))
        .collect();

    let mut summary = GenerateSummary {
        folders: Vec::new(),
        generated_count: 0,
        deleted_count: 0,
        unchanged_count: 0,
        service_count: 0,
        is_dry_run: cmd.dry_run,
    };
    let mut issues: Vec<Issue> = Vec::new();

    for report in reports {
        match report.outcome {
            FolderOutcome::Generated => summary.generated_count += 1,
            FolderOutcome::Deleted => summary.deleted_count += 1,
            FolderOutcome::Unchanged => summary.unchanged_count += 1,
            FolderOutcome::NoServices => {}
        }
        summary.service_count += report.services.len();
        if matches!(
            report.outcome,
            FolderOutcome::Generated | FolderOutcome::Deleted
        ) {
            summary.folders.push(FolderLine {
                output: report.folder.join(options.output_file),
                outcome: report.outcome,
                service_count: report.services.len(),
            });
        }
        issues.extend(report.issues);
    }

    Ok(finish(
        CommandKind::Generate,
        CommandSummary::Generate(summary),
        issues,
        folders.len(),
    ))
}
