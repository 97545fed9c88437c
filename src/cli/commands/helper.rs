use super::{CommandKind, CommandResult, CommandSummary};
use crate::issues::{Issue, Severity};

pub fn finish(
    kind: CommandKind,
    summary: CommandSummary,
    mut issues: Vec<Issue>,
    folders_checked: usize,
) -> CommandResult {
    issues.sort();

    let internal_error_count = issues
        .iter()
        .filter(|i| matches!(i, Issue::Internal(_)))
        .count();

    let mut error_count = issues
        .iter()
        .filter(|i| i.severity() == Severity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    if let CommandSummary::Init(ref summary) = summary
        && summary.error.is_some()
    {
        error_count += 1;
    }

    CommandResult {
        kind,
        summary,
        error_count,
        warning_count,
        internal_error_count,
        issues,
        folders_checked,
    }
}
