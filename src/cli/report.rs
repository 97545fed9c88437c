//! Report formatting and printing utilities.
//!
//! This module provides functions to display issues in cargo-style format.
//! Separate from core logic to allow wiregen to be used as a library.

use std::io::{self, Write};

use colored::Colorize;
use unicode_width::UnicodeWidthStr;

use super::commands::{
    CheckSummary, CleanSummary, CommandResult, CommandSummary, GenerateSummary, InitSummary,
};
use crate::config::CONFIG_FILE_NAME;
use crate::core::pipeline::FolderOutcome;
use crate::core::source::display_path;
use crate::issues::{Issue, Report, ReportLocation, Severity};

/// Success mark for consistent output formatting.
pub const SUCCESS_MARK: &str = "\u{2713}"; // ✓

/// Failure mark for consistent output formatting.
pub const FAILURE_MARK: &str = "\u{2718}"; // ✘

/// Print issues to a custom writer.
///
/// Useful for testing or redirecting output.
pub fn report_to<W: Write>(issues: &[Issue], writer: &mut W) {
    if issues.is_empty() {
        return;
    }

    let mut sorted = issues.to_vec();
    sorted.sort();

    let max_line_width = calculate_max_line_width(&sorted);

    for issue in &sorted {
        print_issue(issue, writer, max_line_width);
    }

    print_summary(&sorted, writer);
}

// ============================================================
// Internal Functions
// ============================================================

fn print_issue<W: Write>(issue: &Issue, writer: &mut W, max_line_width: usize) {
    let severity = issue.report_severity();
    let severity_str = match severity {
        Severity::Error => "error".bold().red(),
        Severity::Warning => "warning".bold().yellow(),
    };

    let _ = writeln!(
        writer,
        "{}: {}  {}",
        severity_str,
        issue.message(),
        issue.report_rule().to_string().dimmed().cyan()
    );

    match issue.location() {
        ReportLocation::Source(loc) => {
            let _ = writeln!(
                writer,
                "  {} {}:{}:{}",
                "-->".blue(),
                loc.file_path,
                loc.line,
                loc.col
            );

            let caret_char = match severity {
                Severity::Error => "^".red(),
                Severity::Warning => "^".yellow(),
            };
            let _ = writeln!(
                writer,
                "{:>width$} {}",
                "",
                "|".blue(),
                width = max_line_width
            );
            let _ = writeln!(
                writer,
                "{:>width$} {} {}",
                loc.line.to_string().blue(),
                "|".blue(),
                loc.source_line,
                width = max_line_width
            );

            // Caret pointing to the column (col is 1-based)
            let prefix: String = loc
                .source_line
                .chars()
                .take(loc.col.saturating_sub(1))
                .collect();
            let caret_padding = UnicodeWidthStr::width(prefix.as_str());
            let _ = writeln!(
                writer,
                "{:>width$} {} {:>padding$}{}",
                "",
                "|".blue(),
                "",
                caret_char,
                width = max_line_width,
                padding = caret_padding
            );
        }
        ReportLocation::File { path } => {
            let _ = writeln!(writer, "  {} {}", "-->".blue(), path);
        }
    }

    if let Some(details) = issue.details() {
        let _ = writeln!(
            writer,
            "{:>width$} {} {} {}",
            "",
            "=".blue(),
            "note:".bold(),
            details,
            width = max_line_width
        );
    }

    if let Some(hint) = issue.hint() {
        let _ = writeln!(
            writer,
            "{:>width$} {} {} {}",
            "",
            "=".blue(),
            "hint:".bold().cyan(),
            hint,
            width = max_line_width
        );
    }

    let _ = writeln!(writer); // Empty line between issues
}

fn print_summary<W: Write>(issues: &[Issue], writer: &mut W) {
    let total_errors = issues
        .iter()
        .filter(|i| i.report_severity() == Severity::Error)
        .count();
    let total_warnings = issues
        .iter()
        .filter(|i| i.report_severity() == Severity::Warning)
        .count();
    let total_problems = total_errors + total_warnings;

    if total_problems > 0 {
        let _ = writeln!(
            writer,
            "{} {} problems ({} {}, {} {})",
            FAILURE_MARK.red(),
            total_problems,
            total_errors,
            if total_errors == 1 { "error" } else { "errors" }.red(),
            total_warnings,
            if total_warnings == 1 {
                "warning"
            } else {
                "warnings"
            }
            .yellow()
        );
    }
}

fn calculate_max_line_width(issues: &[Issue]) -> usize {
    issues
        .iter()
        .filter_map(|i| match i.location() {
            ReportLocation::Source(loc) => Some(loc.line),
            ReportLocation::File { .. } => None,
        })
        .max()
        .map(|n| n.to_string().len())
        .unwrap_or(1)
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

// ============================================================
// Command Output
// ============================================================

pub fn print(result: &CommandResult) {
    let mut stdout = io::stdout().lock();
    print_to(result, &mut stdout);
}

pub fn print_to<W: Write>(result: &CommandResult, writer: &mut W) {
    match &result.summary {
        CommandSummary::Generate(summary) => print_generate(summary, result, writer),
        CommandSummary::Check(summary) => print_check(summary, result, writer),
        CommandSummary::Clean(summary) => print_clean(summary, writer),
        CommandSummary::Init(summary) => print_init(summary),
    }
}

fn print_generate<W: Write>(summary: &GenerateSummary, result: &CommandResult, writer: &mut W) {
    for line in &summary.folders {
        let path = display_path(&line.output);
        let text = match (line.outcome, summary.is_dry_run) {
            (FolderOutcome::Generated, false) => format!(
                "{} {} ({})",
                "Generated".green().bold(),
                path,
                plural(line.service_count, "service")
            ),
            (FolderOutcome::Generated, true) => format!(
                "{} {} ({})",
                "Would generate".yellow().bold(),
                path,
                plural(line.service_count, "service")
            ),
            (FolderOutcome::Deleted, false) => format!("{} {}", "Removed".green().bold(), path),
            (FolderOutcome::Deleted, true) => format!("{} {}", "Would remove".yellow().bold(), path),
            _ => continue,
        };
        let _ = writeln!(writer, "{}", text);
    }
    if !summary.folders.is_empty() && !result.issues.is_empty() {
        let _ = writeln!(writer);
    }

    report_to(&result.issues, writer);

    if result.error_count == 0 {
        let _ = writeln!(
            writer,
            "{} {}",
            SUCCESS_MARK.green(),
            format!(
                "Processed {}: {} generated, {} removed, {} unchanged",
                plural(result.folders_checked, "folder"),
                summary.generated_count,
                summary.deleted_count,
                summary.unchanged_count
            )
            .green()
        );
    }
    if summary.is_dry_run && (summary.generated_count + summary.deleted_count) > 0 {
        let _ = writeln!(writer, "Run without {} to write these files.", "--dry-run".cyan());
    }
}

fn print_check<W: Write>(summary: &CheckSummary, result: &CommandResult, writer: &mut W) {
    report_to(&result.issues, writer);

    for path in &summary.stale_outputs {
        let _ = writeln!(
            writer,
            "{} {} is out of date",
            "note:".bold(),
            display_path(path)
        );
    }

    if result.issues.is_empty() {
        let _ = writeln!(
            writer,
            "{} {}",
            SUCCESS_MARK.green(),
            format!(
                "Checked {}, {} - no issues found",
                plural(result.folders_checked, "folder"),
                plural(summary.service_count, "service")
            )
            .green()
        );
    }
}

fn print_clean<W: Write>(summary: &CleanSummary, writer: &mut W) {
    for path in &summary.removed {
        let _ = writeln!(writer, "{} {}", "Removed".green().bold(), display_path(path));
    }
    let _ = writeln!(
        writer,
        "{} {}",
        SUCCESS_MARK.green(),
        format!("Removed {}", plural(summary.removed.len(), "file")).green()
    );
}

fn print_init(summary: &InitSummary) {
    if let Some(error) = &summary.error {
        eprintln!("Error: {}", error);
    } else if summary.created {
        println!(
            "{} {}",
            SUCCESS_MARK.green(),
            format!("Created {}", CONFIG_FILE_NAME).green()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::{CommandKind, helper::finish};
    use crate::issues::{
        ConflictIssue, IgnoredDirectiveIssue, InternalIssue, PlacementIssue, SourceLocation,
    };

    fn strip_ansi(s: &str) -> String {
        let mut result = String::new();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next == 'm' {
                        break;
                    }
                }
            } else {
                result.push(c);
            }
        }
        result
    }

    fn render(issues: &[Issue]) -> String {
        let mut output = Vec::new();
        report_to(issues, &mut output);
        strip_ansi(&String::from_utf8(output).unwrap())
    }

    fn placement() -> Issue {
        Issue::Placement(PlacementIssue {
            location: SourceLocation::new("svc/users.go", 12, 4, "// @Service"),
            directive: "Service".to_string(),
            expected: "struct declaration",
            found: "function `NewUsers`".to_string(),
        })
    }

    #[test]
    fn test_report_empty() {
        let mut output = Vec::new();
        report_to(&[], &mut output);
        assert!(output.is_empty());
    }

    #[test]
    fn test_report_placement_issue() {
        let out = render(&[placement()]);

        assert!(out.contains(
            "error: @Service must precede a struct declaration, found function `NewUsers`  placement"
        ));
        assert!(out.contains("  --> svc/users.go:12:4\n"));
        assert!(out.contains("12 | // @Service\n"));
        assert!(out.contains("   |    ^\n"));
        assert!(out.contains("= note: no code is generated for this file"));
        assert!(out.contains("1 problems (1 error, 0 warnings)"));
    }

    #[test]
    fn test_report_conflict_with_other_location() {
        let issue = Issue::Conflict(ConflictIssue {
            location: SourceLocation::new("svc/b.go", 3, 4, "// @Service(\"users\")"),
            service: "users".to_string(),
            message: "duplicate service name `users`".to_string(),
            other: Some("svc/a.go:7".to_string()),
        });
        let out = render(&[issue]);

        assert!(out.contains("error: duplicate service name `users`  conflict"));
        assert!(out.contains("= note: service `users` is skipped; also declared at svc/a.go:7"));
    }

    #[test]
    fn test_report_file_level_issue_has_no_context() {
        let issue = Issue::Internal(InternalIssue {
            file_path: "svc/zz_wiregen.go".to_string(),
            error: "Failed to replace file".to_string(),
        });
        let out = render(&[issue]);

        assert!(out.contains("  --> svc/zz_wiregen.go\n"));
        assert!(!out.contains(" | "));
        assert!(out.contains("= hint: this is a bug in wiregen"));
    }

    #[test]
    fn test_report_sorts_and_counts() {
        let warning = Issue::IgnoredDirective(IgnoredDirectiveIssue {
            location: SourceLocation::new("svc/a.go", 5, 4, "// @Route(\"GET /x\")"),
            directive: "Route".to_string(),
            reason: "receiver `A` has no @Router marker".to_string(),
        });
        let out = render(&[placement(), warning]);

        let first = out.find("svc/a.go").unwrap();
        let second = out.find("svc/users.go").unwrap();
        assert!(first < second);
        assert!(out.contains("2 problems (1 error, 1 warning)"));
    }

    #[test]
    fn test_print_clean_summary() {
        let result = finish(
            CommandKind::Clean,
            CommandSummary::Clean(CleanSummary {
                removed: vec!["./svc/zz_wiregen.go".into()],
            }),
            Vec::new(),
            1,
        );
        let mut output = Vec::new();
        print_to(&result, &mut output);
        let out = strip_ansi(&String::from_utf8(output).unwrap());

        assert!(out.contains("Removed svc/zz_wiregen.go\n"));
        assert!(out.contains("Removed 1 file"));
    }
}
