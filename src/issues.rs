//! Issue types for generation results.
//!
//! Every problem the pipeline can report to a user is one of these. Each issue
//! is self-contained: it carries its file, line and the offending source line,
//! so the reporter never has to go back to the source tree.

use enum_dispatch::enum_dispatch;

use crate::core::source::SourceFile;

// ============================================================
// Severity and Rule
// ============================================================

/// Severity level of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Rule identifier for each issue type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rule {
    DirectiveSyntax,
    Placement,
    Conflict,
    IgnoredDirective,
    ReadError,
    Internal,
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::DirectiveSyntax => write!(f, "directive-syntax"),
            Rule::Placement => write!(f, "placement"),
            Rule::Conflict => write!(f, "conflict"),
            Rule::IgnoredDirective => write!(f, "ignored-directive"),
            Rule::ReadError => write!(f, "read-error"),
            Rule::Internal => write!(f, "internal"),
        }
    }
}

// ============================================================
// Source Location
// ============================================================

/// A line in a scanned file, with the line text kept for context display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file_path: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column (in characters).
    pub col: usize,
    pub source_line: String,
}

impl SourceLocation {
    pub fn new(
        file_path: impl Into<String>,
        line: usize,
        col: usize,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            line,
            col,
            source_line: source_line.into(),
        }
    }

    /// Location of `line` in `file`. The column points at the directive
    /// sigil when the line holds one, otherwise at the first non-blank char.
    pub fn in_file(file: &SourceFile, line: usize) -> Self {
        let text = file.line(line).unwrap_or_default();
        let col = text
            .chars()
            .position(|c| c == '@')
            .or_else(|| text.chars().position(|c| !c.is_whitespace()))
            .map(|i| i + 1)
            .unwrap_or(1);
        Self::new(file.display_path(), line, col, text)
    }
}

// ============================================================
// Issue Types - Directive Level
// ============================================================

/// Directive arguments could not be tokenized or resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveSyntaxIssue {
    pub location: SourceLocation,
    pub directive: String,
    pub error: String,
}

impl DirectiveSyntaxIssue {
    pub fn severity() -> Severity {
        Severity::Error
    }

    pub fn rule() -> Rule {
        Rule::DirectiveSyntax
    }
}

/// A directive sits above the wrong kind of declaration.
///
/// Aborts generation for the owning file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementIssue {
    pub location: SourceLocation,
    pub directive: String,
    /// What the directive must precede ("struct declaration", "method").
    pub expected: &'static str,
    /// What it precedes instead, e.g. "function `NewUsers`".
    pub found: String,
}

impl PlacementIssue {
    pub fn severity() -> Severity {
        Severity::Error
    }

    pub fn rule() -> Rule {
        Rule::Placement
    }
}

/// Conflicting metadata for one service.
///
/// Aborts generation for that service only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictIssue {
    pub location: SourceLocation,
    pub service: String,
    pub message: String,
    /// Where the other side of the conflict was declared.
    pub other: Option<String>,
}

impl ConflictIssue {
    pub fn severity() -> Severity {
        Severity::Error
    }

    pub fn rule() -> Rule {
        Rule::Conflict
    }
}

/// A well-formed directive that has no effect where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredDirectiveIssue {
    pub location: SourceLocation,
    pub directive: String,
    pub reason: String,
}

impl IgnoredDirectiveIssue {
    pub fn severity() -> Severity {
        Severity::Warning
    }

    pub fn rule() -> Rule {
        Rule::IgnoredDirective
    }
}

// ============================================================
// Special Issue Types
// ============================================================

/// File could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadErrorIssue {
    pub file_path: String,
    pub error: String,
}

impl ReadErrorIssue {
    pub fn severity() -> Severity {
        Severity::Error
    }

    pub fn rule() -> Rule {
        Rule::ReadError
    }
}

/// Generation failed for a folder for a reason that is not the user's
/// source: an invariant violation or an I/O failure while writing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalIssue {
    pub file_path: String,
    pub error: String,
}

impl InternalIssue {
    pub fn severity() -> Severity {
        Severity::Error
    }

    pub fn rule() -> Rule {
        Rule::Internal
    }
}

// ============================================================
// Issue Enum
// ============================================================

/// A problem found while generating a folder.
#[enum_dispatch(Report)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    DirectiveSyntax(DirectiveSyntaxIssue),
    Placement(PlacementIssue),
    Conflict(ConflictIssue),
    IgnoredDirective(IgnoredDirectiveIssue),
    ReadError(ReadErrorIssue),
    Internal(InternalIssue),
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::DirectiveSyntax(_) => DirectiveSyntaxIssue::severity(),
            Issue::Placement(_) => PlacementIssue::severity(),
            Issue::Conflict(_) => ConflictIssue::severity(),
            Issue::IgnoredDirective(_) => IgnoredDirectiveIssue::severity(),
            Issue::ReadError(_) => ReadErrorIssue::severity(),
            Issue::Internal(_) => InternalIssue::severity(),
        }
    }

    pub fn rule(&self) -> Rule {
        match self {
            Issue::DirectiveSyntax(_) => DirectiveSyntaxIssue::rule(),
            Issue::Placement(_) => PlacementIssue::rule(),
            Issue::Conflict(_) => ConflictIssue::rule(),
            Issue::IgnoredDirective(_) => IgnoredDirectiveIssue::rule(),
            Issue::ReadError(_) => ReadErrorIssue::rule(),
            Issue::Internal(_) => InternalIssue::rule(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

// ============================================================
// Report Trait (for CLI output)
// ============================================================

/// Location information for report output.
pub enum ReportLocation<'a> {
    /// Line in a source file (has source_line for context display).
    Source(&'a SourceLocation),
    /// File- or folder-level only.
    File { path: &'a str },
}

impl<'a> ReportLocation<'a> {
    pub fn file_path(&self) -> &'a str {
        match self {
            ReportLocation::Source(loc) => &loc.file_path,
            ReportLocation::File { path } => path,
        }
    }
}

/// Trait for types that can be reported to CLI.
///
/// Uses `enum_dispatch` for zero-cost dispatch on the `Issue` enum.
#[enum_dispatch]
pub trait Report {
    fn location(&self) -> ReportLocation<'_>;

    /// Primary message to display.
    fn message(&self) -> String;

    fn report_severity(&self) -> Severity;

    fn report_rule(&self) -> Rule;

    /// Optional hint for fixing the issue.
    fn hint(&self) -> Option<&str> {
        None
    }

    /// Optional details for the "= note:" line.
    fn details(&self) -> Option<String> {
        None
    }
}

// ============================================================
// Report Implementations
// ============================================================

impl Report for DirectiveSyntaxIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        format!("malformed @{}: {}", self.directive, self.error)
    }

    fn report_severity(&self) -> Severity {
        Self::severity()
    }

    fn report_rule(&self) -> Rule {
        Self::rule()
    }
}

impl Report for PlacementIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        format!(
            "@{} must precede a {}, found {}",
            self.directive, self.expected, self.found
        )
    }

    fn report_severity(&self) -> Severity {
        Self::severity()
    }

    fn report_rule(&self) -> Rule {
        Self::rule()
    }

    fn details(&self) -> Option<String> {
        Some("no code is generated for this file until the directive is moved".to_string())
    }
}

impl Report for ConflictIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn report_severity(&self) -> Severity {
        Self::severity()
    }

    fn report_rule(&self) -> Rule {
        Self::rule()
    }

    fn details(&self) -> Option<String> {
        match &self.other {
            Some(other) => Some(format!(
                "service `{}` is skipped; also declared at {}",
                self.service, other
            )),
            None => Some(format!("service `{}` is skipped", self.service)),
        }
    }
}

impl Report for IgnoredDirectiveIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::Source(&self.location)
    }

    fn message(&self) -> String {
        format!("@{} is ignored: {}", self.directive, self.reason)
    }

    fn report_severity(&self) -> Severity {
        Self::severity()
    }

    fn report_rule(&self) -> Rule {
        Self::rule()
    }
}

impl Report for ReadErrorIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::File {
            path: &self.file_path,
        }
    }

    fn message(&self) -> String {
        self.error.clone()
    }

    fn report_severity(&self) -> Severity {
        Self::severity()
    }

    fn report_rule(&self) -> Rule {
        Self::rule()
    }
}

impl Report for InternalIssue {
    fn location(&self) -> ReportLocation<'_> {
        ReportLocation::File {
            path: &self.file_path,
        }
    }

    fn message(&self) -> String {
        self.error.clone()
    }

    fn report_severity(&self) -> Severity {
        Self::severity()
    }

    fn report_rule(&self) -> Rule {
        Self::rule()
    }

    fn hint(&self) -> Option<&str> {
        Some("this is a bug in wiregen; please report it")
    }
}

// ============================================================
// Ordering for Issue (for sorting in reports)
// ============================================================

impl Issue {
    fn sort_file_path(&self) -> &str {
        match self.location() {
            ReportLocation::Source(loc) => &loc.file_path,
            ReportLocation::File { path } => path,
        }
    }

    fn sort_line(&self) -> usize {
        match self.location() {
            ReportLocation::Source(loc) => loc.line,
            ReportLocation::File { .. } => 0,
        }
    }

    fn sort_col(&self) -> usize {
        match self.location() {
            ReportLocation::Source(loc) => loc.col,
            ReportLocation::File { .. } => 0,
        }
    }
}

impl Ord for Issue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: file_path, line, col, rule, message
        self.sort_file_path()
            .cmp(other.sort_file_path())
            .then_with(|| self.sort_line().cmp(&other.sort_line()))
            .then_with(|| self.sort_col().cmp(&other.sort_col()))
            .then_with(|| self.rule().cmp(&other.rule()))
            .then_with(|| self.message().cmp(&other.message()))
    }
}

impl PartialOrd for Issue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================
// Tests
// ============================================================
