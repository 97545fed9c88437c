//! Directive scanner: tells real directives apart from documentation prose.
//!
//! A comment line is a directive when its content, right after `//`, starts
//! with `@`, optionally preceded by exactly one space:
//!
//! ```go
//! //@Service
//! // @Config(key="http.timeout", default="15m")
//! ```
//!
//! Content starting with a tab or with two or more spaces is a documentation
//! code sample (gofmt's convention for examples in doc comments) and is never
//! a directive:
//!
//! ```go
//! // Example:
//! //
//! //	// @Service
//! //	type Example struct{}
//! ```
//!
//! Every consumer that asks "does this file contain directives" goes through
//! [`classify_line`], so the cheap pre-scan and the full parser always agree.

/// Marks the start of a directive name.
pub const DIRECTIVE_SIGIL: char = '@';

/// Directive names that promote a struct into a service.
pub const MARKER_DIRECTIVES: &[&str] = &["Service", "Router"];

/// Every directive name the generator understands.
pub const KNOWN_DIRECTIVES: &[&str] = &["Service", "Router", "Inject", "Config", "Route"];

/// Classification of a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentLine<'a> {
    /// Directive; holds the text after the sigil (`Config(key="x")`).
    Directive(&'a str),
    /// Indented documentation sample that merely looks like a directive.
    Example,
    /// Any other comment.
    Prose,
    /// Not a `//` comment line.
    Code,
}

/// Classify one raw source line.
pub fn classify_line(line: &str) -> CommentLine<'_> {
    let Some(content) = line.trim_start().strip_prefix("//") else {
        return CommentLine::Code;
    };

    if content.starts_with('\t') || content.starts_with("  ") {
        return CommentLine::Example;
    }

    let content = content.strip_prefix(' ').unwrap_or(content);
    match content.strip_prefix(DIRECTIVE_SIGIL) {
        Some(rest) => CommentLine::Directive(rest),
        None => CommentLine::Prose,
    }
}

/// Leading identifier of a directive body (`Config(key="x")` -> `Config`).
pub fn directive_name(body: &str) -> &str {
    let end = body
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    &body[..end]
}

/// Name of a known directive on this line, if any.
pub fn known_directive(line: &str) -> Option<&'static str> {
    match classify_line(line) {
        CommentLine::Directive(body) => {
            let name = directive_name(body);
            KNOWN_DIRECTIVES.iter().copied().find(|known| *known == name)
        }
        _ => None,
    }
}

/// Cheap pre-scan: does the content hold any known directive?
pub fn has_directives(content: &str) -> bool {
    content.lines().any(|line| known_directive(line).is_some())
}

/// Cheap pre-scan: does the content hold a service-marker directive?
pub fn has_service_marker(content: &str) -> bool {
    content
        .lines()
        .filter_map(known_directive)
        .any(|name| MARKER_DIRECTIVES.contains(&name))
}
