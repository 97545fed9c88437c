//! Structural validation of directive placement.
//!
//! Placement is checked per file against that file's own declaration index:
//!
//! - `@Service` / `@Router` must precede a struct declaration.
//! - `@Inject` / `@Config` must precede a single-name struct field. When the
//!   enclosing struct carries no marker, the directive is dropped with a
//!   warning: the type may be used as a plain value elsewhere.
//! - `@Route` must precede a method declaration.
//!
//! Any placement error aborts generation for the whole file; all placement
//! errors of the file are still reported together.

use std::collections::HashSet;

use crate::core::collect::{Annotation, Directive};
use crate::core::error::GenError;
use crate::core::source::{DeclKind, LineTarget, SourceFile};
use crate::issues::{IgnoredDirectiveIssue, Issue, PlacementIssue, SourceLocation};

/// Outcome of validating one file.
#[derive(Debug, Default)]
pub struct ValidatedFile {
    /// Annotations that may contribute to generation.
    pub annotations: Vec<Annotation>,
    pub issues: Vec<Issue>,
    /// True if a placement error disqualified the whole file.
    pub rejected: bool,
}

pub fn validate_file(file: &SourceFile, annotations: Vec<Annotation>) -> ValidatedFile {
    let mut result = ValidatedFile::default();

    for annotation in &annotations {
        if let Err(err) = check_placement(file, annotation) {
            result.rejected = true;
            result.issues.push(placement_issue(file, annotation, err));
        }
    }

    if result.rejected {
        tracing::debug!(
            file = %file.display_path(),
            "placement errors, file skipped"
        );
        result.annotations.clear();
        return result;
    }

    let marked: HashSet<&str> = annotations
        .iter()
        .filter(|a| a.directive.is_marker())
        .filter_map(|a| a.target_name.as_deref())
        .collect();

    let mut kept = Vec::with_capacity(annotations.len());
    for annotation in &annotations {
        if annotation.directive.is_field_directive()
            && let Some(field) = annotation.target_line.and_then(|l| file.index.field_at(l))
            && !marked.contains(field.owner.as_str())
        {
            result
                .issues
                .push(Issue::IgnoredDirective(IgnoredDirectiveIssue {
                    location: SourceLocation::in_file(file, annotation.line),
                    directive: annotation.name().to_string(),
                    reason: format!(
                        "struct `{}` has no @Service or @Router marker",
                        field.owner
                    ),
                }));
            continue;
        }
        kept.push(annotation.clone());
    }

    result.annotations = kept;
    result
}

/// Check that a directive precedes the declaration kind it applies to.
fn check_placement(file: &SourceFile, annotation: &Annotation) -> Result<(), GenError> {
    let target = annotation
        .target_line
        .map(|line| file.index.target_at(line));

    let expected = match &annotation.directive {
        Directive::Service { .. } | Directive::Router { .. } => {
            if let Some(LineTarget::Declaration(decl)) = target
                && decl.kind == DeclKind::Struct
            {
                return Ok(());
            }
            "struct declaration"
        }
        Directive::Inject { .. } | Directive::Config(_) => {
            if let Some(LineTarget::Field(field)) = target
                && field.names.len() == 1
            {
                return Ok(());
            }
            "single-name struct field"
        }
        Directive::Route(_) => {
            if let Some(LineTarget::Declaration(decl)) = target
                && decl.kind == DeclKind::Method
            {
                return Ok(());
            }
            "method declaration"
        }
    };

    Err(GenError::Placement {
        directive: annotation.name().to_string(),
        expected,
        found: describe_target(file, annotation.target_line, target),
    })
}

fn describe_target(file: &SourceFile, line: Option<usize>, target: Option<LineTarget<'_>>) -> String {
    match target {
        Some(LineTarget::Declaration(decl)) => format!("{} `{}`", decl.kind, decl.name),
        Some(LineTarget::Field(field)) => format!("field list `{}`", field.names.join(", ")),
        Some(LineTarget::Other) => {
            let text = line.and_then(|l| file.line(l)).unwrap_or_default().trim();
            format!("`{}`", text)
        }
        None => "end of file".to_string(),
    }
}

fn placement_issue(file: &SourceFile, annotation: &Annotation, err: GenError) -> Issue {
    let location = SourceLocation::in_file(file, annotation.line);
    match err {
        GenError::Placement {
            directive,
            expected,
            found,
        } => Issue::Placement(PlacementIssue {
            location,
            directive,
            expected,
            found,
        }),
        other => Issue::Placement(PlacementIssue {
            location,
            directive: annotation.name().to_string(),
            expected: "valid target",
            found: other.to_string(),
        }),
    }
}
