//! Annotation collector.
//!
//! Walks a file once, runs every directive line through the parser and binds
//! the result to the first following code line. Syntax errors are local to
//! their line: the collector records an issue and keeps going, so one bad
//! directive never hides the rest of the file.
//!
//! ```go
//! // @Router(prefix="/api")
//! //
//! // Users serves the user endpoints.
//! type Users struct {   // <- target of @Router
//! ```

use crate::core::collect::directive::{Annotation, parse_directive};
use crate::core::collect::scanner::{CommentLine, classify_line, directive_name};
use crate::core::source::{LineTarget, SourceFile};
use crate::issues::{DirectiveSyntaxIssue, Issue, SourceLocation};

/// Everything collected from one file.
#[derive(Debug, Default)]
pub struct FileAnnotations {
    /// Parsed directives in line order.
    pub annotations: Vec<Annotation>,
    /// Syntax errors, one per malformed directive.
    pub issues: Vec<Issue>,
}

/// Collects annotations from a scanned source file.
pub struct AnnotationCollector;

impl AnnotationCollector {
    pub fn collect(file: &SourceFile) -> FileAnnotations {
        let mut result = FileAnnotations::default();

        for (idx, text) in file.lines.iter().enumerate() {
            let line = idx + 1;
            let CommentLine::Directive(body) = classify_line(text) else {
                continue;
            };

            match parse_directive(body) {
                Ok(None) => {}
                Ok(Some((directive, args))) => {
                    let target_line = file.next_code_line(line);
                    let target_name = target_line.and_then(|target| Self::target_name(file, target));
                    result.annotations.push(Annotation {
                        directive,
                        args,
                        line,
                        target_line,
                        target_name,
                        file: file.path.clone(),
                    });
                }
                Err(err) => {
                    tracing::debug!(
                        file = %file.display_path(),
                        line,
                        "malformed directive: {}",
                        err
                    );
                    result
                        .issues
                        .push(Issue::DirectiveSyntax(DirectiveSyntaxIssue {
                            location: SourceLocation::in_file(file, line),
                            directive: directive_name(body).to_string(),
                            error: err.to_string(),
                        }));
                }
            }
        }

        result
    }

    fn target_name(file: &SourceFile, line: usize) -> Option<String> {
        match file.index.target_at(line) {
            LineTarget::Declaration(decl) => Some(decl.name.clone()),
            LineTarget::Field(field) => field.names.first().cloned(),
            LineTarget::Other => None,
        }
    }
}
