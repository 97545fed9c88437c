//! Metadata aggregation.
//!
//! Merges the validated annotations of every file in a folder into one
//! [`ServiceGeneration`] per service. A service's struct, its fields and its
//! routes may live in different files of the same package.
//!
//! Conflicts are scoped to the service: the offending service is dropped
//! from the result and reported, the rest of the folder still generates.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::collect::{Annotation, ArgValue, Directive};
use crate::core::error::GenError;
use crate::core::imports::{ImportEntry, TypeExpr};
use crate::core::source::{DeclKind, SourceFile};
use crate::issues::{ConflictIssue, IgnoredDirectiveIssue, Issue, SourceLocation};

/// Method name that marks a type as able to decode itself from text.
pub const TEXT_UNMARSHAL_HOOK: &str = "UnmarshalText";

// ============================================================
// Records
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Plain,
    Router,
}

/// Resolved `@Config` arguments for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBinding {
    pub key: String,
    pub default: Option<ArgValue>,
    pub required: bool,
    pub separator: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    Inject { dependency: String },
    Config(ConfigBinding),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub field_name: String,
    pub declared_type: TypeExpr,
    pub source: FieldSource,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerParam {
    pub name: String,
    /// Element type for variadic parameters.
    pub ty: TypeExpr,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    pub method: String,
    /// Full path, router prefix included.
    pub path: String,
    pub middleware: Vec<String>,
    pub handler: String,
    pub params: Vec<HandlerParam>,
    pub results: Vec<TypeExpr>,
    pub location: SourceLocation,
}

/// Everything needed to emit one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceGeneration {
    pub name: String,
    pub struct_name: String,
    pub kind: ServiceKind,
    pub prefix: String,
    pub fields: Vec<FieldBinding>,
    pub routes: Vec<RouteBinding>,
    /// Imports named by routed handler signatures.
    pub required_imports: Vec<ImportEntry>,
    pub location: SourceLocation,
}

/// Capability flags discovered on the types of a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCapabilities {
    text_unmarshalers: HashSet<String>,
}

impl TypeCapabilities {
    /// Scan every file of the folder for custom deserialization hooks.
    pub fn discover<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> Self {
        let text_unmarshalers = files
            .into_iter()
            .flat_map(|file| file.index.declarations())
            .filter(|decl| decl.kind == DeclKind::Method && decl.name == TEXT_UNMARSHAL_HOOK)
            .filter_map(|decl| decl.receiver.clone())
            .collect();
        Self { text_unmarshalers }
    }

    /// True if the named local type decodes itself from text.
    pub fn has_text_hook(&self, type_name: &str) -> bool {
        self.text_unmarshalers.contains(type_name)
    }
}

/// One file's share of a folder pass.
pub struct FileContribution<'a> {
    pub file: &'a SourceFile,
    pub annotations: Vec<Annotation>,
}

/// Result of aggregating a folder.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// Services keyed by service name.
    pub services: BTreeMap<String, ServiceGeneration>,
    pub issues: Vec<Issue>,
}

// ============================================================
// Aggregator
// ============================================================

pub fn aggregate(contributions: &[FileContribution<'_>]) -> Aggregation {
    let mut aggregator = Aggregator::default();

    for contribution in contributions {
        for annotation in contribution.annotations.iter().filter(|a| a.directive.is_marker()) {
            aggregator.add_marker(contribution.file, annotation);
        }
    }
    for contribution in contributions {
        for annotation in &contribution.annotations {
            match &annotation.directive {
                Directive::Inject { .. } | Directive::Config(_) => {
                    aggregator.add_field(contribution.file, annotation)
                }
                Directive::Route(_) => aggregator.add_route(contribution.file, annotation),
                _ => {}
            }
        }
    }

    aggregator.finish()
}

#[derive(Default)]
struct Aggregator {
    /// Keyed by struct name.
    services: HashMap<String, ServiceGeneration>,
    /// Struct names whose service is dropped.
    failed: HashSet<String>,
    /// Service name -> struct name.
    names: HashMap<String, String>,
    /// (struct, field) -> index into the service's fields.
    fields: HashMap<(String, String), usize>,
    /// (struct, method, path) -> route location.
    routes: HashMap<(String, String, String), String>,
    issues: Vec<Issue>,
}

impl Aggregator {
    fn add_marker(&mut self, file: &SourceFile, annotation: &Annotation) {
        let Some(struct_name) = annotation.target_name.clone() else {
            return;
        };
        let (explicit, kind, prefix) = match &annotation.directive {
            Directive::Service { name } => (name.clone(), ServiceKind::Plain, String::new()),
            Directive::Router { name, prefix } => (name.clone(), ServiceKind::Router, prefix.clone()),
            _ => return,
        };
        let name = explicit.unwrap_or_else(|| struct_name.clone());
        let location = SourceLocation::in_file(file, annotation.line);

        if let Some(existing) = self.services.get(&struct_name) {
            let other = origin(&existing.location);
            self.conflict(
                &struct_name,
                location,
                GenError::Conflict {
                    message: format!(
                        "struct `{}` carries more than one service marker",
                        struct_name
                    ),
                    other: Some(other),
                },
            );
            return;
        }

        let duplicate = self.names.insert(name.clone(), struct_name.clone());
        self.services.insert(
            struct_name.clone(),
            ServiceGeneration {
                name: name.clone(),
                struct_name: struct_name.clone(),
                kind,
                prefix,
                fields: Vec::new(),
                routes: Vec::new(),
                required_imports: Vec::new(),
                location: location.clone(),
            },
        );

        if let Some(owner) = duplicate {
            let other = self.services.get(&owner).map(|s| origin(&s.location));
            self.failed.insert(owner);
            self.conflict(
                &struct_name,
                location,
                GenError::Conflict {
                    message: format!("duplicate service name `{}`", name),
                    other,
                },
            );
        }
    }

    fn add_field(&mut self, file: &SourceFile, annotation: &Annotation) {
        let Some(field) = annotation.target_line.and_then(|l| file.index.field_at(l)) else {
            return;
        };
        let Some(field_name) = field.names.first().cloned() else {
            return;
        };
        let owner = field.owner.clone();
        if !self.services.contains_key(&owner) {
            return;
        }

        let location = SourceLocation::in_file(file, annotation.line);
        let declared_type = TypeExpr::resolve(&field.ty, &file.index);
        let source = match &annotation.directive {
            Directive::Inject { dependency } => FieldSource::Inject {
                dependency: dependency
                    .clone()
                    .unwrap_or_else(|| dependency_name(&field.ty)),
            },
            Directive::Config(spec) => {
                if spec.required == Some(true) && spec.default.is_some() {
                    self.conflict(
                        &owner,
                        location,
                        GenError::conflict(format!(
                            "config `{}` is marked required=true but also has a default",
                            spec.key
                        )),
                    );
                    return;
                }
                FieldSource::Config(ConfigBinding {
                    key: spec.key.clone(),
                    default: spec.default.clone(),
                    required: spec.required.unwrap_or(spec.default.is_none()),
                    separator: spec.separator.clone(),
                })
            }
            _ => return,
        };

        let key = (owner.clone(), field_name.clone());
        if let Some(&existing) = self.fields.get(&key) {
            let Some(service) = self.services.get(&owner) else {
                return;
            };
            let previous = &service.fields[existing];
            let message = match (&previous.source, &source) {
                (FieldSource::Inject { .. }, FieldSource::Config(_))
                | (FieldSource::Config(_), FieldSource::Inject { .. }) => format!(
                    "field `{}` carries both @Inject and @Config",
                    field_name
                ),
                _ => format!(
                    "field `{}` carries more than one @{}",
                    field_name,
                    annotation.name()
                ),
            };
            let other = Some(origin(&previous.location));
            self.conflict(&owner, location, GenError::Conflict { message, other });
            return;
        }

        if let Some(service) = self.services.get_mut(&owner) {
            self.fields.insert(key, service.fields.len());
            service.fields.push(FieldBinding {
                field_name,
                declared_type,
                source,
                location,
            });
        }
    }

    fn add_route(&mut self, file: &SourceFile, annotation: &Annotation) {
        let Directive::Route(spec) = &annotation.directive else {
            return;
        };
        let Some(decl) = annotation.target_line.and_then(|l| file.index.declaration_at(l)) else {
            return;
        };
        let Some(receiver) = decl.receiver.clone() else {
            return;
        };
        let location = SourceLocation::in_file(file, annotation.line);

        let reason = match self.services.get(&receiver) {
            None if self.failed.contains(&receiver) => return,
            None => Some(format!("receiver `{}` has no @Router marker", receiver)),
            Some(service) if service.kind == ServiceKind::Plain => Some(format!(
                "receiver `{}` is a @Service; only @Router services expose routes",
                receiver
            )),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            tracing::debug!(handler = %decl.name, "{}", reason);
            self.issues.push(Issue::IgnoredDirective(IgnoredDirectiveIssue {
                location,
                directive: annotation.name().to_string(),
                reason,
            }));
            return;
        }

        let unsupported = match decl.results.as_slice() {
            [] | [_] => false,
            [_, last] => last != "error",
            _ => true,
        };
        if unsupported {
            self.conflict(
                &receiver,
                location,
                GenError::conflict(format!(
                    "handler `{}` has an unsupported signature: results must be (), (T), (error) or (T, error)",
                    decl.name
                )),
            );
            return;
        }

        let Some(service) = self.services.get_mut(&receiver) else {
            return;
        };
        let path = join_path(&service.prefix, &spec.path);

        let key = (receiver.clone(), spec.method.clone(), path.clone());
        if let Some(other) = self.routes.get(&key).cloned() {
            self.conflict(
                &receiver,
                location,
                GenError::Conflict {
                    message: format!("duplicate route {} {}", spec.method, path),
                    other: Some(other),
                },
            );
            return;
        }
        self.routes.insert(key, origin(&location));

        let params: Vec<HandlerParam> = decl
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let (ty, variadic) = match param.ty.strip_prefix("...") {
                    Some(elem) => (elem, true),
                    None => (param.ty.as_str(), false),
                };
                HandlerParam {
                    name: if param.name.is_empty() || param.name == "_" {
                        format!("arg{}", i)
                    } else {
                        param.name.clone()
                    },
                    ty: TypeExpr::resolve(ty, &file.index),
                    variadic,
                }
            })
            .collect();
        let results: Vec<TypeExpr> = decl
            .results
            .iter()
            .map(|ty| TypeExpr::resolve(ty, &file.index))
            .collect();

        for ty in params.iter().map(|p| &p.ty).chain(results.iter()) {
            for entry in ty.imports() {
                if !service.required_imports.contains(entry) {
                    service.required_imports.push(entry.clone());
                }
            }
        }

        service.routes.push(RouteBinding {
            method: spec.method.clone(),
            path,
            middleware: spec.middleware.clone(),
            handler: decl.name.clone(),
            params,
            results,
            location,
        });
    }

    fn conflict(&mut self, struct_name: &str, location: SourceLocation, err: GenError) {
        let service = self
            .services
            .get(struct_name)
            .map_or_else(|| struct_name.to_string(), |s| s.name.clone());
        let (message, other) = match err {
            GenError::Conflict { message, other } => (message, other),
            other => (other.to_string(), None),
        };
        tracing::debug!(service = %service, "conflict: {}", message);
        self.failed.insert(struct_name.to_string());
        self.issues.push(Issue::Conflict(ConflictIssue {
            location,
            service,
            message,
            other,
        }));
    }

    fn finish(self) -> Aggregation {
        let failed = self.failed;
        let services = self
            .services
            .into_values()
            .filter(|service| !failed.contains(&service.struct_name))
            .map(|service| (service.name.clone(), service))
            .collect();
        Aggregation {
            services,
            issues: self.issues,
        }
    }
}

/// `file:line` reference used in conflict notes.
fn origin(location: &SourceLocation) -> String {
    format!("{}:{}", location.file_path, location.line)
}

/// Default dependency name for `@Inject` without arguments: the field
/// type's base name (`*models.Repo` -> `Repo`).
fn dependency_name(ty: &str) -> String {
    let base = ty.trim_start_matches(['*', '[', ']']);
    base.rsplit('.').next().unwrap_or(base).to_string()
}

fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else if path == "/" {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, path)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::collect::AnnotationCollector;
    use crate::core::validate::validate_file;
    use crate::issues::Report;

    fn parse(files: &[(&str, &str)]) -> Vec<SourceFile> {
        files
            .iter()
            .map(|(path, content)| SourceFile::parse(*path, content))
            .collect()
    }

    fn run(files: &[SourceFile]) -> Aggregation {
        let contributions: Vec<FileContribution<'_>> = files
            .iter()
            .map(|file| {
                let collected = AnnotationCollector::collect(file);
                FileContribution {
                    file,
                    annotations: validate_file(file, collected.annotations).annotations,
                }
            })
            .collect();
        aggregate(&contributions)
    }

    fn messages(result: &Aggregation) -> Vec<String> {
        result.issues.iter().map(|i| i.message()).collect()
    }

    const USERS: &str = "\
package svc

import (
\t\"context\"

\tm \"example.com/app/models\"
)

// @Router(prefix=\"/api\")
type Users struct {
\t// @Inject
\tRepo *Repository
\t// @Config(key=\"users.limit\", default=50)
\tLimit int
}
";

    const HANDLERS: &str = "\
package svc

import (
\t\"context\"

\tmodels \"example.com/app/models\"
\t\"example.com/app/audit\"
)

// @Route(\"GET /users/{id}\", \"auth\")
func (u *Users) Get(ctx context.Context, id string) (*models.User, error) {
\treturn nil, nil
}

func (u *Users) helper(a audit.Entry) {}
";

    #[test]
    fn test_service_spans_files() {
        let files = parse(&[("svc/users.go", USERS), ("svc/handlers.go", HANDLERS)]);
        let result = run(&files);
        assert!(result.issues.is_empty(), "{:?}", messages(&result));

        let users = &result.services["Users"];
        assert_eq!(users.kind, ServiceKind::Router);
        assert_eq!(users.fields.len(), 2);
        assert_eq!(
            users.fields[0].source,
            FieldSource::Inject {
                dependency: "Repository".to_string()
            }
        );
        assert_eq!(
            users.fields[1].source,
            FieldSource::Config(ConfigBinding {
                key: "users.limit".to_string(),
                default: Some(ArgValue::Bare("50".to_string())),
                required: false,
                separator: ",".to_string(),
            })
        );

        assert_eq!(users.routes.len(), 1);
        let route = &users.routes[0];
        assert_eq!(route.path, "/api/users/{id}");
        assert_eq!(route.middleware, vec!["auth"]);
        assert_eq!(route.handler, "Get");
        assert_eq!(route.params[1].name, "id");

        let imports: Vec<&str> = users.required_imports.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(imports, vec!["context", "example.com/app/models"]);
    }

    #[test]
    fn test_duplicate_route_is_a_conflict() {
        let files = parse(&[(
            "svc/a.go",
            "\
package svc

// @Router
type A struct{}

// @Route(\"GET /x\")
func (a *A) One() {}

// @Route(method=GET, path=\"/x\")
func (a *A) Two() {}

// @Service
type B struct{}
",
        )]);
        let result = run(&files);
        assert_eq!(messages(&result), vec!["duplicate route GET /x"]);
        let Issue::Conflict(issue) = &result.issues[0] else {
            panic!("expected conflict");
        };
        assert_eq!(issue.location.line, 9);
        assert_eq!(issue.other.as_deref(), Some("svc/a.go:6"));
        assert!(!result.services.contains_key("A"));
        assert!(result.services.contains_key("B"));
    }

    #[test]
    fn test_inject_and_config_on_one_field() {
        let files = parse(&[(
            "svc/a.go",
            "\
package svc

// @Service
type A struct {
\t// @Inject
\t// @Config(\"a.dep\")
\tDep *Dep
}
",
        )]);
        let result = run(&files);
        assert_eq!(
            messages(&result),
            vec!["field `Dep` carries both @Inject and @Config"]
        );
        assert!(result.services.is_empty());
    }

    #[test]
    fn test_required_with_default_is_a_conflict() {
        let files = parse(&[(
            "svc/a.go",
            "package svc\n\n// @Service\ntype A struct {\n\t// @Config(key=\"k\", default=1, required=true)\n\tN int\n}\n",
        )]);
        let result = run(&files);
        assert_eq!(
            messages(&result),
            vec!["config `k` is marked required=true but also has a default"]
        );
    }

    #[test]
    fn test_positional_config_is_required() {
        let files = parse(&[(
            "svc/a.go",
            "package svc\n\n// @Service\ntype A struct {\n\t// @Config(\"db.dsn\")\n\tDSN string\n}\n",
        )]);
        let result = run(&files);
        let FieldSource::Config(binding) = &result.services["A"].fields[0].source else {
            panic!("expected config binding");
        };
        assert!(binding.required);
        assert_eq!(binding.default, None);
    }

    #[test]
    fn test_duplicate_service_names() {
        let files = parse(&[
            ("svc/a.go", "package svc\n\n// @Service(\"store\")\ntype A struct{}\n"),
            ("svc/b.go", "package svc\n\n// @Service(name=\"store\")\ntype B struct{}\n"),
        ]);
        let result = run(&files);
        assert_eq!(messages(&result), vec!["duplicate service name `store`"]);
        assert!(result.services.is_empty());
    }

    #[test]
    fn test_two_markers_on_one_struct() {
        let files = parse(&[(
            "svc/a.go",
            "package svc\n\n// @Service\n// @Router\ntype A struct{}\n",
        )]);
        let result = run(&files);
        assert_eq!(
            messages(&result),
            vec!["struct `A` carries more than one service marker"]
        );
        assert!(result.services.is_empty());
    }

    #[test]
    fn test_route_on_plain_service_is_ignored() {
        let files = parse(&[(
            "svc/a.go",
            "package svc\n\n// @Service\ntype A struct{}\n\n// @Route(\"GET /a\")\nfunc (a *A) Get() {}\n\n// @Route(\"GET /b\")\nfunc (o *Other) Get() {}\n",
        )]);
        let result = run(&files);
        assert_eq!(
            messages(&result),
            vec![
                "@Route is ignored: receiver `A` is a @Service; only @Router services expose routes",
                "@Route is ignored: receiver `Other` has no @Router marker",
            ]
        );
        assert!(result.services["A"].routes.is_empty());
        assert!(result.issues.iter().all(|i| !i.is_error()));
    }

    #[test]
    fn test_unsupported_handler_signature() {
        let files = parse(&[(
            "svc/a.go",
            "package svc\n\n// @Router\ntype A struct{}\n\n// @Route(\"GET /a\")\nfunc (a *A) Get() (int, string) { return 0, \"\" }\n",
        )]);
        let result = run(&files);
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].message().contains("unsupported signature"));
        assert!(result.services.is_empty());
    }

    #[test]
    fn test_variadic_and_unnamed_params() {
        let files = parse(&[(
            "svc/a.go",
            "package svc\n\n// @Router\ntype A struct{}\n\n// @Route(\"POST /\")\nfunc (a *A) Post(_ int, tags ...string) error { return nil }\n",
        )]);
        let result = run(&files);
        let route = &result.services["A"].routes[0];
        assert_eq!(route.params[0].name, "arg0");
        assert_eq!(route.params[1].ty.text, "string");
        assert!(route.params[1].variadic);
    }

    #[test]
    fn test_capabilities_discovery() {
        let files = parse(&[(
            "svc/level.go",
            "package svc\n\ntype Level int\n\nfunc (l *Level) UnmarshalText(b []byte) error { return nil }\n",
        )]);
        let caps = TypeCapabilities::discover(&files);
        assert!(caps.has_text_hook("Level"));
        assert!(!caps.has_text_hook("Other"));
    }

    #[test]
    fn test_dependency_name() {
        assert_eq!(dependency_name("*Repository"), "Repository");
        assert_eq!(dependency_name("*models.Repo"), "Repo");
        assert_eq!(dependency_name("Mailer"), "Mailer");
    }
}
