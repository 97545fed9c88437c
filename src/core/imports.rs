//! Import collection and resolution for generated code.
//!
//! Generated code needs two kinds of imports:
//! - packages the synthesized initializers call into (`time`, `strconv`,
//!   `strings`, the wiring runtime)
//! - packages named by parameter types of routed handlers
//!
//! Entries come from several files, each with its own aliases, so the
//! resolver merges them into one alias-consistent set:
//! - entries sharing a path merge into one; when aliases differ the longer
//!   alias wins, ties keep the first-seen alias
//! - entries sharing an alias with different paths: later ones are renamed
//!   `alias_1`, `alias_2`, ... until unique
//! - an alias equal to a local of the generated functions is renamed the
//!   same way, even when it is the first owner

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::core::error::GenError;
use crate::core::source::DeclarationIndex;

static QUALIFIED_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

static MAJOR_VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v[0-9]+$").unwrap());

/// Locals and parameters declared by the generated registration functions.
/// An import alias with one of these names would be shadowed inside them.
pub const GENERATED_LOCALS: &[&str] = &[
    "r", "c", "cfg", "svc", "instance", "router", "ctx", "v", "ok", "parsed", "part", "err",
];

/// True if `alias` would be shadowed by a generated local, including the
/// numbered handler locals (`arg0`, `res0`, ...).
pub fn is_generated_local(alias: &str) -> bool {
    if GENERATED_LOCALS.contains(&alias) {
        return true;
    }
    ["arg", "res"].iter().any(|prefix| {
        alias
            .strip_prefix(prefix)
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    })
}

/// A required import: package path plus the name generated code uses for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportEntry {
    pub path: String,
    pub alias: String,
}

impl ImportEntry {
    pub fn new(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: alias.into(),
        }
    }

    /// Entry using the package's conventional name.
    pub fn standard(path: &str) -> Self {
        Self::new(path, default_alias(path))
    }

    /// Standard library paths have no dot in their first segment.
    pub fn is_std(&self) -> bool {
        !self.path.split('/').next().unwrap_or("").contains('.')
    }
}

/// Conventional package name for an import path.
///
/// Uses the last path segment, skipping a trailing major-version segment
/// (`example.com/lib/v2` -> `lib`) and dropping `.vN` suffixes and `go-`
/// prefixes (`gopkg.in/yaml.v3` -> `yaml`).
pub fn default_alias(path: &str) -> String {
    let mut segments = path.rsplit('/');
    let mut last = segments.next().unwrap_or(path);
    if MAJOR_VERSION_REGEX.is_match(last)
        && let Some(prev) = segments.next()
    {
        last = prev;
    }
    let last = match last.rfind(".v") {
        Some(i) if last[i + 2..].chars().all(|c| c.is_ascii_digit()) && i + 2 < last.len() => {
            &last[..i]
        }
        _ => last,
    };
    let last = last.strip_prefix("go-").unwrap_or(last);
    last.replace(['-', '.'], "_")
}

// ============================================================
// Type Expressions
// ============================================================

/// A type as written in a source file, with its package qualifiers resolved
/// against that file's import table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub text: String,
    /// Qualifier used in `text` -> the import it refers to.
    pub qualifiers: Vec<(String, ImportEntry)>,
}

impl TypeExpr {
    pub fn resolve(text: &str, index: &DeclarationIndex) -> Self {
        let mut qualifiers: Vec<(String, ImportEntry)> = Vec::new();
        for caps in QUALIFIED_NAME_REGEX.captures_iter(text) {
            let qualifier = &caps[1];
            if qualifiers.iter().any(|(q, _)| q == qualifier) {
                continue;
            }
            match index.import_for_qualifier(qualifier) {
                Some(import) => qualifiers.push((
                    qualifier.to_string(),
                    ImportEntry::new(&import.path, &import.alias),
                )),
                None => debug!(qualifier, ty = text, "qualifier has no matching import"),
            }
        }
        Self {
            text: text.to_string(),
            qualifiers,
        }
    }

    /// Type without any package qualifier.
    pub fn local(text: &str) -> Self {
        Self {
            text: text.to_string(),
            qualifiers: Vec::new(),
        }
    }

    /// Imports needed to name this type.
    pub fn imports(&self) -> impl Iterator<Item = &ImportEntry> {
        self.qualifiers.iter().map(|(_, entry)| entry)
    }

    /// True if `qualifier.name` in this type refers to the package `path`.
    pub fn is_qualified(&self, path: &str, name: &str) -> bool {
        let Some((qualifier, rest)) = self.text.split_once('.') else {
            return false;
        };
        rest == name
            && self
                .qualifiers
                .iter()
                .any(|(q, entry)| q == qualifier && entry.path == path)
    }
}

// ============================================================
// Resolver
// ============================================================

/// Collects required imports in first-seen order.
#[derive(Debug, Default)]
pub struct ImportResolver {
    entries: Vec<ImportEntry>,
}

impl ImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: ImportEntry) {
        self.entries.push(entry);
    }

    pub fn extend<I: IntoIterator<Item = ImportEntry>>(&mut self, entries: I) {
        self.entries.extend(entries);
    }

    /// Merge and rename the collected entries.
    ///
    /// The result never contains two entries with the same alias or the same
    /// path. `GenError::ImportAmbiguity` is only returned if that invariant is
    /// broken, which the merge rules are meant to rule out.
    pub fn resolve(self) -> Result<ResolvedImports, GenError> {
        // Merge by path.
        let mut merged: Vec<ImportEntry> = Vec::new();
        let mut by_path: HashMap<String, usize> = HashMap::new();
        for entry in self.entries {
            match by_path.get(&entry.path) {
                Some(&i) => {
                    if entry.alias.len() > merged[i].alias.len() {
                        merged[i].alias = entry.alias;
                    }
                }
                None => {
                    by_path.insert(entry.path.clone(), merged.len());
                    merged.push(entry);
                }
            }
        }

        // Rename alias collisions, keeping the first-seen owner.
        let mut taken: HashSet<String> = HashSet::new();
        for entry in &mut merged {
            if taken.contains(&entry.alias) || is_generated_local(&entry.alias) {
                let base = entry.alias.clone();
                let mut n = 1;
                while taken.contains(&format!("{}_{}", base, n)) {
                    n += 1;
                }
                entry.alias = format!("{}_{}", base, n);
                debug!(path = %entry.path, alias = %entry.alias, "renamed colliding import alias");
            }
            taken.insert(entry.alias.clone());
        }

        ResolvedImports::new(merged)
    }
}

/// Final, alias-consistent import set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedImports {
    entries: Vec<ImportEntry>,
    aliases: HashMap<String, String>,
}

impl ResolvedImports {
    fn new(entries: Vec<ImportEntry>) -> Result<Self, GenError> {
        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for entry in &entries {
            if let Some(other) = owners.insert(&entry.alias, &entry.path) {
                return Err(GenError::ImportAmbiguity {
                    alias: entry.alias.clone(),
                    paths: vec![other.to_string(), entry.path.clone()],
                });
            }
            if aliases
                .insert(entry.path.clone(), entry.alias.clone())
                .is_some()
            {
                return Err(GenError::ImportAmbiguity {
                    alias: entry.alias.clone(),
                    paths: vec![entry.path.clone()],
                });
            }
        }
        Ok(Self { entries, aliases })
    }

    /// Entries in first-seen order.
    pub fn entries(&self) -> &[ImportEntry] {
        &self.entries
    }

    pub fn alias_for(&self, path: &str) -> Option<&str> {
        self.aliases.get(path).map(String::as_str)
    }

    /// Rewrite a type's qualifiers to the resolved aliases.
    pub fn render_type(&self, ty: &TypeExpr) -> String {
        if ty.qualifiers.is_empty() {
            return ty.text.clone();
        }
        QUALIFIED_NAME_REGEX
            .replace_all(&ty.text, |caps: &Captures| {
                let qualifier = &caps[1];
                let alias = ty
                    .qualifiers
                    .iter()
                    .find(|(q, _)| q == qualifier)
                    .and_then(|(_, entry)| self.alias_for(&entry.path))
                    .unwrap_or(qualifier);
                format!("{}.{}", alias, &caps[2])
            })
            .into_owned()
    }

    /// Render the `import ( ... )` block: standard library first, then the
    /// rest, each group sorted by path. Aliases are only written when they
    /// differ from the package's conventional name.
    pub fn render_block(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut std_group: Vec<&ImportEntry> = self.entries.iter().filter(|e| e.is_std()).collect();
        let mut ext_group: Vec<&ImportEntry> =
            self.entries.iter().filter(|e| !e.is_std()).collect();
        std_group.sort_by(|a, b| a.path.cmp(&b.path));
        ext_group.sort_by(|a, b| a.path.cmp(&b.path));

        let mut out = String::from("import (\n");
        for (i, group) in [std_group, ext_group]
            .into_iter()
            .filter(|g| !g.is_empty())
            .enumerate()
        {
            if i > 0 {
                out.push('\n');
            }
            for entry in group {
                if entry.alias == default_alias(&entry.path) {
                    let _ = writeln!(out, "\t\"{}\"", entry.path);
                } else {
                    let _ = writeln!(out, "\t{} \"{}\"", entry.alias, entry.path);
                }
            }
        }
        out.push_str(")\n");
        out
    }
}
