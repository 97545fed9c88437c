//! Source files and the per-file declaration index.
//!
//! The index is a line-oriented view of a Go file. It knows just enough
//! structure to answer "what is declared on line N" for directive placement,
//! plus the file's import table and method signatures for route adapters.
//!
//! It is rebuilt for every pass and never shared between files, so every file
//! can be validated on its own.
//!
//! ## Recognized constructs
//!
//! - `package name`
//! - `import "path"`, `import alias "path"` and grouped `import ( ... )`
//! - `type X struct { ... }` (fields are indexed), `type X interface { ... }`
//! - `type X = Y` and `type X Y` (both indexed as aliases)
//! - `func Name(...)` and `func (r *T) Name(...) ...`, possibly spanning lines
//! - the same type specs inside a grouped `type ( ... )` declaration

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::imports::default_alias;

static IMPORT_SPEC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:([A-Za-z_][A-Za-z0-9_]*|\.)\s+)?"([^"]+)""#).unwrap()
});

static TYPE_SPEC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(\[[^\]]*\])?\s*(=)?\s*(.*)$").unwrap()
});

static FIELD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(?:\s*,\s*[A-Za-z_][A-Za-z0-9_]*)*)\s+(\S.*)$").unwrap()
});

static NAMED_PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s+(\S.*)$").unwrap());

/// Signatures spanning more lines than this are not indexed.
const MAX_SIGNATURE_LINES: usize = 32;

/// Keywords that can start an unnamed parameter type (`chan int`, `func()`).
const TYPE_KEYWORDS: &[&str] = &["chan", "func", "map", "struct", "interface"];

// ============================================================
// Declarations
// ============================================================

/// Kind of construct declared on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Struct,
    Interface,
    Alias,
    Function,
    Method,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Struct => write!(f, "struct"),
            DeclKind::Interface => write!(f, "interface"),
            DeclKind::Alias => write!(f, "type alias"),
            DeclKind::Function => write!(f, "function"),
            DeclKind::Method => write!(f, "method"),
        }
    }
}

/// A function or method parameter. `name` is empty for unnamed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    /// 1-based line of the declaration keyword.
    pub line: usize,
    /// Base receiver type name for methods (`*Svc[T]` -> `Svc`).
    pub receiver: Option<String>,
    pub params: Vec<Param>,
    pub results: Vec<String>,
}

/// A named field line inside a struct body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    /// Field names declared on the line (`A, B int` declares two).
    pub names: Vec<String>,
    pub ty: String,
    pub line: usize,
    /// Name of the enclosing struct.
    pub owner: String,
}

/// One entry of a file's import table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImport {
    /// Name the file uses to refer to the package.
    pub alias: String,
    pub path: String,
    /// True if the alias was written explicitly in the import spec.
    pub explicit: bool,
    pub line: usize,
}

/// What a line of code declares.
#[derive(Debug, Clone, Copy)]
pub enum LineTarget<'a> {
    Declaration(&'a Declaration),
    Field(&'a StructField),
    Other,
}

// ============================================================
// Declaration Index
// ============================================================

/// Line-indexed declarations of a single file.
#[derive(Debug, Default)]
pub struct DeclarationIndex {
    pub package: Option<String>,
    pub imports: Vec<FileImport>,
    declarations: BTreeMap<usize, Declaration>,
    fields: BTreeMap<usize, StructField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Import,
    Type,
    Other,
}

impl DeclarationIndex {
    /// Build the index from raw lines and their sanitized code counterparts.
    fn build(lines: &[String], code: &[String]) -> Self {
        let mut index = Self::default();
        let mut depth: i32 = 0;
        let mut group: Option<Group> = None;
        // (struct name, brace depth of its body)
        let mut open_struct: Option<(String, i32)> = None;

        for (i, code_line) in code.iter().enumerate() {
            let line_no = i + 1;
            let trimmed = code_line.trim();

            if let Some((owner, body_depth)) = &open_struct
                && depth == *body_depth
                && !trimmed.is_empty()
                && !trimmed.starts_with('}')
                && let Some(field) = parse_field(trimmed, owner, line_no)
            {
                index.fields.insert(line_no, field);
            }

            let mut opened_struct: Option<String> = None;
            if depth == 0 && !trimmed.is_empty() {
                match group {
                    Some(Group::Import) => {
                        if trimmed.starts_with(')') {
                            group = None;
                        } else {
                            index.push_import(lines[i].trim(), line_no);
                        }
                    }
                    Some(Group::Type) => {
                        if trimmed.starts_with(')') {
                            group = None;
                        } else {
                            opened_struct = index.push_type_spec(trimmed, line_no);
                        }
                    }
                    Some(Group::Other) => {
                        if trimmed.starts_with(')') {
                            group = None;
                        }
                    }
                    None => {
                        group = index.parse_top_level(trimmed, lines, code, i, &mut opened_struct);
                    }
                }
            }

            let before = depth;
            depth += brace_delta(code_line);

            if let Some(name) = opened_struct
                && depth > before
            {
                open_struct = Some((name, depth));
            }
            if let Some((_, body_depth)) = &open_struct
                && depth < *body_depth
            {
                open_struct = None;
            }
        }

        index
    }

    /// Handle a line at brace depth zero outside any group. Returns the group
    /// opened by the line, if any.
    fn parse_top_level(
        &mut self,
        trimmed: &str,
        lines: &[String],
        code: &[String],
        i: usize,
        opened_struct: &mut Option<String>,
    ) -> Option<Group> {
        let line_no = i + 1;
        let (keyword, rest) = split_keyword(trimmed);
        match keyword {
            "package" => {
                self.package = rest.split_whitespace().next().map(str::to_string);
                None
            }
            "import" => {
                if rest.starts_with('(') {
                    Some(Group::Import)
                } else {
                    self.push_import(
                        lines[i].trim().trim_start_matches("import").trim(),
                        line_no,
                    );
                    None
                }
            }
            "type" => {
                if rest.starts_with('(') {
                    Some(Group::Type)
                } else {
                    *opened_struct = self.push_type_spec(rest, line_no);
                    None
                }
            }
            "var" | "const" if rest.starts_with('(') => Some(Group::Other),
            "func" => {
                let signature = signature_text(code, i);
                if let Some(decl) = parse_func(&signature, line_no) {
                    self.declarations.insert(line_no, decl);
                }
                None
            }
            _ => None,
        }
    }

    fn push_import(&mut self, spec: &str, line: usize) {
        let Some(caps) = IMPORT_SPEC_REGEX.captures(spec) else {
            return;
        };
        let path = caps[2].to_string();
        let (alias, explicit) = match caps.get(1).map(|m| m.as_str()) {
            // Blank and dot imports never qualify a type name.
            Some("_") | Some(".") => return,
            Some(alias) => (alias.to_string(), true),
            None => (default_alias(&path), false),
        };
        self.imports.push(FileImport {
            alias,
            path,
            explicit,
            line,
        });
    }

    /// Index one type spec (`X struct {`, `X = Y`, ...). Returns the struct
    /// name when the spec opens a struct body.
    fn push_type_spec(&mut self, spec: &str, line: usize) -> Option<String> {
        let caps = TYPE_SPEC_REGEX.captures(spec)?;
        let name = caps[1].to_string();
        let is_alias = caps.get(3).is_some();
        let body = caps.get(4).map_or("", |m| m.as_str()).trim();

        let kind = if is_alias {
            DeclKind::Alias
        } else if starts_with_keyword(body, "struct") {
            DeclKind::Struct
        } else if starts_with_keyword(body, "interface") {
            DeclKind::Interface
        } else {
            DeclKind::Alias
        };

        self.declarations.insert(
            line,
            Declaration {
                name: name.clone(),
                kind,
                line,
                receiver: None,
                params: Vec::new(),
                results: Vec::new(),
            },
        );

        (kind == DeclKind::Struct).then_some(name)
    }

    /// Declaration starting on `line`, if any.
    pub fn declaration_at(&self, line: usize) -> Option<&Declaration> {
        self.declarations.get(&line)
    }

    /// Struct field declared on `line`, if any.
    pub fn field_at(&self, line: usize) -> Option<&StructField> {
        self.fields.get(&line)
    }

    /// Classify what `line` declares.
    pub fn target_at(&self, line: usize) -> LineTarget<'_> {
        if let Some(decl) = self.declaration_at(line) {
            LineTarget::Declaration(decl)
        } else if let Some(field) = self.field_at(line) {
            LineTarget::Field(field)
        } else {
            LineTarget::Other
        }
    }

    /// All declarations in line order.
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    /// Methods declared on the given receiver type.
    pub fn methods_of<'a>(&'a self, receiver: &'a str) -> impl Iterator<Item = &'a Declaration> {
        self.declarations.values().filter(move |decl| {
            decl.kind == DeclKind::Method && decl.receiver.as_deref() == Some(receiver)
        })
    }

    /// Import the file refers to through `qualifier`.
    pub fn import_for_qualifier(&self, qualifier: &str) -> Option<&FileImport> {
        self.imports.iter().find(|imp| imp.alias == qualifier)
    }
}

// ============================================================
// Source File
// ============================================================

/// A scanned source file: raw lines plus its declaration index.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
    /// Lines with comments removed and literal contents blanked.
    code: Vec<String>,
    pub index: DeclarationIndex,
}

impl SourceFile {
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let code = sanitize_lines(&lines);
        let index = DeclarationIndex::build(&lines, &code);
        Self {
            path: path.into(),
            lines,
            code,
            index,
        }
    }

    /// Raw text of a 1-based line.
    pub fn line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    /// First line after `line` that contains code. Comment-only and blank
    /// lines are skipped.
    pub fn next_code_line(&self, line: usize) -> Option<usize> {
        (line..self.code.len())
            .find(|&i| !self.code[i].trim().is_empty())
            .map(|i| i + 1)
    }

    pub fn display_path(&self) -> String {
        display_path(&self.path)
    }
}

/// Forward-slash path without a leading `./`.
pub fn display_path(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    match text.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

// ============================================================
// Lexing helpers
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    BlockComment,
    RawString,
}

/// Remove comments and blank out literal contents so that brace and paren
/// counting only sees code. Delimiters are kept, so a line holding only a
/// string literal still counts as code.
fn sanitize_lines(lines: &[String]) -> Vec<String> {
    let mut state = LexState::Code;
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        let mut code = String::with_capacity(line.len());
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            match state {
                LexState::BlockComment => {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        state = LexState::Code;
                        code.push(' ');
                    }
                }
                LexState::RawString => {
                    if c == '`' {
                        code.push('`');
                        state = LexState::Code;
                    }
                }
                LexState::Code => match c {
                    '/' if chars.peek() == Some(&'/') => break,
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        state = LexState::BlockComment;
                    }
                    '`' => {
                        code.push('`');
                        state = LexState::RawString;
                    }
                    '"' | '\'' => {
                        code.push(c);
                        let mut escaped = false;
                        for inner in chars.by_ref() {
                            if escaped {
                                escaped = false;
                            } else if inner == '\\' {
                                escaped = true;
                            } else if inner == c {
                                break;
                            }
                        }
                        code.push(c);
                    }
                    _ => code.push(c),
                },
            }
        }

        out.push(code);
    }

    out
}

fn brace_delta(code: &str) -> i32 {
    code.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

fn split_keyword(line: &str) -> (&str, &str) {
    let end = line
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    (&line[..end], line[end..].trim_start())
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.strip_prefix(keyword).is_some_and(|rest| {
        rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '{')
    })
}

/// Join the lines of a (possibly multi-line) func signature.
fn signature_text(code: &[String], start: usize) -> String {
    let mut text = String::new();
    let mut parens: i32 = 0;
    for line in code.iter().skip(start).take(MAX_SIGNATURE_LINES) {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(line.trim());
        parens += line.chars().fold(0, |acc, c| match c {
            '(' => acc + 1,
            ')' => acc - 1,
            _ => acc,
        });
        if parens <= 0 {
            break;
        }
    }
    text
}

/// Split `text` (which must start with `open`) into the balanced inner part
/// and whatever follows the matching `close`.
fn take_balanced(text: &str, open: char, close: char) -> Option<(&str, &str)> {
    if !text.starts_with(open) {
        return None;
    }
    let mut depth = 0;
    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((&text[open.len_utf8()..i], &text[i + close.len_utf8()..]));
            }
        }
    }
    None
}

/// Split on `sep` at bracket depth zero.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn parse_field(code: &str, owner: &str, line: usize) -> Option<StructField> {
    // Struct tags are raw strings; the sanitizer left only their delimiters.
    let without_tag = code.split('`').next().unwrap_or(code).trim();
    let caps = FIELD_REGEX.captures(without_tag)?;
    let names = caps[1].split(',').map(|n| n.trim().to_string()).collect();
    Some(StructField {
        names,
        ty: caps[2].trim().to_string(),
        line,
        owner: owner.to_string(),
    })
}

fn parse_func(signature: &str, line: usize) -> Option<Declaration> {
    let rest = signature.strip_prefix("func")?.trim_start();

    let (receiver, rest) = if rest.starts_with('(') {
        let (inner, after) = take_balanced(rest, '(', ')')?;
        (Some(receiver_type(inner)?), after.trim_start())
    } else {
        (None, rest)
    };

    let name_end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let name = &rest[..name_end];
    if name.is_empty() {
        return None;
    }

    let mut after = rest[name_end..].trim_start();
    if after.starts_with('[') {
        after = take_balanced(after, '[', ']')?.1.trim_start();
    }
    let (params_text, after) = take_balanced(after, '(', ')')?;
    let results_text = after.split('{').next().unwrap_or("").trim();

    let results = if results_text.starts_with('(') {
        let (inner, _) = take_balanced(results_text, '(', ')')?;
        parse_params(inner).into_iter().map(|p| p.ty).collect()
    } else if results_text.is_empty() {
        Vec::new()
    } else {
        vec![results_text.to_string()]
    };

    Some(Declaration {
        name: name.to_string(),
        kind: if receiver.is_some() {
            DeclKind::Method
        } else {
            DeclKind::Function
        },
        line,
        receiver,
        params: parse_params(params_text),
        results,
    })
}

fn receiver_type(inner: &str) -> Option<String> {
    let ty = inner.split_whitespace().last()?;
    let ty = ty.trim_start_matches('*');
    let base = ty.split('[').next().unwrap_or(ty);
    (!base.is_empty()).then(|| base.to_string())
}

/// Parse a parameter list. Go either names every parameter or none, and
/// `a, b int` shares one type across several names.
fn parse_params(text: &str) -> Vec<Param> {
    let pieces = split_top_level(text, ',');
    let named = pieces.iter().any(|piece| {
        NAMED_PARAM_REGEX
            .captures(piece)
            .is_some_and(|caps| !TYPE_KEYWORDS.contains(&&caps[1]))
    });

    if !named {
        return pieces
            .into_iter()
            .map(|ty| Param {
                name: String::new(),
                ty: ty.to_string(),
            })
            .collect();
    }

    let mut params: Vec<Param> = Vec::with_capacity(pieces.len());
    let mut pending: Vec<String> = Vec::new();
    for piece in pieces {
        match NAMED_PARAM_REGEX.captures(piece) {
            Some(caps) => {
                let ty = caps[2].trim().to_string();
                for name in pending.drain(..) {
                    params.push(Param {
                        name,
                        ty: ty.clone(),
                    });
                }
                params.push(Param {
                    name: caps[1].to_string(),
                    ty,
                });
            }
            None => pending.push(piece.to_string()),
        }
    }
    params
}
