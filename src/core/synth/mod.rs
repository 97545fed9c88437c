//! Type-to-code synthesis.
//!
//! Turns each field binding of a service into Go statements that initialize
//! the field inside the service's provider function. The shape of the code
//! depends only on the field's declared type:
//!
//! | declared type                      | generated initialization              |
//! |------------------------------------|---------------------------------------|
//! | `string`, ints, uints, floats, bool | `strconv` parse, typed conversion     |
//! | `time.Duration`                    | `time.ParseDuration`                  |
//! | `[]scalar`                         | split by separator, parse each item   |
//! | `[]byte`                           | raw bytes                             |
//! | type with `UnmarshalText`          | calls the hook                        |
//! | anything else                      | `cfg.Unmarshal(key, &field)`          |
//!
//! Planning ([`Synthesizer::plan`]) validates defaults and decides which
//! imports the code needs; rendering happens after imports are resolved so
//! every package is spelled with its final alias.

pub mod duration;
pub mod handler;

use std::fmt::Write as _;

use crate::core::aggregate::{
    ConfigBinding, FieldBinding, FieldSource, ServiceGeneration, TypeCapabilities,
};
use crate::core::collect::ArgValue;
use crate::core::collect::directive::go_quote;
use crate::core::error::GenError;
use crate::core::imports::{ImportEntry, ResolvedImports, TypeExpr};

pub use duration::DurationLiteral;

// ============================================================
// Type shapes
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    /// Bit size, 0 for `int`.
    Int(u8),
    Uint(u8),
    Float(u8),
    Bool,
    Duration,
}

impl ScalarKind {
    fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => ScalarKind::String,
            "int" => ScalarKind::Int(0),
            "int8" => ScalarKind::Int(8),
            "int16" => ScalarKind::Int(16),
            "int32" | "rune" => ScalarKind::Int(32),
            "int64" => ScalarKind::Int(64),
            "uint" => ScalarKind::Uint(0),
            "uint8" | "byte" => ScalarKind::Uint(8),
            "uint16" => ScalarKind::Uint(16),
            "uint32" => ScalarKind::Uint(32),
            "uint64" => ScalarKind::Uint(64),
            "float32" => ScalarKind::Float(32),
            "float64" => ScalarKind::Float(64),
            "bool" => ScalarKind::Bool,
            _ => return None,
        })
    }

    fn describe(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Int(_) => "integer",
            ScalarKind::Uint(_) => "unsigned integer",
            ScalarKind::Float(_) => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Duration => "duration",
        }
    }
}

/// How a declared type is initialized from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Scalar(ScalarKind),
    /// `[]scalar`; holds the element type as written.
    List(ScalarKind, TypeExpr),
    Bytes,
    /// Open-ended shape decoded by the runtime or by the type's own hook.
    Structured {
        has_text_hook: bool,
        pointer: bool,
        /// Type name without the pointer star.
        base: String,
    },
}

impl TypeShape {
    pub fn classify(ty: &TypeExpr, capabilities: &TypeCapabilities) -> Self {
        let text = ty.text.trim();
        if let Some(kind) = scalar_kind(ty) {
            return TypeShape::Scalar(kind);
        }
        if text == "[]byte" || text == "[]uint8" {
            return TypeShape::Bytes;
        }
        if let Some(elem_text) = text.strip_prefix("[]") {
            let elem = TypeExpr {
                text: elem_text.to_string(),
                qualifiers: ty.qualifiers.clone(),
            };
            if let Some(kind) = scalar_kind(&elem) {
                return TypeShape::List(kind, elem);
            }
        }

        let pointer = text.starts_with('*');
        let base = text.trim_start_matches('*').to_string();
        let local = base.chars().all(|c| c.is_alphanumeric() || c == '_');
        TypeShape::Structured {
            has_text_hook: local && capabilities.has_text_hook(&base),
            pointer,
            base,
        }
    }
}

fn scalar_kind(ty: &TypeExpr) -> Option<ScalarKind> {
    if ty.is_qualified("time", "Duration") {
        return Some(ScalarKind::Duration);
    }
    ScalarKind::from_type_name(ty.text.trim())
}

// ============================================================
// Plans
// ============================================================

/// A validated default value, rendered once import aliases are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// Go expression that names no imported package.
    Expr(String),
    Duration(DurationLiteral),
    List { elem: TypeExpr, items: Vec<DefaultValue> },
}

impl DefaultValue {
    pub fn render(&self, imports: &ResolvedImports) -> String {
        match self {
            DefaultValue::Expr(expr) => expr.clone(),
            DefaultValue::Duration(literal) => literal.to_go_expr(time_alias(imports)),
            DefaultValue::List { elem, items } => format!(
                "[]{}{{{}}}",
                imports.render_type(elem),
                items
                    .iter()
                    .map(|item| item.render(imports))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInit {
    Inject {
        dependency: String,
    },
    Config {
        key: String,
        shape: TypeShape,
        default: Option<DefaultValue>,
        required: bool,
        separator: String,
    },
}

#[derive(Debug, Clone)]
pub struct FieldPlan<'a> {
    pub binding: &'a FieldBinding,
    pub init: FieldInit,
}

/// A service whose field initializers are known to be synthesizable.
#[derive(Debug, Clone)]
pub struct ServicePlan<'a> {
    pub service: &'a ServiceGeneration,
    pub fields: Vec<FieldPlan<'a>>,
}

impl ServicePlan<'_> {
    pub fn has_config(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.init, FieldInit::Config { .. }))
    }

    /// Standard-library imports the synthesized code refers to.
    pub fn imports(&self) -> Vec<ImportEntry> {
        let mut paths: Vec<&str> = Vec::new();
        for field in &self.fields {
            let FieldInit::Config { shape, default, .. } = &field.init else {
                continue;
            };
            let kind = match shape {
                TypeShape::Scalar(kind) => Some(*kind),
                TypeShape::List(kind, _) => {
                    paths.push("strings");
                    Some(*kind)
                }
                _ => None,
            };
            match kind {
                Some(ScalarKind::Duration) => paths.push("time"),
                Some(ScalarKind::String) | None => {}
                Some(_) => paths.push("strconv"),
            }
            if matches!(default, Some(DefaultValue::Duration(_))) {
                paths.push("time");
            }
        }
        paths.sort_unstable();
        paths.dedup();
        paths.into_iter().map(ImportEntry::standard).collect()
    }
}

// ============================================================
// Synthesizer
// ============================================================

pub struct Synthesizer<'a> {
    capabilities: &'a TypeCapabilities,
}

impl<'a> Synthesizer<'a> {
    pub fn new(capabilities: &'a TypeCapabilities) -> Self {
        Self { capabilities }
    }

    /// Plan every field of a service. Fails with `GenError::Conflict` on the
    /// first default that does not fit its field's type.
    pub fn plan<'s>(&self, service: &'s ServiceGeneration) -> Result<ServicePlan<'s>, GenError> {
        let fields = service
            .fields
            .iter()
            .map(|binding| {
                let init = match &binding.source {
                    FieldSource::Inject { dependency } => FieldInit::Inject {
                        dependency: dependency.clone(),
                    },
                    FieldSource::Config(config) => self.plan_config(binding, config)?,
                };
                Ok(FieldPlan { binding, init })
            })
            .collect::<Result<Vec<_>, GenError>>()?;
        Ok(ServicePlan { service, fields })
    }

    fn plan_config(&self, binding: &FieldBinding, config: &ConfigBinding) -> Result<FieldInit, GenError> {
        let shape = TypeShape::classify(&binding.declared_type, self.capabilities);
        let default = match &config.default {
            None => None,
            Some(value) => Some(default_for(&shape, value, config).map_err(|reason| {
                GenError::conflict(format!(
                    "default {} for config `{}` does not fit field `{}` of type `{}`: {}",
                    value, config.key, binding.field_name, binding.declared_type.text, reason
                ))
            })?),
        };
        Ok(FieldInit::Config {
            key: config.key.clone(),
            shape,
            default,
            required: config.required,
            separator: config.separator.clone(),
        })
    }
}

fn default_for(shape: &TypeShape, value: &ArgValue, config: &ConfigBinding) -> Result<DefaultValue, String> {
    match shape {
        TypeShape::Scalar(kind) => scalar_default(*kind, value),
        TypeShape::List(kind, elem) => {
            let items = value
                .text()
                .split(config.separator.as_str())
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| scalar_default(*kind, &value.with_text(item)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DefaultValue::List {
                elem: elem.clone(),
                items,
            })
        }
        TypeShape::Bytes => Ok(DefaultValue::Expr(format!("[]byte({})", value.to_go_string()))),
        TypeShape::Structured {
            has_text_hook: true,
            ..
        } => Ok(DefaultValue::Expr(value.to_go_string())),
        TypeShape::Structured { .. } => Err(
            "defaults are only supported for scalars, lists, []byte and types with UnmarshalText"
                .to_string(),
        ),
    }
}

fn scalar_default(kind: ScalarKind, value: &ArgValue) -> Result<DefaultValue, String> {
    let text = value.text().trim();
    let invalid = || format!("`{}` is not a valid {}", text, kind.describe());
    let ok = match kind {
        ScalarKind::String => return Ok(DefaultValue::Expr(value.to_go_string())),
        ScalarKind::Duration => {
            return DurationLiteral::parse(text)
                .map(DefaultValue::Duration)
                .map_err(|err| err.to_string());
        }
        ScalarKind::Int(bits) => parse_go_int(text).is_some_and(|n| fits_signed(n, bits)),
        ScalarKind::Uint(bits) => parse_go_int(text).is_some_and(|n| fits_unsigned(n, bits)),
        ScalarKind::Float(_) => {
            text.parse::<f64>().is_ok_and(f64::is_finite)
                && text.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c))
        }
        ScalarKind::Bool => matches!(text, "true" | "false"),
    };
    if ok {
        Ok(DefaultValue::Expr(text.trim_start_matches('+').to_string()))
    } else {
        Err(invalid())
    }
}

/// Value of a Go integer literal with an optional sign: decimal, `0x`,
/// `0o`, `0b`, legacy `0`-prefixed octal, `_` digit separators.
fn parse_go_int(text: &str) -> Option<i128> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    // `_` may follow a prefix but never trails, doubles or leads a decimal.
    if digits.ends_with('_') || digits.contains("__") || (radix == 10 && digits.starts_with('_')) {
        return None;
    }
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::try_from(u128::from_str_radix(&cleaned, radix).ok()?).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn fits_signed(n: i128, bits: u8) -> bool {
    match bits {
        8 => i8::try_from(n).is_ok(),
        16 => i16::try_from(n).is_ok(),
        32 => i32::try_from(n).is_ok(),
        _ => i64::try_from(n).is_ok(),
    }
}

fn fits_unsigned(n: i128, bits: u8) -> bool {
    match bits {
        8 => u8::try_from(n).is_ok(),
        16 => u16::try_from(n).is_ok(),
        32 => u32::try_from(n).is_ok(),
        _ => u64::try_from(n).is_ok(),
    }
}

pub(crate) fn time_alias(imports: &ResolvedImports) -> &str {
    imports.alias_for("time").unwrap_or("time")
}

// ============================================================
// Rendering
// ============================================================

/// Names the rendered statements refer to.
pub struct RenderContext<'a> {
    pub imports: &'a ResolvedImports,
    /// Alias of the wiring runtime package.
    pub runtime: &'a str,
}

impl RenderContext<'_> {
    fn alias(&self, path: &'static str) -> &str {
        self.imports.alias_for(path).unwrap_or(path)
    }
}

/// Statements initializing one field, indented with `indent` tabs.
pub fn render_field(plan: &FieldPlan<'_>, ctx: &RenderContext<'_>, indent: usize) -> String {
    let target = format!("svc.{}", plan.binding.field_name);
    let mut w = CodeWriter::new(indent);

    match &plan.init {
        FieldInit::Inject { dependency } => {
            w.line(&format!(
                "if err := c.Inject(&{}, {}); err != nil {{",
                target,
                go_quote(dependency)
            ));
            w.indented(|w| w.line("return nil, err"));
            w.line("}");
        }
        FieldInit::Config {
            key,
            shape,
            default,
            required,
            separator,
        } => {
            let key = go_quote(key);
            let missing = format!("return nil, {}.MissingConfig({})", ctx.runtime, key);

            if let TypeShape::Structured {
                has_text_hook: false,
                ..
            } = shape
            {
                w.line(&format!("if _, ok := cfg.Lookup({}); ok {{", key));
                w.indented(|w| {
                    w.line(&format!(
                        "if err := cfg.Unmarshal({}, &{}); err != nil {{",
                        key, target
                    ));
                    w.indented(|w| w.line(&config_error(ctx, &key)));
                    w.line("}");
                });
                if *required {
                    w.line("} else {");
                    w.indented(|w| w.line(&missing));
                }
                w.line("}");
                return w.finish();
            }

            w.line(&format!("if v, ok := cfg.Lookup({}); ok {{", key));
            w.indented(|w| decode(w, shape, &target, "v", separator, &key, ctx));
            match default {
                Some(value) => {
                    let value = value.render(ctx.imports);
                    w.line("} else {");
                    w.indented(|w| match shape {
                        TypeShape::Structured { .. } => {
                            decode(w, shape, &target, &value, separator, &key, ctx)
                        }
                        _ => w.line(&format!("{} = {}", target, value)),
                    });
                }
                None if *required => {
                    w.line("} else {");
                    w.indented(|w| w.line(&missing));
                }
                None => {}
            }
            w.line("}");
        }
    }

    w.finish()
}

/// Statements that decode the string expression `source` into `target`.
fn decode(
    w: &mut CodeWriter,
    shape: &TypeShape,
    target: &str,
    source: &str,
    separator: &str,
    key: &str,
    ctx: &RenderContext<'_>,
) {
    match shape {
        TypeShape::Scalar(kind) => {
            match parse_call(*kind, source, ctx) {
                None => w.line(&format!("{} = {}", target, source)),
                Some(call) => {
                    w.line(&format!("parsed, err := {}", call));
                    w.line("if err != nil {");
                    w.indented(|w| w.line(&config_error(ctx, key)));
                    w.line("}");
                    w.line(&format!("{} = {}", target, convert(*kind, "parsed")));
                }
            }
        }
        TypeShape::List(kind, elem) => {
            let strings = ctx.alias("strings");
            w.line(&format!(
                "for _, part := range {}.Split({}, {}) {{",
                strings,
                source,
                go_quote(separator)
            ));
            w.indented(|w| {
                w.line(&format!("part = {}.TrimSpace(part)", strings));
                w.line("if part == \"\" {");
                w.indented(|w| w.line("continue"));
                w.line("}");
                match parse_call(*kind, "part", ctx) {
                    None => w.line(&format!("{} = append({}, part)", target, target)),
                    Some(call) => {
                        w.line(&format!("parsed, err := {}", call));
                        w.line("if err != nil {");
                        w.indented(|w| w.line(&config_error(ctx, key)));
                        w.line("}");
                        let elem = ctx.imports.render_type(elem);
                        let value = match kind {
                            ScalarKind::Duration => "parsed".to_string(),
                            _ => format!("{}(parsed)", elem),
                        };
                        w.line(&format!("{} = append({}, {})", target, target, value));
                    }
                }
            });
            w.line("}");
        }
        TypeShape::Bytes => w.line(&format!("{} = []byte({})", target, source)),
        TypeShape::Structured { pointer, base, .. } => {
            if *pointer {
                w.line(&format!("{} = new({})", target, base));
            }
            w.line(&format!(
                "if err := {}.UnmarshalText([]byte({})); err != nil {{",
                target, source
            ));
            w.indented(|w| w.line(&config_error(ctx, key)));
            w.line("}");
        }
    }
}

fn parse_call(kind: ScalarKind, source: &str, ctx: &RenderContext<'_>) -> Option<String> {
    let strconv = ctx.alias("strconv");
    Some(match kind {
        ScalarKind::String => return None,
        ScalarKind::Int(bits) => format!("{}.ParseInt({}, 10, {})", strconv, source, bits),
        ScalarKind::Uint(bits) => format!("{}.ParseUint({}, 10, {})", strconv, source, bits),
        ScalarKind::Float(bits) => format!("{}.ParseFloat({}, {})", strconv, source, bits),
        ScalarKind::Bool => format!("{}.ParseBool({})", strconv, source),
        ScalarKind::Duration => format!("{}.ParseDuration({})", ctx.alias("time"), source),
    })
}

/// Conversion from the parse result to the field's scalar type.
fn convert(kind: ScalarKind, value: &str) -> String {
    match kind {
        ScalarKind::Int(0) => format!("int({})", value),
        ScalarKind::Int(bits) => format!("int{}({})", bits, value),
        ScalarKind::Uint(0) => format!("uint({})", value),
        ScalarKind::Uint(bits) => format!("uint{}({})", bits, value),
        ScalarKind::Float(bits) => format!("float{}({})", bits, value),
        _ => value.to_string(),
    }
}

fn config_error(ctx: &RenderContext<'_>, key: &str) -> String {
    format!("return nil, {}.ConfigError({}, err)", ctx.runtime, key)
}

// ============================================================
// Code writer
// ============================================================

/// Tab-indented line writer for generated Go.
pub(crate) struct CodeWriter {
    out: String,
    indent: usize,
}

impl CodeWriter {
    pub(crate) fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    pub(crate) fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        let _ = writeln!(self.out, "{}", text);
    }

    /// Append output that is already indented.
    pub(crate) fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub(crate) fn indented(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}
