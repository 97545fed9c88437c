//! Directive parsing.
//!
//! Grammar (after the scanner has stripped `//` and the `@` sigil):
//!
//! ```text
//! Directive    := Name ( "(" Args? ")" )?
//! Args         := Value ("," Value)* | Key "=" Value ("," Key "=" Value)*
//! Value        := PlainQuoted | RawQuoted | Bare
//! ```
//!
//! Plain-quoted values (`"..."`) keep their backslash escapes exactly as
//! written; raw-quoted values (`` `...` ``) keep embedded quotes verbatim.
//! Both are emitted back in their original quoting by the synthesizer.
//!
//! Positional and named forms of the same directive resolve into one
//! [`Directive`] right here, so later stages never look at argument style.

use std::fmt;
use std::path::PathBuf;

use crate::core::collect::scanner::directive_name;
use crate::core::error::GenError;

/// HTTP methods accepted by `@Route`.
pub const HTTP_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "ANY",
];

/// Separator used for list-valued config fields when none is given.
pub const DEFAULT_LIST_SEPARATOR: &str = ",";

// ============================================================
// Argument values
// ============================================================

/// A single directive argument value, remembering how it was quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// `"..."`; content kept with its escapes as written.
    Plain(String),
    /// `` `...` ``; content kept verbatim.
    Raw(String),
    /// Unquoted literal (`8080`, `true`, `auth`).
    Bare(String),
}

impl ArgValue {
    /// Content without quotes.
    pub fn text(&self) -> &str {
        match self {
            ArgValue::Plain(s) | ArgValue::Raw(s) | ArgValue::Bare(s) => s,
        }
    }

    /// Go string literal with the original quoting. Bare values are
    /// plain-quoted.
    pub fn to_go_string(&self) -> String {
        match self {
            ArgValue::Plain(s) => format!("\"{}\"", s),
            ArgValue::Raw(s) => format!("`{}`", s),
            ArgValue::Bare(s) => go_quote(s),
        }
    }

    /// Same quoting as `self`, different content.
    pub fn with_text(&self, text: &str) -> ArgValue {
        match self {
            ArgValue::Plain(_) => ArgValue::Plain(text.to_string()),
            ArgValue::Raw(_) => ArgValue::Raw(text.to_string()),
            ArgValue::Bare(_) => ArgValue::Bare(text.to_string()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Plain(s) => write!(f, "\"{}\"", s),
            ArgValue::Raw(s) => write!(f, "`{}`", s),
            ArgValue::Bare(s) => write!(f, "{}", s),
        }
    }
}

/// Quote arbitrary text as a Go interpreted string literal.
pub fn go_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Arguments as written: the canonical union of both directive forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgForm {
    Empty,
    Positional(Vec<ArgValue>),
    Named(Vec<(String, ArgValue)>),
}

impl ArgForm {
    fn named(&self, key: &str) -> Option<&ArgValue> {
        match self {
            ArgForm::Named(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn check_keys(&self, directive: &str, allowed: &[&str]) -> Result<(), GenError> {
        if let ArgForm::Named(pairs) = self {
            for (key, _) in pairs {
                if !allowed.contains(&key.as_str()) {
                    return Err(GenError::syntax(format!(
                        "unknown argument `{}` for @{} (expected one of: {})",
                        key,
                        directive,
                        allowed.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================
// Resolved directives
// ============================================================

/// `@Config` after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSpec {
    pub key: String,
    pub default: Option<ArgValue>,
    /// Explicit `required=` value, if given.
    pub required: Option<bool>,
    pub separator: String,
}

/// `@Route` after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: String,
    pub path: String,
    pub middleware: Vec<String>,
}

/// A directive with its arguments resolved into one canonical shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Service { name: Option<String> },
    Router { name: Option<String>, prefix: String },
    Inject { dependency: Option<String> },
    Config(ConfigSpec),
    Route(RouteSpec),
}

impl Directive {
    pub fn name(&self) -> &'static str {
        match self {
            Directive::Service { .. } => "Service",
            Directive::Router { .. } => "Router",
            Directive::Inject { .. } => "Inject",
            Directive::Config(_) => "Config",
            Directive::Route(_) => "Route",
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Directive::Service { .. } | Directive::Router { .. })
    }

    pub fn is_field_directive(&self) -> bool {
        matches!(self, Directive::Inject { .. } | Directive::Config(_))
    }
}

/// A parsed directive bound to its place in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub directive: Directive,
    /// Arguments as written.
    pub args: ArgForm,
    /// 1-based line of the directive comment.
    pub line: usize,
    /// First code line after the directive.
    pub target_line: Option<usize>,
    /// Identifier declared on the target line, if any.
    pub target_name: Option<String>,
    pub file: PathBuf,
}

impl Annotation {
    pub fn name(&self) -> &'static str {
        self.directive.name()
    }
}

// ============================================================
// Parsing
// ============================================================

/// Parse a directive body (text after the sigil).
///
/// Returns `Ok(None)` for directive names the generator does not own
/// (`@see`, `@deprecated`, ...).
pub fn parse_directive(body: &str) -> Result<Option<(Directive, ArgForm)>, GenError> {
    let name = directive_name(body);
    if !matches!(name, "Service" | "Router" | "Inject" | "Config" | "Route") {
        return Ok(None);
    }

    let args = parse_args(&body[name.len()..])?;
    let directive = match name {
        "Service" => resolve_service(&args)?,
        "Router" => resolve_router(&args)?,
        "Inject" => resolve_inject(&args)?,
        "Config" => resolve_config(&args)?,
        _ => resolve_route(&args)?,
    };
    Ok(Some((directive, args)))
}

/// Parse the optional parenthesized argument list following a name.
/// Anything after the name that is not `(` is prose and ignored.
fn parse_args(rest: &str) -> Result<ArgForm, GenError> {
    let Some(after_paren) = rest.strip_prefix('(') else {
        return Ok(ArgForm::Empty);
    };
    let inner = closing_paren(after_paren)?;
    let raw = tokenize(inner)?;

    if raw.is_empty() {
        return Ok(ArgForm::Empty);
    }

    let named_count = raw.iter().filter(|(key, _)| key.is_some()).count();
    if named_count == 0 {
        Ok(ArgForm::Positional(raw.into_iter().map(|(_, v)| v).collect()))
    } else if named_count == raw.len() {
        let mut pairs: Vec<(String, ArgValue)> = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let key = key.unwrap_or_default();
            if pairs.iter().any(|(k, _)| *k == key) {
                return Err(GenError::syntax(format!("duplicate argument `{}`", key)));
            }
            pairs.push((key, value));
        }
        Ok(ArgForm::Named(pairs))
    } else {
        Err(GenError::syntax(
            "cannot mix positional and key=value arguments",
        ))
    }
}

/// Return the text up to the `)` closing the argument list.
fn closing_paren(text: &str) -> Result<&str, GenError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' if depth == 0 => return Ok(&text[..i]),
            ')' => depth -= 1,
            _ => {}
        }
    }

    if quote.is_some() {
        Err(GenError::syntax("unterminated string literal"))
    } else {
        Err(GenError::syntax("missing closing parenthesis"))
    }
}

/// Split an argument list into `(key, value)` items.
fn tokenize(inner: &str) -> Result<Vec<(Option<String>, ArgValue)>, GenError> {
    let chars: Vec<char> = inner.chars().collect();
    let mut items = Vec::new();
    let mut pos = 0;

    loop {
        skip_whitespace(&chars, &mut pos);
        if pos >= chars.len() {
            break;
        }

        let key = read_key(&chars, &mut pos);
        skip_whitespace(&chars, &mut pos);
        let value = read_value(&chars, &mut pos)?;
        items.push((key, value));

        skip_whitespace(&chars, &mut pos);
        match chars.get(pos) {
            None => break,
            Some(',') => pos += 1,
            Some(c) => {
                return Err(GenError::syntax(format!(
                    "unexpected `{}` after argument value",
                    c
                )));
            }
        }
    }

    Ok(items)
}

fn skip_whitespace(chars: &[char], pos: &mut usize) {
    while chars.get(*pos).is_some_and(|c| c.is_whitespace()) {
        *pos += 1;
    }
}

/// Consume `ident =` if present; otherwise leave the cursor untouched.
fn read_key(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    let mut end = start;
    while chars
        .get(end)
        .is_some_and(|c| c.is_alphanumeric() || *c == '_')
    {
        end += 1;
    }
    if end == start || chars[start].is_ascii_digit() {
        return None;
    }
    let mut after = end;
    while chars.get(after).is_some_and(|c| c.is_whitespace()) {
        after += 1;
    }
    if chars.get(after) == Some(&'=') {
        *pos = after + 1;
        Some(chars[start..end].iter().collect())
    } else {
        None
    }
}

fn read_value(chars: &[char], pos: &mut usize) -> Result<ArgValue, GenError> {
    match chars.get(*pos) {
        Some('"') => {
            let start = *pos + 1;
            let mut i = start;
            while i < chars.len() {
                match chars[i] {
                    '\\' => i += 2,
                    '"' => {
                        *pos = i + 1;
                        return Ok(ArgValue::Plain(chars[start..i].iter().collect()));
                    }
                    _ => i += 1,
                }
            }
            Err(GenError::syntax("unterminated string literal"))
        }
        Some('`') => {
            let start = *pos + 1;
            match chars[start..].iter().position(|c| *c == '`') {
                Some(len) => {
                    *pos = start + len + 1;
                    Ok(ArgValue::Raw(chars[start..start + len].iter().collect()))
                }
                None => Err(GenError::syntax("unterminated raw string literal")),
            }
        }
        _ => {
            let start = *pos;
            while chars.get(*pos).is_some_and(|c| *c != ',') {
                *pos += 1;
            }
            let text: String = chars[start..*pos].iter().collect();
            let text = text.trim();
            if text.is_empty() {
                return Err(GenError::syntax("missing argument value"));
            }
            if text.contains(['"', '`']) {
                return Err(GenError::syntax(format!(
                    "unbalanced quoting in `{}`",
                    text
                )));
            }
            Ok(ArgValue::Bare(text.to_string()))
        }
    }
}

// ============================================================
// Resolution
// ============================================================

fn resolve_service(args: &ArgForm) -> Result<Directive, GenError> {
    args.check_keys("Service", &["name"])?;
    let name = match args {
        ArgForm::Empty => None,
        ArgForm::Positional(values) => Some(single(values, "Service", "a service name")?),
        ArgForm::Named(_) => args.named("name").map(|v| v.text().to_string()),
    };
    Ok(Directive::Service {
        name: validate_name(name)?,
    })
}

fn resolve_router(args: &ArgForm) -> Result<Directive, GenError> {
    args.check_keys("Router", &["name", "prefix"])?;
    let (name, prefix) = match args {
        ArgForm::Empty => (None, String::new()),
        ArgForm::Positional(values) => {
            (Some(single(values, "Router", "a service name")?), String::new())
        }
        ArgForm::Named(_) => (
            args.named("name").map(|v| v.text().to_string()),
            args.named("prefix")
                .map(|v| v.text().trim_end_matches('/').to_string())
                .unwrap_or_default(),
        ),
    };
    if !prefix.is_empty() && !prefix.starts_with('/') {
        return Err(GenError::syntax(format!(
            "router prefix `{}` must start with `/`",
            prefix
        )));
    }
    Ok(Directive::Router {
        name: validate_name(name)?,
        prefix,
    })
}

fn resolve_inject(args: &ArgForm) -> Result<Directive, GenError> {
    args.check_keys("Inject", &["name"])?;
    let dependency = match args {
        ArgForm::Empty => None,
        ArgForm::Positional(values) => Some(single(values, "Inject", "a dependency name")?),
        ArgForm::Named(_) => args.named("name").map(|v| v.text().to_string()),
    };
    Ok(Directive::Inject { dependency })
}

fn resolve_config(args: &ArgForm) -> Result<Directive, GenError> {
    args.check_keys("Config", &["key", "default", "required", "sep"])?;
    let spec = match args {
        ArgForm::Empty => return Err(GenError::syntax("@Config requires a configuration key")),
        // Compatibility alias: `@Config("key")` is a required key without default.
        ArgForm::Positional(values) => ConfigSpec {
            key: single(values, "Config", "a configuration key")?,
            default: None,
            required: None,
            separator: DEFAULT_LIST_SEPARATOR.to_string(),
        },
        ArgForm::Named(_) => {
            let key = args
                .named("key")
                .map(|v| v.text().to_string())
                .ok_or_else(|| GenError::syntax("@Config requires `key=`"))?;
            let required = match args.named("required") {
                None => None,
                Some(v) => Some(match v.text() {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(GenError::syntax(format!(
                            "`required` must be true or false, found `{}`",
                            other
                        )));
                    }
                }),
            };
            let separator = args
                .named("sep")
                .map(|v| v.text().to_string())
                .unwrap_or_else(|| DEFAULT_LIST_SEPARATOR.to_string());
            if separator.is_empty() {
                return Err(GenError::syntax("`sep` must not be empty"));
            }
            ConfigSpec {
                key,
                default: args.named("default").cloned(),
                required,
                separator,
            }
        }
    };
    if spec.key.trim().is_empty() {
        return Err(GenError::syntax("configuration key must not be empty"));
    }
    Ok(Directive::Config(spec))
}

fn resolve_route(args: &ArgForm) -> Result<Directive, GenError> {
    args.check_keys("Route", &["method", "path", "middleware"])?;
    let (method, path, middleware) = match args {
        ArgForm::Empty => {
            return Err(GenError::syntax(
                "@Route requires \"METHOD /path\" as its argument",
            ));
        }
        ArgForm::Positional(values) => {
            let mut parts = values[0].text().split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let path = parts
                .next()
                .ok_or_else(|| GenError::syntax("route must be written as \"METHOD /path\""))?
                .to_string();
            let mut middleware: Vec<String> = parts.flat_map(split_list).collect();
            middleware.extend(values[1..].iter().flat_map(|v| split_list(v.text())));
            (method, path, middleware)
        }
        ArgForm::Named(_) => {
            let method = args
                .named("method")
                .map(|v| v.text().to_string())
                .ok_or_else(|| GenError::syntax("@Route requires `method=`"))?;
            let path = args
                .named("path")
                .map(|v| v.text().to_string())
                .ok_or_else(|| GenError::syntax("@Route requires `path=`"))?;
            let middleware = args
                .named("middleware")
                .map(|v| split_list(v.text()).collect())
                .unwrap_or_default();
            (method, path, middleware)
        }
    };

    let method = method.to_ascii_uppercase();
    if !HTTP_METHODS.contains(&method.as_str()) {
        return Err(GenError::syntax(format!(
            "unsupported HTTP method `{}`",
            method
        )));
    }
    if !path.starts_with('/') {
        return Err(GenError::syntax(format!(
            "route path `{}` must start with `/`",
            path
        )));
    }

    Ok(Directive::Route(RouteSpec {
        method,
        path,
        middleware,
    }))
}

fn single(values: &[ArgValue], directive: &str, what: &str) -> Result<String, GenError> {
    match values {
        [value] => Ok(value.text().to_string()),
        _ => Err(GenError::syntax(format!(
            "@{} takes {} as its only positional argument, found {}",
            directive,
            what,
            values.len()
        ))),
    }
}

fn split_list(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn validate_name(name: Option<String>) -> Result<Option<String>, GenError> {
    match name {
        Some(n) if n.is_empty() => Err(GenError::syntax("service name must not be empty")),
        Some(n) if n.chars().any(|c| c == '"' || c == '\\' || c.is_whitespace()) => Err(
            GenError::syntax(format!("service name `{}` contains invalid characters", n)),
        ),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(body: &str) -> Directive {
        parse_directive(body).unwrap().unwrap().0
    }

    fn parse_err(body: &str) -> String {
        parse_directive(body).unwrap_err().to_string()
    }

    // ============================================================
    // Markers
    // ============================================================

    #[test]
    fn test_service_without_args() {
        assert_eq!(parse("Service"), Directive::Service { name: None });
    }

    #[test]
    fn test_service_trailing_prose_is_ignored() {
        assert_eq!(parse("Service handles users"), Directive::Service { name: None });
    }

    #[test]
    fn test_service_positional_and_named_agree() {
        assert_eq!(parse("Service(\"users\")"), parse("Service(name=\"users\")"));
        assert_eq!(parse("Service(users)"), Directive::Service { name: Some("users".to_string()) });
    }

    #[test]
    fn test_router_prefix() {
        assert_eq!(
            parse("Router(prefix=\"/api/\")"),
            Directive::Router {
                name: None,
                prefix: "/api".to_string()
            }
        );
        assert!(parse_err("Router(prefix=\"api\")").contains("must start with `/`"));
    }

    #[test]
    fn test_unknown_directive_is_not_ours() {
        assert_eq!(parse_directive("see Other").unwrap(), None);
        assert_eq!(parse_directive("Services").unwrap(), None);
    }

    // ============================================================
    // Config
    // ============================================================

    #[test]
    fn test_config_named_form() {
        assert_eq!(
            parse("Config(key=\"http.timeout\", default=\"15m\")"),
            Directive::Config(ConfigSpec {
                key: "http.timeout".to_string(),
                default: Some(ArgValue::Plain("15m".to_string())),
                required: None,
                separator: ",".to_string(),
            })
        );
    }

    #[test]
    fn test_config_positional_alias() {
        assert_eq!(
            parse("Config(\"db.dsn\")"),
            Directive::Config(ConfigSpec {
                key: "db.dsn".to_string(),
                default: None,
                required: None,
                separator: ",".to_string(),
            })
        );
    }

    #[test]
    fn test_config_bare_values() {
        let Directive::Config(spec) = parse("Config(key=port, default=8080, required=false, sep=\";\")")
        else {
            panic!("expected Config");
        };
        assert_eq!(spec.key, "port");
        assert_eq!(spec.default, Some(ArgValue::Bare("8080".to_string())));
        assert_eq!(spec.required, Some(false));
        assert_eq!(spec.separator, ";");
    }

    #[test]
    fn test_raw_quoted_value_keeps_embedded_quotes() {
        let Directive::Config(spec) = parse(r#"Config(key="greeting", default=`say "hi"`)"#) else {
            panic!("expected Config");
        };
        assert_eq!(spec.default, Some(ArgValue::Raw(r#"say "hi""#.to_string())));
    }

    #[test]
    fn test_plain_quoted_value_keeps_escapes() {
        let Directive::Config(spec) = parse(r#"Config(key="greeting", default="say \"hi\"\n")"#)
        else {
            panic!("expected Config");
        };
        assert_eq!(spec.default, Some(ArgValue::Plain(r#"say \"hi\"\n"#.to_string())));
        assert_eq!(spec.default.unwrap().to_go_string(), r#""say \"hi\"\n""#);
    }

    #[test]
    fn test_parens_and_commas_inside_quotes() {
        let Directive::Config(spec) = parse(r#"Config(key="a", default="x(1), y)")"#) else {
            panic!("expected Config");
        };
        assert_eq!(spec.default.unwrap().text(), "x(1), y)");
    }

    #[test]
    fn test_config_errors() {
        assert!(parse_err("Config").contains("requires a configuration key"));
        assert!(parse_err("Config(default=1)").contains("requires `key=`"));
        assert!(parse_err("Config(key=\"a\", bogus=1)").contains("unknown argument `bogus`"));
        assert!(parse_err("Config(key=\"a\", required=maybe)").contains("true or false"));
        assert!(parse_err("Config(\"a\", \"b\")").contains("only positional argument"));
    }

    // ============================================================
    // Route
    // ============================================================

    #[test]
    fn test_route_positional_with_middleware() {
        assert_eq!(
            parse("Route(\"get /users/{id} auth,trace\", \"audit\")"),
            Directive::Route(RouteSpec {
                method: "GET".to_string(),
                path: "/users/{id}".to_string(),
                middleware: vec!["auth".to_string(), "trace".to_string(), "audit".to_string()],
            })
        );
    }

    #[test]
    fn test_route_named_form() {
        assert_eq!(
            parse("Route(method=POST, path=\"/users\", middleware=\"auth\")"),
            parse("Route(\"POST /users\", auth)")
        );
    }

    #[test]
    fn test_route_errors() {
        assert!(parse_err("Route").contains("METHOD /path"));
        assert!(parse_err("Route(\"FETCH /x\")").contains("unsupported HTTP method"));
        assert!(parse_err("Route(\"GET users\")").contains("must start with `/`"));
        assert!(parse_err("Route(\"GET\")").contains("METHOD /path"));
    }

    // ============================================================
    // Tokenizer errors
    // ============================================================

    #[test]
    fn test_unterminated_string() {
        assert_eq!(parse_err("Config(key=\"abc)"), "unterminated string literal");
        assert_eq!(parse_err("Config(key=`abc)"), "unterminated string literal");
    }

    #[test]
    fn test_missing_closing_paren() {
        assert_eq!(parse_err("Config(key=\"abc\""), "missing closing parenthesis");
    }

    #[test]
    fn test_mixed_forms_rejected() {
        assert!(parse_err("Config(\"a\", default=1)").contains("cannot mix"));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        assert!(parse_err("Config(key=\"a\", key=\"b\")").contains("duplicate argument `key`"));
    }

    #[test]
    fn test_bare_value_with_stray_quote() {
        assert!(parse_err("Config(key=a\"b\")").contains("unbalanced quoting"));
    }

    #[test]
    fn test_go_quote() {
        assert_eq!(go_quote("plain"), "\"plain\"");
        assert_eq!(go_quote("a\"b\\c"), r#""a\"b\\c""#);
    }
}
