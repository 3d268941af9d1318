//! Minimal expression language
//!
//! Template substitution, response assertions, and value extraction.
//! Templates reference variables as `{{ name }}`; assertions compare a
//! response accessor (`status`, `body`, `header("…")`), a literal, or a
//! variable against another operand.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::http::HttpResponse;

static TEMPLATE_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());
static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^header\(\s*"([^"]+)"\s*\)$"#).unwrap());
static REGEX_FN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^regex\(\s*"(.+)"\s*\)$"#).unwrap());

/// Comparison operators, whitespace-delimited in expressions.
const OPERATORS: [&str; 9] = [
    "==",
    "!=",
    "<=",
    ">=",
    "<",
    ">",
    "contains",
    "not-contains",
    "matches",
];

/// Expression evaluation errors
#[derive(Error, Debug)]
pub enum ExprError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("malformed expression: {0}")]
    Malformed(String),

    #[error("invalid regex in expression: {0}")]
    InvalidRegex(String),

    #[error("regex {0:?} did not match the response body")]
    NoMatch(String),

    #[error("response has no header {0:?}")]
    MissingHeader(String),
}

/// An operand resolved during evaluation.
#[derive(Clone, Debug, PartialEq)]
enum Value {
    Num(f64),
    Str(String),
}

impl Value {
    fn as_string(&self) -> String {
        match self {
            Value::Num(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Value::Str(s) => s.clone(),
        }
    }
}

/// Strip the quotes of a `'…'` or `"…"` literal, unescaping `\'`, `\"`
/// and `\\`. Returns `None` for anything that is not a quoted literal.
fn parse_literal(token: &str) -> Option<String> {
    let bytes = token.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let quote = bytes[0];
    if (quote != b'\'' && quote != b'"') || bytes[bytes.len() - 1] != quote {
        return None;
    }
    let inner = &token[1..token.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                // Only quote and backslash escapes collapse; anything else
                // (regex classes like \w) keeps its backslash.
                Some(next @ ('\'' | '"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// The plain string form of a stored variable value. Quoted literals
/// (caller overrides) resolve to their content, everything else is as-is.
pub fn variable_text(value: &str) -> String {
    parse_literal(value).unwrap_or_else(|| value.to_string())
}

/// Replace every `{{ name }}` placeholder with the variable's text value.
pub fn substitute(template: &str, vars: &IndexMap<String, String>) -> Result<String, ExprError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in TEMPLATE_VAR_RE.captures_iter(template) {
        let whole = caps.get(0).unwrap();
        let name = &caps[1];
        let value = vars
            .get(name)
            .ok_or_else(|| ExprError::UnknownVariable(name.to_string()))?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(&variable_text(value));
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Resolve one operand token against the response and variables.
fn resolve_operand(
    token: &str,
    response: &HttpResponse,
    vars: &IndexMap<String, String>,
) -> Result<Value, ExprError> {
    let token = token.trim();

    if token == "status" {
        return Ok(Value::Num(f64::from(response.status_code)));
    }
    if token == "body" {
        return Ok(Value::Str(response.body.clone()));
    }
    if let Some(caps) = HEADER_RE.captures(token) {
        let name = &caps[1];
        let value = response.get_header(name).cloned().unwrap_or_default();
        return Ok(Value::Str(value));
    }
    if let Some(literal) = parse_literal(token) {
        return Ok(Value::Str(literal));
    }
    if let Ok(n) = token.parse::<f64>() {
        return Ok(Value::Num(n));
    }

    let stored = vars
        .get(token)
        .ok_or_else(|| ExprError::UnknownVariable(token.to_string()))?;
    if let Some(literal) = parse_literal(stored) {
        return Ok(Value::Str(literal));
    }
    if let Ok(n) = stored.parse::<f64>() {
        return Ok(Value::Num(n));
    }
    Ok(Value::Str(stored.clone()))
}

/// Split an expression at its leftmost operator token, ignoring anything
/// inside quoted literals so `body contains 'a == b'` splits on
/// `contains`, not on the `==` inside the literal.
fn split_comparison(expr: &str) -> Option<(&str, &str, &str)> {
    let chars: Vec<(usize, char)> = expr.char_indices().collect();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if escaped {
            escaped = false;
            i += 1;
            continue;
        }

        match quote {
            Some(q) => {
                if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                i += 1;
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                i += 1;
            }
            None if c.is_whitespace() => {
                // The whitespace-delimited token that follows may be an
                // operator.
                let mut j = i;
                while j < chars.len() && chars[j].1.is_whitespace() {
                    j += 1;
                }
                let token_start = chars.get(j).map_or(expr.len(), |&(p, _)| p);
                let mut k = j;
                while k < chars.len() && !chars[k].1.is_whitespace() {
                    k += 1;
                }
                let token_end = chars.get(k).map_or(expr.len(), |&(p, _)| p);

                let token = &expr[token_start..token_end];
                if OPERATORS.contains(&token) {
                    let lhs = expr[..pos].trim();
                    let rhs = expr[token_end..].trim();
                    if !lhs.is_empty() && !rhs.is_empty() {
                        return Some((lhs, token, rhs));
                    }
                }
                i = j;
            }
            None => {
                i += 1;
            }
        }
    }

    None
}

/// Evaluate a comparison expression against a response.
pub fn evaluate(
    expr: &str,
    response: &HttpResponse,
    vars: &IndexMap<String, String>,
) -> Result<bool, ExprError> {
    let (lhs, op, rhs) =
        split_comparison(expr.trim()).ok_or_else(|| ExprError::Malformed(expr.to_string()))?;

    let lhs = resolve_operand(lhs, response, vars)?;
    let rhs = resolve_operand(rhs, response, vars)?;

    match op {
        "==" | "!=" | "<" | "<=" | ">" | ">=" => {
            let ordering = match (&lhs, &rhs) {
                (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
                _ => Some(lhs.as_string().cmp(&rhs.as_string())),
            };
            let ordering = ordering.ok_or_else(|| ExprError::Malformed(expr.to_string()))?;
            Ok(match op {
                "==" => ordering.is_eq(),
                "!=" => ordering.is_ne(),
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        "contains" => Ok(lhs.as_string().contains(&rhs.as_string())),
        "not-contains" => Ok(!lhs.as_string().contains(&rhs.as_string())),
        "matches" => {
            let pattern = rhs.as_string();
            let re = Regex::new(&pattern).map_err(|_| ExprError::InvalidRegex(pattern))?;
            Ok(re.is_match(&lhs.as_string()))
        }
        _ => Err(ExprError::Malformed(expr.to_string())),
    }
}

/// Evaluate an extraction expression: `status`, `body`, `header("…")`,
/// `regex("…")` (first capture group against the body), a quoted literal,
/// or a variable reference.
pub fn extract(
    expr: &str,
    response: &HttpResponse,
    vars: &IndexMap<String, String>,
) -> Result<String, ExprError> {
    let expr = expr.trim();

    if expr == "status" {
        return Ok(response.status_code.to_string());
    }
    if expr == "body" {
        return Ok(response.body.clone());
    }
    if let Some(caps) = HEADER_RE.captures(expr) {
        let name = &caps[1];
        return response
            .get_header(name)
            .cloned()
            .ok_or_else(|| ExprError::MissingHeader(name.to_string()));
    }
    if let Some(caps) = REGEX_FN_RE.captures(expr) {
        let pattern = caps[1].replace("\\\"", "\"");
        let re = Regex::new(&pattern).map_err(|_| ExprError::InvalidRegex(pattern.clone()))?;
        let found = re
            .captures(&response.body)
            .ok_or_else(|| ExprError::NoMatch(pattern.clone()))?;
        let captured = found.get(1).or_else(|| found.get(0)).map(|m| m.as_str());
        return captured
            .map(|s| s.to_string())
            .ok_or(ExprError::NoMatch(pattern));
    }

    Ok(resolve_operand(expr, response, vars)?.as_string())
}
