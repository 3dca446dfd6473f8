//! `${VAR}` expansion inside the string values of a parsed config.
//!
//! Expansion runs on the parsed tree, so a variable can only replace text
//! inside a string. Keys, numbers and booleans are never touched and a value
//! containing quotes or newlines cannot change the document's structure.
//! `${VAR:-fallback}` uses `fallback` when `VAR` is unset; any other unknown
//! placeholder is kept literally.

use serde_json::Value;

/// Expand placeholders against the process environment.
pub fn substitute_env(value: &mut Value) {
    substitute_env_with(value, &|name| std::env::var(name).ok());
}

pub(crate) fn substitute_env_with(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand(s, lookup) {
                *s = expanded;
            }
        },
        Value::Array(items) => {
            for item in items {
                substitute_env_with(item, lookup);
            }
        },
        Value::Object(map) => {
            for item in map.values_mut() {
                substitute_env_with(item, lookup);
            }
        },
        Value::Null | Value::Bool(_) | Value::Number(_) => {},
    }
}

/// `None` when `input` has no placeholder.
fn expand(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    if !input.contains("${") {
        return None;
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        match body.find('}') {
            Some(end) if end > 0 => {
                let expr = &body[..end];
                let (name, fallback) = match expr.split_once(":-") {
                    Some((name, fallback)) => (name, Some(fallback)),
                    None => (expr, None),
                };
                match lookup(name).or_else(|| fallback.map(str::to_owned)) {
                    Some(val) => out.push_str(&val),
                    None => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &body[end + 1..];
            },
            // Empty or unclosed: literal.
            _ => {
                out.push_str("${");
                rest = body;
            },
        }
    }
    out.push_str(rest);
    Some(out)
}
