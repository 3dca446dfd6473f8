//! Configuration validation.
//!
//! Walks a config file against the known schema, flags unknown or
//! misspelled fields, and reports settings that leave the service unusable.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use {secrecy::ExposeSecret, serde_json::Value};

use crate::{
    env_subst::substitute_env,
    loader::{check_page_timeout, parse_config_value},
    schema::ScrapegateConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "security", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "browser.headles"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        (
            "server",
            Struct(HashMap::from([
                ("bind", Leaf),
                ("port", Leaf),
                ("cors_allow_any", Leaf),
            ])),
        ),
        ("auth", Struct(HashMap::from([("api_key", Leaf)]))),
        (
            "browser",
            Struct(HashMap::from([
                ("headless", Leaf),
                ("chrome_path", Leaf),
                ("chrome_args", Leaf),
                ("default_timeout_ms", Leaf),
                ("launch_on_startup", Leaf),
            ])),
        ),
        ("scrape", Struct(HashMap::from([("max_concurrent", Leaf)]))),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, excluding exact matches.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered config file
/// when `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        let mut diagnostics = vec![Diagnostic {
            severity: Severity::Info,
            category: "file-ref",
            path: String::new(),
            message: "no config file found; using defaults".into(),
        }];
        check_semantic_warnings(&ScrapegateConfig::default(), &mut diagnostics);
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) => validate_str(&content, &actual_path),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to read config file: {e}"),
            }],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate config text. The format is chosen from `path`'s extension.
#[must_use]
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let mut value = match parse_config_value(raw, path) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: e.to_string(),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    substitute_env(&mut value);
    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match serde_json::from_value::<ScrapegateConfig>(value) {
        Ok(config) => check_semantic_warnings(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            "at top level "
        } else {
            ""
        };
        let message = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
            None => format!("unknown field {level}"),
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "unknown-field",
            path,
            message: message.trim().to_string(),
        });
    }
}

fn check_semantic_warnings(config: &ScrapegateConfig, diagnostics: &mut Vec<Diagnostic>) {
    let key_missing = config
        .auth
        .api_key
        .as_ref()
        .is_none_or(|k| k.expose_secret().is_empty());
    if key_missing {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "security",
            path: "auth.api_key".into(),
            message: "no API key configured; every /scrape request will be rejected \
                      (set SERVICE_API_KEY or auth.api_key)"
                .into(),
        });
    }

    if let Err(message) = check_page_timeout(config.browser.default_timeout_ms) {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: "browser.default_timeout_ms".into(),
            message,
        });
    }

    if config.server.port == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "type-error",
            path: "server.port".into(),
            message: "port 0 binds a random free port".into(),
        });
    }

    if let Some(ref chrome) = config.browser.chrome_path
        && !Path::new(chrome).exists()
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "file-ref",
            path: "browser.chrome_path".into(),
            message: format!("{chrome} does not exist"),
        });
    }
}
