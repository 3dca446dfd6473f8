use std::path::Path;

use {
    anyhow::Result,
    scrapegate_config::{Diagnostic, Severity, validate},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// `scrapegate check`: validate the config file and print diagnostics.
///
/// Exits with status 1 when any error is reported.
pub fn handle_check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(path);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let shown: Vec<&Diagnostic> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .collect();
    for d in &shown {
        eprintln!("  {}", format_diagnostic(d));
    }
    if !shown.is_empty() {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn format_diagnostic(d: &Diagnostic) -> String {
    let (color, label) = match d.severity {
        Severity::Error => (RED, "error"),
        Severity::Warning => (YELLOW, "warning"),
        Severity::Info => (CYAN, "info"),
    };
    if d.path.is_empty() {
        format!("{BOLD}{color}{label}{RESET} {}", d.message)
    } else {
        format!("{BOLD}{color}{label}{RESET} {}: {}", d.path, d.message)
    }
}
