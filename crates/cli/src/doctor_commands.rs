//! `scrapegate doctor`: config validation, security audit and browser
//! detection.
//!
//! Prints a structured report with `[ok]`, `[warn]`, `[fail]` or `[info]`
//! per item.

use std::path::Path;

use {
    anyhow::Result,
    scrapegate_browser::{
        BrowserConfig, BrowserManager,
        detect::{DetectionSource, detect_browser},
    },
    scrapegate_config::{ScrapegateConfig, Severity, validate},
    secrecy::ExposeSecret,
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Info => CYAN,
        }
    }
}

impl From<Severity> for Status {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => Self::Fail,
            Severity::Warning => Self::Warn,
            Severity::Info => Self::Info,
        }
    }
}

struct Section {
    title: String,
    items: Vec<(Status, String)>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push((status, message.into()));
    }

    fn count(&self, status: Status) -> usize {
        self.items.iter().filter(|(s, _)| *s == status).count()
    }
}

fn print_report(sections: &[Section]) -> (usize, usize) {
    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for (status, message) in &section.items {
            eprintln!("  [{}{}{RESET}]  {message}", status.color(), status.label());
        }
        eprintln!();
    }
    let errors = sections.iter().map(|s| s.count(Status::Fail)).sum();
    let warnings = sections.iter().map(|s| s.count(Status::Warn)).sum();
    (errors, warnings)
}

/// Run every check and print the report. With `launch` set, also start the
/// browser once and close it again.
pub async fn handle_doctor(config_path: Option<&Path>, launch: bool) -> Result<()> {
    eprintln!("{BOLD}scrapegate doctor{RESET}");
    eprintln!("{BOLD}================={RESET}\n");

    let mut sections = vec![check_config(config_path)];

    let config = match scrapegate_config::load_from(config_path) {
        Ok(config) => config,
        Err(e) => {
            let mut section = Section::new("Effective config");
            section.push(Status::Fail, e.to_string());
            sections.push(section);
            ScrapegateConfig::default()
        },
    };

    sections.push(check_security(&config));
    sections.push(check_browser(&config));
    if launch {
        sections.push(check_launch(&config).await);
    }

    let (errors, warnings) = print_report(&sections);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

// ── 1. Config validation ────────────────────────────────────────────────────

fn check_config(path: Option<&Path>) -> Section {
    let result = validate::validate(path);
    let label = result
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".into());
    let mut section = Section::new(format!("Config ({label})"));

    if result
        .diagnostics
        .iter()
        .any(|d| d.category == "syntax" && d.severity == Severity::Error)
    {
        for d in result.diagnostics.iter().filter(|d| d.category == "syntax") {
            section.push(Status::Fail, format!("syntax: {}", d.message));
        }
        return section;
    }
    section.push(Status::Ok, "syntax valid");

    let mut clean = true;
    for d in &result.diagnostics {
        // Key presence is judged on the effective config below.
        if d.category == "security" {
            continue;
        }
        if d.severity != Severity::Info {
            clean = false;
        }
        let message = if d.path.is_empty() {
            d.message.clone()
        } else {
            format!("{}: {}", d.path, d.message)
        };
        section.push(d.severity.into(), message);
    }
    if clean {
        section.push(Status::Ok, "all fields recognized");
    }
    section
}

// ── 2. Security audit ───────────────────────────────────────────────────────

fn check_security(config: &ScrapegateConfig) -> Section {
    let mut section = Section::new("Security");

    match config.auth.api_key {
        Some(ref key) if !key.expose_secret().is_empty() => {
            section.push(Status::Ok, "API key configured");
            if key.expose_secret().len() < 16 {
                section.push(Status::Warn, "API key is shorter than 16 characters");
            }
        },
        _ => section.push(
            Status::Fail,
            "no API key configured; every /scrape request will be rejected (set SERVICE_API_KEY)",
        ),
    }

    if config.server.cors_allow_any {
        section.push(Status::Info, "CORS allows any origin");
    }
    section
}

// ── 3. Browser detection ────────────────────────────────────────────────────

fn check_browser(config: &ScrapegateConfig) -> Section {
    let mut section = Section::new("Browser");

    let detection = detect_browser(config.browser.chrome_path.as_deref());
    match (&detection.path, detection.source) {
        (Some(path), Some(source)) => {
            let via = match source {
                DetectionSource::Config => "browser.chrome_path",
                DetectionSource::EnvVar => "CHROME",
                DetectionSource::PlatformPath => "platform install location",
                DetectionSource::SearchPath => "PATH",
            };
            section.push(Status::Ok, format!("found {} (via {via})", path.display()));
        },
        _ => {
            section.push(Status::Fail, "no Chromium-based browser found");
            for line in detection.install_hint.lines().filter(|l| !l.is_empty()) {
                section.push(Status::Info, line.to_string());
            }
        },
    }

    section.push(
        Status::Info,
        format!(
            "mode: {}",
            if config.browser.headless {
                "headless"
            } else {
                "headed"
            }
        ),
    );
    section.push(
        Status::Info,
        format!("page timeout: {} ms", config.browser.default_timeout_ms),
    );
    section
}

async fn check_launch(config: &ScrapegateConfig) -> Section {
    let mut section = Section::new("Browser launch");
    let manager = BrowserManager::new(BrowserConfig::from(&config.browser));
    match manager.acquire().await {
        Ok(_) => section.push(Status::Ok, "browser launched and connected"),
        Err(e) => section.push(Status::Fail, e.to_string()),
    }
    manager.shutdown().await;
    section
}
