use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{ConfigError, Result},
    schema::{MAX_PAGE_TIMEOUT_MS, ScrapegateConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "scrapegate.toml",
    "scrapegate.yaml",
    "scrapegate.yml",
    "scrapegate.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ScrapegateConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut value = parse_config_value(&raw, path)?;
    substitute_env(&mut value);
    Ok(serde_json::from_value(value)?)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./scrapegate.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/scrapegate/scrapegate.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ScrapegateConfig::default()` if no config file is found or the
/// file fails to parse.
pub fn discover_and_load() -> ScrapegateConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ScrapegateConfig::default()
}

/// Full startup load: an explicit file (which must parse) or discovery,
/// then the process environment on top.
///
/// The effective page timeout must lie in `1..=MAX_PAGE_TIMEOUT_MS`.
pub fn load_from(path: Option<&Path>) -> Result<ScrapegateConfig> {
    let mut config = match path {
        Some(p) => load_config(p)?,
        None => discover_and_load(),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    check_page_timeout(config.browser.default_timeout_ms).map_err(|message| {
        ConfigError::InvalidValue {
            field: "browser.default_timeout_ms",
            message,
        }
    })?;
    Ok(config)
}

/// A page timeout in milliseconds must be positive and within the cap.
pub(crate) fn check_page_timeout(ms: u64) -> std::result::Result<u64, String> {
    match ms {
        0 => Err("timeout must be greater than zero".into()),
        ms if ms > MAX_PAGE_TIMEOUT_MS => {
            Err(format!("timeout must not exceed {MAX_PAGE_TIMEOUT_MS} ms"))
        },
        ms => Ok(ms),
    }
}

/// Apply the service environment variables on top of file config.
///
/// | Variable           | Field                        |
/// |--------------------|------------------------------|
/// | `SERVICE_API_KEY`  | `auth.api_key`               |
/// | `BROWSER_HEADLESS` | `browser.headless`           |
/// | `DEFAULT_TIMEOUT`  | `browser.default_timeout_ms` |
/// | `PORT`             | `server.port`                |
pub fn apply_env_overrides(
    config: &mut ScrapegateConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(key) = lookup("SERVICE_API_KEY") {
        config.auth.api_key = Some(Secret::new(key));
    }

    // Only a case-insensitive "true" enables headless mode.
    if let Some(raw) = lookup("BROWSER_HEADLESS") {
        config.browser.headless = raw.trim().eq_ignore_ascii_case("true");
    }

    if let Some(raw) = lookup("DEFAULT_TIMEOUT") {
        config.browser.default_timeout_ms = raw
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| e.to_string())
            .and_then(check_page_timeout)
            .map_err(|message| ConfigError::InvalidEnv {
                var: "DEFAULT_TIMEOUT",
                message,
            })?;
    }

    if let Some(raw) = lookup("PORT") {
        config.server.port =
            raw.trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidEnv {
                    var: "PORT",
                    message: e.to_string(),
                })?;
    }

    Ok(())
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/scrapegate/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "scrapegate").map(|d| d.config_dir().to_path_buf())
}

/// Parse raw config text into a JSON value, picking the format from the
/// file extension (TOML when there is none).
pub(crate) fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, std::collections::HashMap};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn loads_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("scrapegate.toml", "[server]\nport = 9001\n"),
            ("scrapegate.yaml", "server:\n  port: 9001\n"),
            ("scrapegate.json", r#"{"server": {"port": 9001}}"#),
        ];
        for (name, body) in cases {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            let cfg = load_config(&path).unwrap();
            assert_eq!(cfg.server.port, 9001, "{name}");
        }
    }

    #[test]
    fn unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrapegate.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_config(Path::new("/nonexistent/scrapegate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = ScrapegateConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("SERVICE_API_KEY", "abc"),
                ("BROWSER_HEADLESS", "False"),
                ("DEFAULT_TIMEOUT", "5000"),
                ("PORT", "8080"),
            ]),
        )
        .unwrap();
        assert_eq!(
            cfg.auth.api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("abc")
        );
        assert!(!cfg.browser.headless);
        assert_eq!(cfg.browser.default_timeout_ms, 5000);
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn headless_only_true_enables() {
        for (raw, expected) in [("TRUE", true), ("true", true), ("1", false), ("yes", false)] {
            let mut cfg = ScrapegateConfig::default();
            apply_env_overrides(&mut cfg, env(&[("BROWSER_HEADLESS", raw)])).unwrap();
            assert_eq!(cfg.browser.headless, expected, "{raw}");
        }
    }

    #[test]
    fn bad_numeric_env_is_error() {
        let mut cfg = ScrapegateConfig::default();
        let err = apply_env_overrides(&mut cfg, env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "PORT", .. }));
    }

    #[test]
    fn out_of_range_env_timeout_is_error() {
        for raw in ["0", "300001"] {
            let mut cfg = ScrapegateConfig::default();
            let err =
                apply_env_overrides(&mut cfg, env(&[("DEFAULT_TIMEOUT", raw)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnv { var: "DEFAULT_TIMEOUT", .. }),
                "{raw}"
            );
            assert_eq!(cfg.browser.default_timeout_ms, 30_000);
        }

        let mut cfg = ScrapegateConfig::default();
        apply_env_overrides(&mut cfg, env(&[("DEFAULT_TIMEOUT", "300000")])).unwrap();
        assert_eq!(cfg.browser.default_timeout_ms, 300_000);
    }

    #[test]
    fn zero_file_timeout_fails_startup_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrapegate.toml");
        std::fs::write(&path, "[browser]\ndefault_timeout_ms = 0\n").unwrap();

        // The file itself parses; the effective value is what gets rejected.
        assert_eq!(load_config(&path).unwrap().browser.default_timeout_ms, 0);
        let err = load_from(Some(&path)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "browser.default_timeout_ms",
                ..
            }
        ));
    }

    #[test]
    fn file_placeholders_expand_only_in_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrapegate.yaml");
        std::fs::write(
            &path,
            "auth:\n  api_key: \"${SCRAPEGATE_LOADER_UNSET:-from-default}\"\n\
             browser:\n  chrome_args: [\"--x=${SCRAPEGATE_LOADER_UNSET}\"]\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(
            cfg.auth.api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("from-default")
        );
        assert_eq!(cfg.browser.chrome_args, vec!["--x=${SCRAPEGATE_LOADER_UNSET}"]);
    }

    #[test]
    fn no_env_leaves_file_values() {
        let mut cfg = ScrapegateConfig::default();
        cfg.server.port = 1234;
        apply_env_overrides(&mut cfg, env(&[])).unwrap();
        assert_eq!(cfg.server.port, 1234);
        assert!(cfg.auth.api_key.is_none());
    }
}
