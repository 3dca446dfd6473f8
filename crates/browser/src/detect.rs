//! Locating a Chromium binary and explaining how to install one.

use std::path::{Path, PathBuf};

/// Executable names looked up on `PATH`. All speak CDP.
const CHROMIUM_EXECUTABLES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chrome-browser",
    "headless-shell",
    "microsoft-edge",
    "microsoft-edge-stable",
    "msedge",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const PLATFORM_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "windows")]
const PLATFORM_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

/// Common locations in Linux container images.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM_PATHS: &[&str] = &["/usr/bin/chromium", "/usr/lib/chromium/chromium"];

/// Where the binary was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Config,
    EnvVar,
    PlatformPath,
    SearchPath,
}

/// Result of browser detection.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub path: Option<PathBuf>,
    pub source: Option<DetectionSource>,
    /// Install instructions, empty when a browser was found.
    pub install_hint: String,
}

impl DetectionResult {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }

    fn hit(path: PathBuf, source: DetectionSource) -> Self {
        Self {
            path: Some(path),
            source: Some(source),
            install_hint: String::new(),
        }
    }
}

/// Find a Chromium-based browser.
///
/// Order: configured path, `CHROME` environment variable, platform install
/// locations, then well-known names on `PATH`.
pub fn detect_browser(custom_path: Option<&str>) -> DetectionResult {
    detect_with(custom_path, std::env::var("CHROME").ok(), |name| {
        which::which(name).ok()
    })
}

fn detect_with(
    custom_path: Option<&str>,
    env_path: Option<String>,
    lookup: impl Fn(&str) -> Option<PathBuf>,
) -> DetectionResult {
    if let Some(path) = custom_path.filter(|p| Path::new(p).exists()) {
        return DetectionResult::hit(PathBuf::from(path), DetectionSource::Config);
    }

    if let Some(path) = env_path.filter(|p| Path::new(p).exists()) {
        return DetectionResult::hit(PathBuf::from(path), DetectionSource::EnvVar);
    }

    // Install locations beat PATH, which may hold stale wrapper scripts.
    if let Some(path) = PLATFORM_PATHS.iter().map(PathBuf::from).find(|p| p.exists()) {
        return DetectionResult::hit(path, DetectionSource::PlatformPath);
    }

    if let Some(path) = CHROMIUM_EXECUTABLES.iter().find_map(|name| lookup(name)) {
        return DetectionResult::hit(path, DetectionSource::SearchPath);
    }

    DetectionResult {
        path: None,
        source: None,
        install_hint: install_instructions(),
    }
}

/// Platform-specific install instructions.
pub fn install_instructions() -> String {
    let instructions = if cfg!(target_os = "macos") {
        "  brew install --cask google-chrome"
    } else if cfg!(target_os = "windows") {
        "  winget install Google.Chrome"
    } else if cfg!(target_os = "linux") {
        "  Debian/Ubuntu: sudo apt install chromium\n  \
         Fedora:        sudo dnf install chromium\n  \
         Alpine:        apk add chromium"
    } else {
        "  Download from https://www.google.com/chrome/"
    };

    format!(
        "No Chromium-based browser found. Install one:\n\n\
         {instructions}\n\n\
         Or point scrapegate at it:\n  \
         [browser]\n  \
         chrome_path = \"/path/to/chromium\"\n\n\
         Or set the CHROME environment variable."
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_instructions_mention_config() {
        let hint = install_instructions();
        assert!(hint.contains("chrome_path"));
        assert!(hint.contains("CHROME"));
    }

    #[test]
    fn custom_path_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-chrome");
        std::fs::write(&fake, "").unwrap();

        let result = detect_with(Some(fake.to_str().unwrap()), None, |_| None);
        assert!(result.found());
        assert_eq!(result.source, Some(DetectionSource::Config));
        assert_eq!(result.path.as_deref(), Some(fake.as_path()));
    }

    #[test]
    fn env_var_used_when_custom_path_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("env-chrome");
        std::fs::write(&fake, "").unwrap();

        let result = detect_with(
            Some("/nonexistent/chrome"),
            Some(fake.to_string_lossy().into_owned()),
            |_| None,
        );
        assert_eq!(result.source, Some(DetectionSource::EnvVar));
    }

    #[test]
    fn search_path_lookup_is_the_fallback() {
        let result = detect_with(None, None, |name| {
            (name == "google-chrome").then(|| PathBuf::from("/opt/bin/google-chrome"))
        });
        // A platform install on the test host wins over PATH.
        if result.source != Some(DetectionSource::PlatformPath) {
            assert_eq!(result.source, Some(DetectionSource::SearchPath));
            assert_eq!(
                result.path.as_deref(),
                Some(Path::new("/opt/bin/google-chrome"))
            );
        }
    }

    #[test]
    fn nothing_found_carries_install_hint() {
        let result = detect_with(None, Some("/nonexistent".into()), |_| None);
        if !result.found() {
            assert!(result.install_hint.contains("No Chromium-based browser"));
        }
    }
}
