//! Launch configuration and Chrome discovery

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use which::which;

/// Settings used to launch a local Chromium
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Browser binary; empty means let chromiumoxide search
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub launch_timeout_ms: u64,
    /// Bound for a single DevTools request
    pub request_timeout_ms: u64,
    /// Interval between polls while waiting on the DOM
    pub poll_interval_ms: u64,
    /// Pass `--no-sandbox` (containers)
    pub no_sandbox: bool,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            launch_timeout_ms: 20_000,
            request_timeout_ms: 30_000,
            poll_interval_ms: 100,
            no_sandbox: env_flag("STOREPROBE_DISABLE_SANDBOX"),
        }
    }
}

fn resolve_headless_default() -> bool {
    // "0", "false", "no", "off" means headful
    match env::var("STOREPROBE_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|value| value.eq_ignore_ascii_case("true") || value == "1")
        .unwrap_or(false)
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("STOREPROBE_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    Path::new("./.storeprobe-profile").into()
}

/// Locate a Chrome/Chromium binary: `STOREPROBE_CHROME`, then `PATH`, then
/// well-known install locations
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("STOREPROBE_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    if env_flag("STOREPROBE_SKIP_OS_PATHS") {
        return None;
    }
    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "freebsd")))]
    {
        Vec::new()
    }
}
