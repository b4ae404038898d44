use action_primitives::Viewport;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::harness::Thresholds;

/// Environment variable overriding `target.base_url`
pub const BASE_URL_ENV: &str = "STOREPROBE_BASE_URL";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },

    #[error("{field} must be within 0.0..=1.0, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub browser: BrowserSettings,
    pub run: RunSettings,
    pub checkout: CheckoutData,
    pub timeouts: Timeouts,
    pub thresholds: Thresholds,
    /// Prometheus exporter port, 0 disables it
    pub metrics_port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngine {
    /// Local Chrome/Chromium over DevTools
    #[default]
    Chromium,
    /// In-memory storefront, no browser process
    Scripted,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrowserSettings {
    pub engine: BrowserEngine,
    pub headless: bool,
    pub viewport: Viewport,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub no_sandbox: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RunSettings {
    pub iterations: u32,
    /// Pause between iterations
    pub pause_ms: u64,
}

/// Form data typed into the guest checkout
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CheckoutData {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub phone: String,
    /// Option index picked in the pickup-store select
    pub pickup_store_index: usize,
    /// Seed for reproducible RUTs; random when absent
    pub rut_seed: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub body_ms: u64,
    pub element_ms: u64,
    pub action_ms: u64,
    pub url_change_ms: u64,
    pub options_ms: u64,
    pub settle_ms: u64,
    pub product_settle_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            browser: BrowserSettings::default(),
            run: RunSettings::default(),
            checkout: CheckoutData::default(),
            timeouts: Timeouts::default(),
            thresholds: Thresholds::default(),
            metrics_port: 9090,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.maconline.com".to_string(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::Chromium,
            headless: true,
            viewport: Viewport::default(),
            executable: None,
            user_data_dir: None,
            no_sandbox: false,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            iterations: 1,
            pause_ms: 1_000,
        }
    }
}

impl Default for CheckoutData {
    fn default() -> Self {
        Self {
            email: "test@gmail.com".to_string(),
            first_name: "Pedro".to_string(),
            last_name: "Perez".to_string(),
            address: "prueba".to_string(),
            phone: "999777777".to_string(),
            pickup_store_index: 1,
            rut_seed: None,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 60_000,
            body_ms: 30_000,
            element_ms: 20_000,
            action_ms: 5_000,
            url_change_ms: 25_000,
            options_ms: 40_000,
            settle_ms: 500,
            product_settle_ms: 2_000,
        }
    }
}

impl Config {
    /// Apply `STOREPROBE_BASE_URL` when set
    pub fn apply_env_overrides(&mut self) -> bool {
        match env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => {
                self.target.base_url = url.trim().to_string();
                true
            }
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.base_url.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "target.base_url",
            });
        }
        if self.browser.viewport.width == 0 || self.browser.viewport.height == 0 {
            return Err(ConfigError::Zero {
                field: "browser.viewport",
            });
        }
        if self.run.iterations == 0 {
            return Err(ConfigError::Zero {
                field: "run.iterations",
            });
        }
        let timeouts = [
            ("timeouts.navigation_ms", self.timeouts.navigation_ms),
            ("timeouts.body_ms", self.timeouts.body_ms),
            ("timeouts.element_ms", self.timeouts.element_ms),
            ("timeouts.action_ms", self.timeouts.action_ms),
            ("timeouts.url_change_ms", self.timeouts.url_change_ms),
            ("timeouts.options_ms", self.timeouts.options_ms),
        ];
        if let Some(&(field, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { field });
        }
        let limits = [
            ("thresholds.max_p95_run_ms", self.thresholds.max_p95_run_ms),
            ("thresholds.max_p95_lcp_ms", self.thresholds.max_p95_lcp_ms),
        ];
        if let Some(&(field, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { field });
        }
        let rate = self.thresholds.min_check_pass_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::OutOfRange {
                field: "thresholds.min_check_pass_rate",
                value: rate,
            });
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.target.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "target:\n  base_url: https://shop.example\nrun:\n  iterations: 3\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.base_url(), "https://shop.example");
        assert_eq!(config.run.iterations, 3);
        assert_eq!(config.run.pause_ms, 1_000);
        assert_eq!(config.timeouts.options_ms, 40_000);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.timeouts.action_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "timeouts.action_ms"
            })
        );
    }

    #[test]
    fn lcp_limit_is_configurable() {
        let yaml = "thresholds:\n  max_p95_lcp_ms: 3000\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.thresholds.max_p95_lcp_ms, 3_000);
        assert_eq!(Config::default().thresholds.max_p95_lcp_ms, 4_000);

        let mut zero = config;
        zero.thresholds.max_p95_lcp_ms = 0;
        assert_eq!(
            zero.validate(),
            Err(ConfigError::Zero {
                field: "thresholds.max_p95_lcp_ms"
            })
        );
    }

    #[test]
    fn pass_rate_must_be_a_ratio() {
        let mut config = Config::default();
        config.thresholds.min_check_pass_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    #[serial]
    fn env_overrides_base_url() {
        env::set_var(BASE_URL_ENV, "https://staging.example/");
        let mut config = Config::default();
        assert!(config.apply_env_overrides());
        env::remove_var(BASE_URL_ENV);
        assert_eq!(config.base_url(), "https://staging.example");
    }
}
