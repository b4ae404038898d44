use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_settings::{Config, ConfigError};

/// Command-line adjustments layered over the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub iterations: Option<u32>,
    pub pause: Option<Duration>,
    pub base_url: Option<String>,
    pub headful: bool,
    /// Drop settle delays and the pause between iterations
    pub skip_delays: bool,
}

/// Loaded configuration plus where it came from
pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    metrics_port: u16,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, metrics_port: u16) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            metrics_port,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn metrics_port(&self) -> u16 {
        self.metrics_port
    }

    /// Settings for one invocation; the loaded configuration is left untouched
    pub fn run_config(&self, overrides: RunOverrides) -> Result<Config, ConfigError> {
        let mut config = self.config().clone();
        if let Some(iterations) = overrides.iterations {
            config.run.iterations = iterations;
        }
        if let Some(pause) = overrides.pause {
            config.run.pause_ms = pause.as_millis() as u64;
        }
        if let Some(base_url) = overrides.base_url {
            config.target.base_url = base_url;
        }
        if overrides.headful {
            config.browser.headless = false;
        }
        if overrides.skip_delays {
            config.run.pause_ms = 0;
            config.timeouts.settle_ms = 0;
            config.timeouts.product_settle_ms = 0;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CliContext {
        CliContext::new(Config::default(), PathBuf::from("storeprobe.yaml"), 9464)
    }

    #[test]
    fn overrides_apply_to_a_copy() {
        let ctx = ctx();
        let config = ctx
            .run_config(RunOverrides {
                iterations: Some(5),
                pause: Some(Duration::from_millis(250)),
                base_url: Some("https://staging.example/".into()),
                headful: true,
                ..RunOverrides::default()
            })
            .unwrap();

        assert_eq!(config.run.iterations, 5);
        assert_eq!(config.run.pause_ms, 250);
        assert_eq!(config.base_url(), "https://staging.example");
        assert!(!config.browser.headless);
        assert_eq!(ctx.config().run.iterations, 1);
        assert!(ctx.config().browser.headless);
    }

    #[test]
    fn skipping_delays_zeroes_settle_and_pause() {
        let config = ctx()
            .run_config(RunOverrides {
                pause: Some(Duration::from_secs(3)),
                skip_delays: true,
                ..RunOverrides::default()
            })
            .unwrap();

        assert_eq!(config.run.pause_ms, 0);
        assert_eq!(config.timeouts.settle_ms, 0);
        assert_eq!(config.timeouts.product_settle_ms, 0);
        assert_eq!(config.timeouts.navigation_ms, 60_000);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let result = ctx().run_config(RunOverrides {
            iterations: Some(0),
            ..RunOverrides::default()
        });
        assert_eq!(
            result.unwrap_err(),
            ConfigError::Zero {
                field: "run.iterations"
            }
        );
    }
}
