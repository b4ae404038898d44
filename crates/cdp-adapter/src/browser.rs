//! `BrowserPort` over a locally launched Chromium

use action_primitives::{ActionError, BrowserPort, PagePort};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::AdapterError;
use crate::page::{map_cdp_error, ChromiumPage};

const LAUNCH_ARGS: [&str; 12] = [
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-breakpad",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-sync",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
];

pub struct ChromiumBrowser {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    poll_interval: Duration,
}

impl ChromiumBrowser {
    /// Launch Chromium and start draining its DevTools event stream
    pub async fn launch(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let config = browser_config(cfg)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| AdapterError::Launch(err.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "devtools handler stopped");
                    break;
                }
            }
        });

        info!(headless = cfg.headless, "chromium launched");
        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(10)),
        })
    }

    /// Close the browser process; errors are logged
    pub async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(err) = browser.close().await {
            warn!(error = %err, "browser close failed");
        }
        if let Err(err) = browser.wait().await {
            warn!(error = %err, "browser process did not exit cleanly");
        }
        self.handler.abort();
    }
}

#[async_trait]
impl BrowserPort for ChromiumBrowser {
    async fn new_page(&self) -> Result<Arc<dyn PagePort>, ActionError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(map_cdp_error)?;
        let page = ChromiumPage::new(page, self.poll_interval);
        debug!(page = %page.id(), "page opened");
        Ok(Arc::new(page))
    }
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
        return Err(AdapterError::Config(format!(
            "chrome executable not found at {}; set STOREPROBE_CHROME to the full path",
            cfg.executable.display()
        )));
    }

    let profile_dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        std::env::current_dir()?.join(&cfg.user_data_dir)
    };
    fs::create_dir_all(&profile_dir)?;

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.request_timeout_ms))
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms));
    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }
    builder = builder.args(LAUNCH_ARGS);
    if !cfg.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(cfg.executable.clone());
    }
    builder = builder.user_data_dir(profile_dir);

    builder
        .build()
        .map_err(|err| AdapterError::Config(format!("browser config error: {}", err)))
}
