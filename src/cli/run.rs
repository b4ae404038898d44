use std::sync::Arc;
use std::time::Duration;

use action_flow::{FanoutRecorder, FlowReport, InMemoryRecorder, TracingRecorder};
use action_primitives::BrowserPort;
use anyhow::{bail, Context, Result};
use cdp_adapter::{CdpConfig, ChromiumBrowser};
use clap::Args;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::app_settings::{BrowserEngine, Config};
use crate::checkout::{guest_checkout, FLOW_ID};
use crate::cli::context::{CliContext, RunOverrides};
use crate::cli::output::{emit, render_report, render_summary, OutputFormat};
use crate::harness::{RunDriver, RunSummary, ThresholdBreach};
use crate::metrics::PrometheusRecorder;
use crate::storefront::{Storefront, StorefrontBrowser};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Number of iterations (overrides `run.iterations`)
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,

    /// Pause between iterations, e.g. `1s` or `250ms`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub pause: Option<Duration>,

    /// Storefront base URL (overrides `target.base_url`)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}

/// Everything one invocation produced
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub breaches: Vec<ThresholdBreach>,
    pub reports: Vec<FlowReport>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.run_config(RunOverrides {
        iterations: args.iterations,
        pause: args.pause,
        base_url: args.base_url,
        headful: args.headful,
        skip_delays: false,
    })?;

    info!(
        base_url = %config.base_url(),
        iterations = config.run.iterations,
        metrics_port = ctx.metrics_port(),
        "starting guest checkout runs"
    );

    match config.browser.engine {
        BrowserEngine::Chromium => {
            let browser = Arc::new(
                ChromiumBrowser::launch(&cdp_config(&config))
                    .await
                    .context("launching Chromium")?,
            );
            let result = execute(&config, browser.clone(), output).await;
            browser.shutdown().await;
            result
        }
        BrowserEngine::Scripted => {
            warn!("browser.engine is scripted; running against the in-memory storefront");
            let browser = Arc::new(StorefrontBrowser::new(Storefront::new(config.base_url())));
            execute(&config, browser, output).await
        }
    }
}

fn cdp_config(config: &Config) -> CdpConfig {
    let mut cdp = CdpConfig::default();
    cdp.headless = config.browser.headless;
    cdp.no_sandbox = cdp.no_sandbox || config.browser.no_sandbox;
    if let Some(executable) = &config.browser.executable {
        cdp.executable = executable.clone();
    }
    if let Some(dir) = &config.browser.user_data_dir {
        cdp.user_data_dir = dir.clone();
    }
    cdp
}

/// Drive the configured iterations, print the outcome and enforce thresholds
pub(crate) async fn execute(
    config: &Config,
    browser: Arc<dyn BrowserPort>,
    output: OutputFormat,
) -> Result<()> {
    let memory = Arc::new(InMemoryRecorder::new());
    let recorder = Arc::new(
        FanoutRecorder::new()
            .with(memory.clone())
            .with(Arc::new(TracingRecorder))
            .with(Arc::new(PrometheusRecorder::new())),
    );

    let mut rng = match config.checkout.rut_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let driver = RunDriver::new(browser, recorder)
        .with_pause(Duration::from_millis(config.run.pause_ms));
    let reports = driver
        .run(config.run.iterations, |_| {
            let rut = storeprobe_national_id::generate_with(&mut rng);
            guest_checkout(config, &rut)
        })
        .await?;

    let summary = RunSummary::from_run(FLOW_ID, &reports, &memory.checks());
    let breaches = config.thresholds.evaluate(&summary);
    let result = RunOutput {
        summary,
        breaches,
        reports,
    };

    emit(output, &result, |out| {
        let mut text: String = out.reports.iter().map(render_report).collect();
        text.push_str(&render_summary(&out.summary, &out.breaches));
        text
    })?;

    if !result.breaches.is_empty() {
        bail!(
            "{} threshold(s) breached: {}",
            result.breaches.len(),
            result
                .breaches
                .iter()
                .map(|b| b.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}
