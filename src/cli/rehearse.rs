use std::sync::Arc;

use action_flow::FlowDefinition;
use anyhow::{Context, Result};
use clap::Args;
use storeprobe_national_id::{Rut, MIN_BODY};
use tracing::info;

use crate::checkout::guest_checkout;
use crate::cli::context::{CliContext, RunOverrides};
use crate::cli::output::OutputFormat;
use crate::cli::run::execute;
use crate::storefront::{Branch, Storefront, StorefrontBrowser};

#[derive(Args, Clone, Debug)]
pub struct RehearseArgs {
    /// Take the store-pickup branch (region, commune and shipping method disappear)
    #[arg(long)]
    pub pickup: bool,

    /// Make every page call of the named step fail
    #[arg(long, value_name = "STEP")]
    pub fail_step: Option<String>,

    /// Number of iterations
    #[arg(short = 'n', long, default_value_t = 1)]
    pub iterations: u32,

    /// Keep configured settle delays instead of skipping them
    #[arg(long)]
    pub realtime: bool,

    /// Largest Contentful Paint the scripted pages report
    #[arg(long, value_name = "MS")]
    pub lcp_ms: Option<u64>,
}

pub async fn cmd_rehearse(args: RehearseArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.run_config(RunOverrides {
        iterations: Some(args.iterations),
        skip_delays: !args.realtime,
        ..RunOverrides::default()
    })?;

    let branch = if args.pickup {
        Branch::Pickup
    } else {
        Branch::Delivery
    };
    let mut storefront = Storefront::new(config.base_url()).branch(branch);
    if let Some(lcp_ms) = args.lcp_ms {
        storefront = storefront.with_lcp(lcp_ms);
    }
    if let Some(step) = &args.fail_step {
        let flow = guest_checkout(&config, &Rut::from_body(MIN_BODY));
        for selector in step_selectors(&flow, step)? {
            storefront = storefront.failing(selector);
        }
    }

    info!(?branch, fail_step = ?args.fail_step, "rehearsing against the scripted storefront");
    let browser = Arc::new(StorefrontBrowser::new(storefront));
    execute(&config, browser, output).await
}

/// Every selector (or URL) a step touches
fn step_selectors(flow: &FlowDefinition, name: &str) -> Result<Vec<String>> {
    let step = flow
        .step(name)
        .with_context(|| format!("unknown step {:?}", name))?;
    let mut selectors: Vec<String> = step
        .interactions
        .iter()
        .filter_map(|i| i.selector())
        .map(str::to_string)
        .collect();
    if let Some(applicability) = &step.applicability {
        selectors.push(applicability.selector().to_string());
    }
    selectors.sort();
    selectors.dedup();
    Ok(selectors)
}
