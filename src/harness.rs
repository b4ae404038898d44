//! Run driver and pass/fail thresholds
//!
//! Iterations run one after another against the same browser. Each
//! iteration builds a fresh flow definition so per-run data (the RUT) is
//! regenerated.

use action_flow::{Check, FlowDefinition, FlowReport, FlowSequencer, OutcomeRecorder};
use action_primitives::BrowserPort;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Limits a run must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Checks passed over checks recorded must be strictly above this
    pub min_check_pass_rate: f64,
    /// 95th percentile run duration must be strictly below this
    pub max_p95_run_ms: u64,
    /// 95th percentile Largest Contentful Paint must be strictly below this
    pub max_p95_lcp_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_check_pass_rate: 0.99,
            max_p95_run_ms: 120_000,
            max_p95_lcp_ms: 4_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBreach {
    pub name: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ThresholdBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.name, self.expected, self.actual
        )
    }
}

impl Thresholds {
    /// Breached thresholds; empty when the run passes
    pub fn evaluate(&self, summary: &RunSummary) -> Vec<ThresholdBreach> {
        let mut breaches = Vec::new();
        if summary.check_pass_rate() <= self.min_check_pass_rate {
            breaches.push(ThresholdBreach {
                name: "checks".to_string(),
                expected: format!("rate > {:.2}", self.min_check_pass_rate),
                actual: format!("{:.4}", summary.check_pass_rate()),
            });
        }
        if let Some(p95) = summary.p95_run_ms() {
            if p95 >= self.max_p95_run_ms {
                breaches.push(ThresholdBreach {
                    name: "run_duration".to_string(),
                    expected: format!("p(95) < {}ms", self.max_p95_run_ms),
                    actual: format!("{}ms", p95),
                });
            }
        }
        // runs whose page never reported a paint contribute no sample
        if let Some(p95) = summary.p95_lcp_ms() {
            if p95 >= self.max_p95_lcp_ms {
                breaches.push(ThresholdBreach {
                    name: "lcp".to_string(),
                    expected: format!("p(95) < {}ms", self.max_p95_lcp_ms),
                    actual: format!("{}ms", p95),
                });
            }
        }
        breaches
    }
}

/// Aggregate of every run and check of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub flow_id: String,
    pub runs: usize,
    pub verdicts_passed: usize,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub run_durations_ms: Vec<u64>,
    #[serde(default)]
    pub lcp_samples_ms: Vec<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn from_run(flow_id: &str, reports: &[FlowReport], checks: &[Check]) -> Self {
        let started_at = reports
            .iter()
            .map(|r| r.started_at)
            .min()
            .unwrap_or_else(Utc::now);
        let finished_at = reports
            .iter()
            .map(|r| r.finished_at)
            .max()
            .unwrap_or(started_at);
        Self {
            flow_id: flow_id.to_string(),
            runs: reports.len(),
            verdicts_passed: reports.iter().filter(|r| r.final_verdict).count(),
            total_checks: checks.len(),
            passed_checks: checks.iter().filter(|c| c.passed).count(),
            run_durations_ms: reports.iter().map(|r| r.latency_ms).collect(),
            lcp_samples_ms: reports.iter().filter_map(|r| r.lcp_ms).collect(),
            started_at,
            finished_at,
        }
    }

    pub fn check_pass_rate(&self) -> f64 {
        if self.total_checks == 0 {
            return 0.0;
        }
        self.passed_checks as f64 / self.total_checks as f64
    }

    pub fn p95_run_ms(&self) -> Option<u64> {
        p95(&self.run_durations_ms)
    }

    pub fn p95_lcp_ms(&self) -> Option<u64> {
        p95(&self.lcp_samples_ms)
    }
}

/// Nearest-rank 95th percentile
fn p95(samples: &[u64]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let rank = ((sorted.len() as f64) * 0.95).ceil() as usize;
    sorted.get(rank.saturating_sub(1)).copied()
}

/// Runs a flow repeatedly, one iteration at a time
pub struct RunDriver {
    browser: Arc<dyn BrowserPort>,
    recorder: Arc<dyn OutcomeRecorder>,
    pause: Duration,
}

impl RunDriver {
    pub fn new(browser: Arc<dyn BrowserPort>, recorder: Arc<dyn OutcomeRecorder>) -> Self {
        Self {
            browser,
            recorder,
            pause: Duration::ZERO,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Execute `iterations` runs; `build_flow` receives the iteration index
    pub async fn run<F>(&self, iterations: u32, mut build_flow: F) -> Result<Vec<FlowReport>>
    where
        F: FnMut(u32) -> FlowDefinition,
    {
        let mut reports = Vec::with_capacity(iterations as usize);
        for iteration in 0..iterations {
            let flow = build_flow(iteration);
            let flow_id = flow.id.clone();
            let sequencer = FlowSequencer::new(flow, self.recorder.clone())
                .with_context(|| format!("flow {} is not runnable", flow_id))?;

            let report = sequencer.run(self.browser.as_ref()).await;
            if report.final_verdict {
                info!(iteration, run_id = %report.run_id, "iteration passed");
            } else {
                warn!(
                    iteration,
                    run_id = %report.run_id,
                    failed = report.failed_steps().count(),
                    aborted_at = report.aborted_at.as_deref().unwrap_or("-"),
                    "iteration failed"
                );
            }
            reports.push(report);

            if iteration + 1 < iterations && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }
        Ok(reports)
    }
}
