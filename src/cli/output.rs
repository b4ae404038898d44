use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use action_flow::{FlowReport, OutcomeKind};

use crate::harness::{RunSummary, ThresholdBreach};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Print `value` as JSON/YAML, or hand it to `human` for the text rendering
pub fn emit<T, F>(format: OutputFormat, value: &T, human: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => println!("{}", human(value)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

pub fn render_report(report: &FlowReport) -> String {
    let mut out = format!(
        "run {} [{}] {} in {}ms\n",
        report.run_id,
        report.flow_id,
        if report.final_verdict { "PASSED" } else { "FAILED" },
        report.latency_ms
    );
    for outcome in &report.outcomes {
        let mark = match outcome.kind {
            OutcomeKind::Succeeded => "ok  ",
            OutcomeKind::NotApplicable => "skip",
            OutcomeKind::Failed => "FAIL",
        };
        out.push_str(&format!(
            "  {} {:<22} {:>6}ms",
            mark, outcome.step_name, outcome.latency_ms
        ));
        if let Some(error) = &outcome.error_message {
            out.push_str(&format!("  {}", error));
        }
        out.push('\n');
    }
    if let Some(step) = &report.aborted_at {
        out.push_str(&format!("  aborted at {}\n", step));
    }
    if let Some(fatal) = &report.fatal_error {
        out.push_str(&format!("  fatal: {}\n", fatal));
    }
    if let Some(lcp) = report.lcp_ms {
        out.push_str(&format!("  largest contentful paint {}ms\n", lcp));
    }
    if !report.cleanup_ok {
        out.push_str("  page release failed\n");
    }
    out
}

pub fn render_summary(summary: &RunSummary, breaches: &[ThresholdBreach]) -> String {
    let mut out = format!(
        "{}: {}/{} runs passed, {}/{} checks passed ({:.2}%)",
        summary.flow_id,
        summary.verdicts_passed,
        summary.runs,
        summary.passed_checks,
        summary.total_checks,
        summary.check_pass_rate() * 100.0
    );
    if let Some(p95) = summary.p95_run_ms() {
        out.push_str(&format!(", p(95) run {}ms", p95));
    }
    if let Some(p95) = summary.p95_lcp_ms() {
        out.push_str(&format!(", p(95) lcp {}ms", p95));
    }
    for breach in breaches {
        out.push_str(&format!("\n  threshold breached: {}", breach));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::{Step, StepOutcome};
    use chrono::Utc;
    use storeprobe_core_types::RunId;

    #[test]
    fn report_marks_each_outcome() {
        let now = Utc::now();
        let home = Step::critical("home", "Home");
        let region = Step::best_effort("region", "Region");
        let report = FlowReport {
            run_id: RunId::new(),
            flow_id: "guest_checkout".into(),
            outcomes: vec![
                StepOutcome::succeeded_step(&home, now, 12),
                StepOutcome::not_applicable(&region, now, 1),
            ],
            aborted: false,
            aborted_at: None,
            fatal_error: Some("page acquisition failed".into()),
            final_verdict: false,
            cleanup_ok: true,
            lcp_ms: Some(1_730),
            started_at: now,
            finished_at: now,
            latency_ms: 13,
        };

        let text = render_report(&report);
        assert!(text.contains("FAILED"));
        assert!(text.contains("ok   home"));
        assert!(text.contains("skip region"));
        assert!(text.contains("fatal: page acquisition failed"));
        assert!(text.contains("largest contentful paint 1730ms"));
    }
}
