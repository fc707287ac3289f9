//! Run report rendering
//!
//! Turns a `PipelineRun` into operator-facing output: a styled text summary
//! with the failing step's captured output verbatim, or JSON for tooling.

use crate::error::StagehandResult;
use crate::pipeline::sequencer::{PipelineRun, RunState};
use crate::pipeline::stage::{StageFailure, StageState};
use console::style;
use std::fmt::Write;

/// Render the run as human-readable text
pub fn render_text(run: &PipelineRun) -> String {
    let mut out = String::new();

    let total = (run.finished_at - run.started_at).num_milliseconds();
    match &run.state {
        RunState::Succeeded => {
            let _ = writeln!(
                out,
                "Pipeline {}: {} ({})",
                style(&run.pipeline).cyan().bold(),
                style("succeeded").green().bold(),
                format_duration(total)
            );
        }
        RunState::FailedAt { stage } => {
            let _ = writeln!(
                out,
                "Pipeline {}: {} at stage '{}' ({})",
                style(&run.pipeline).cyan().bold(),
                style("failed").red().bold(),
                stage,
                format_duration(total)
            );
        }
    }
    let _ = writeln!(out);

    let name_width = run
        .stages
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0);

    for stage in &run.stages {
        // Pad before styling; escape codes would skew the column width
        let label = format!("{:9}", stage.state.to_string());
        let state = match stage.state {
            StageState::Succeeded => style(label).green(),
            StageState::Failed => style(label).red(),
            StageState::Skipped => style(label).dim(),
            StageState::Pending | StageState::Running => style(label).yellow(),
        };

        let mut line = format!(
            "  {:name_width$}  {}",
            stage.name,
            state,
            name_width = name_width
        );
        if stage.state != StageState::Skipped {
            let _ = write!(line, "  {:>8}", format_duration(stage.duration_ms));
        }
        if let Some(key) = &stage.restored_key {
            let _ = write!(line, "  cache: {}", key);
        }
        if let Some(failure) = &stage.failure {
            let _ = write!(line, "  [{}]", failure.label());
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }

    if let Some(failing) = run.failing_stage() {
        if let Some(failure) = &failing.failure {
            let _ = writeln!(out);
            render_failure(&mut out, &failing.name, failure);
        }
    }

    out
}

fn render_failure(out: &mut String, stage: &str, failure: &StageFailure) {
    match failure {
        StageFailure::StepFailed { command, result } => {
            let _ = writeln!(
                out,
                "Stage '{}' failed: {} (exit {})",
                stage, command, result.exit_code
            );
            if !result.stdout.is_empty() {
                let _ = writeln!(out, "{}", style("--- stdout ---").dim());
                let _ = writeln!(out, "{}", result.stdout.trim_end());
            }
            if !result.stderr.is_empty() {
                let _ = writeln!(out, "{}", style("--- stderr ---").dim());
                let _ = writeln!(out, "{}", result.stderr.trim_end());
            }
        }
        StageFailure::MissingFacet { facet } => {
            let _ = writeln!(
                out,
                "Stage '{}' failed: cache key template references facet '{}' missing from run metadata",
                stage, facet
            );
        }
        StageFailure::Infrastructure { command, message } => {
            let _ = writeln!(
                out,
                "Stage '{}' failed (infrastructure fault): {}: {}",
                stage, command, message
            );
        }
        StageFailure::Cancelled => {
            let _ = writeln!(out, "Stage '{}' cancelled", stage);
        }
    }
}

/// Render the run as pretty-printed JSON
pub fn render_json(run: &PipelineRun) -> StagehandResult<String> {
    Ok(serde_json::to_string_pretty(run)?)
}

/// Format a millisecond duration like "340ms" or "2.1s"
fn format_duration(ms: i64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms.max(0))
    }
}
