//! CLI output formatting

use crate::{
    core::{ExecutionStatus, FailureMode, Stage, StageRule, StageState},
    execution::ExecutionEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Spinner shown while waiting on a service
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        spinner.set_style(template);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// A horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80)
        .min(120);
    "─".repeat(width)
}

/// Format a stage state for display
pub fn format_stage_state(state: &StageState) -> String {
    match state {
        StageState::Pending => style("PENDING").dim().to_string(),
        StageState::Running { .. } => style("RUNNING").yellow().to_string(),
        StageState::Passed { .. } => style("PASSED").green().to_string(),
        StageState::Unstable { .. } => style("UNSTABLE").yellow().to_string(),
        StageState::Failed { .. } => style("FAILED").red().to_string(),
        StageState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// One line of the post-run summary: stage id, final state and duration
pub fn format_stage_summary(stage: &Stage) -> String {
    let duration = match &stage.state {
        StageState::Passed { started_at, completed_at, .. }
        | StageState::Unstable { started_at, completed_at, .. } => Some(*completed_at - *started_at),
        StageState::Failed { started_at, failed_at, .. } => Some(*failed_at - *started_at),
        _ => None,
    };

    let line = format!("  {:<18} {}", style(stage.id()).cyan(), format_stage_state(&stage.state));
    match duration {
        Some(elapsed) => format!("{} {}", line, style(format!("({}s)", elapsed.num_seconds())).dim()),
        None => line,
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("SUCCESS").green().to_string(),
        ExecutionStatus::Unstable => style("UNSTABLE").yellow().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

pub fn format_failure_mode(mode: FailureMode) -> String {
    match mode {
        FailureMode::Fatal => style("blocking").red().to_string(),
        FailureMode::Unstable => style("unstable on failure").yellow().to_string(),
        FailureMode::Ignore => style("ignored on failure").dim().to_string(),
    }
}

/// One line of `plan` output
pub fn format_plan_entry(index: usize, rule: &StageRule) -> String {
    format!(
        "  {:>2}. {:<18} {}",
        index + 1,
        style(rule.stage.id()).cyan(),
        format_failure_mode(rule.on_failure)
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            branch,
            stages,
        } => format!(
            "{} Starting pipeline {} on {} with {} stage(s) ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(branch).cyan(),
            stages.len(),
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StageStarted { stage, parallel } => {
            if *parallel {
                format!("{} {} {}", SPINNER, style(stage.title()).cyan(), style("(parallel)").dim())
            } else {
                format!("{} {}", SPINNER, style(stage.title()).cyan())
            }
        }
        ExecutionEvent::StageOutput { stage, output } => {
            format!("{} Output from {}:\n{}", INFO, style(stage.id()).dim(), output.trim_end())
        }
        ExecutionEvent::StagePassed { stage, warnings } => {
            let mut line = format!("{} {}", CHECK, style(stage.title()).green());
            for warning in warnings {
                line.push_str(&format!("\n   {} {}", WARN, style(warning).yellow()));
            }
            line
        }
        ExecutionEvent::StageUnstable { stage, reason } => {
            format!("{} {}: {}", WARN, style(stage.title()).yellow(), style(reason).dim())
        }
        ExecutionEvent::StageFailed { stage, error } => {
            format!("{} {}: {}", CROSS, style(stage.title()).red(), style(error).dim())
        }
        ExecutionEvent::StageSkipped { stage, reason } => {
            format!("{} {} skipped ({})", INFO, style(stage.title()).dim(), reason)
        }
        ExecutionEvent::PipelineCompleted { execution_id, status } => format!(
            "{} Pipeline ({}) finished: {}",
            INFO,
            style(&execution_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format stage output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
