//! Stage executor - runs the commands of a single stage

use crate::{
    core::{BuildContext, FailureMode, Stage, StageKind},
    execution::runner::CommandRunner,
};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Result of executing a stage, after its failure mode was applied
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Stage passed; `warnings` holds ignored failures (lint and the like)
    Passed {
        output: String,
        warnings: Vec<String>,
    },
    /// Stage failed but the run continues as unstable
    Unstable {
        reason: String,
        output: String,
    },
    /// Stage failed and the run must stop
    Failed {
        error: String,
    },
}

/// Raw outcome of running the commands
#[derive(Debug, Clone, PartialEq)]
enum StageOutcome {
    Succeeded(String),
    CommandFailed { error: String, output: String },
    TimedOut { output: String },
}

/// Executes a single stage
pub struct StageExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> StageExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Execute a stage and return the result
    pub async fn execute(&self, stage: &Stage, context: &BuildContext) -> ExecutionResult {
        info!("Executing stage: {}", stage.id());

        let duration = Duration::from_secs(stage.timeout_secs);
        let mut warnings = Vec::new();
        let lint_output = self.run_lint(stage, context, duration, &mut warnings).await;

        let outcome = match timeout(duration, self.run_commands(stage, context, lint_output)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Timeout for stage {} after {}s", stage.id(), stage.timeout_secs);
                StageOutcome::TimedOut { output: String::new() }
            }
        };

        self.apply_failure_mode(stage, outcome, warnings)
    }

    /// Lint runs under its own time budget; nothing it does can fail the stage
    async fn run_lint(
        &self,
        stage: &Stage,
        context: &BuildContext,
        budget: Duration,
        warnings: &mut Vec<String>,
    ) -> String {
        let vars = context.get_rendering_variables();
        let workdir = context.workdir.as_deref();
        let mut output = String::new();

        for command in stage.render_lint_commands(&vars) {
            match timeout(budget, self.runner.run(&command, &context.env, workdir)).await {
                Ok(Ok(result)) if result.is_success() => output.push_str(&result.stdout),
                Ok(Ok(result)) => {
                    warn!("Lint command '{}' failed with code {} (ignored)", command, result.exit_code);
                    warnings.push(format!("lint '{}' exited with code {}", command, result.exit_code));
                }
                Ok(Err(e)) => {
                    warn!("Lint command '{}' could not run: {} (ignored)", command, e);
                    warnings.push(format!("lint '{}' could not run: {}", command, e));
                }
                Err(_) => {
                    warn!("Lint command '{}' timed out after {}s (ignored)", command, budget.as_secs());
                    warnings.push(format!("lint '{}' timed out after {}s", command, budget.as_secs()));
                }
            }
        }

        output
    }

    async fn run_commands(&self, stage: &Stage, context: &BuildContext, mut output: String) -> StageOutcome {
        let vars = context.get_rendering_variables();
        let workdir = context.workdir.as_deref();

        for command in stage.render_commands(&vars) {
            debug!("Stage {} running: {}", stage.id(), command);
            match self.runner.run(&command, &context.env, workdir).await {
                Ok(result) if result.is_success() => output.push_str(&result.stdout),
                Ok(result) => {
                    output.push_str(&result.stdout);
                    let detail = result.stderr.trim();
                    let error = if detail.is_empty() {
                        format!("'{}' exited with code {}", command, result.exit_code)
                    } else {
                        format!("'{}' exited with code {}: {}", command, result.exit_code, detail)
                    };
                    return StageOutcome::CommandFailed { error, output };
                }
                Err(e) => {
                    return StageOutcome::CommandFailed {
                        error: e.to_string(),
                        output,
                    };
                }
            }
        }

        StageOutcome::Succeeded(output)
    }

    fn apply_failure_mode(
        &self,
        stage: &Stage,
        outcome: StageOutcome,
        mut warnings: Vec<String>,
    ) -> ExecutionResult {
        let (reason, output, timed_out) = match outcome {
            StageOutcome::Succeeded(output) => {
                info!("Stage {} passed", stage.id());
                return ExecutionResult::Passed { output, warnings };
            }
            StageOutcome::CommandFailed { error, output } => (error, output, false),
            StageOutcome::TimedOut { output } => (
                format!("Timeout after {} seconds", stage.timeout_secs),
                output,
                true,
            ),
        };

        // an expired quality gate wait never fails the run
        let mode = if timed_out && stage.kind == StageKind::QualityGate {
            FailureMode::Unstable
        } else {
            stage.failure_mode
        };

        match mode {
            FailureMode::Fatal => ExecutionResult::Failed { error: reason },
            FailureMode::Unstable => {
                warn!("Stage {} marked unstable: {}", stage.id(), reason);
                ExecutionResult::Unstable { reason, output }
            }
            FailureMode::Ignore => {
                warn!("Stage {} failed (ignored): {}", stage.id(), reason);
                warnings.push(reason);
                ExecutionResult::Passed { output, warnings }
            }
        }
    }
}
