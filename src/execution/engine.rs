//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    core::{ExecutionStatus, Pipeline, Stage, StageKind, StageState},
    execution::{
        executor::{ExecutionResult, StageExecutor},
        runner::CommandRunner,
        scheduler::ExecutionScheduler,
    },
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Errors that stop the engine itself (as opposed to failing stages)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Stage '{0}' is not part of this pipeline")]
    StageNotFound(StageKind),

    #[error("Pipeline stuck - {0} stage(s) never reached a terminal state")]
    Stuck(usize),
}

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        branch: String,
        stages: Vec<StageKind>,
    },
    StageStarted {
        stage: StageKind,
        parallel: bool,
    },
    StageOutput {
        stage: StageKind,
        output: String,
    },
    StagePassed {
        stage: StageKind,
        warnings: Vec<String>,
    },
    StageUnstable {
        stage: StageKind,
        reason: String,
    },
    StageFailed {
        stage: StageKind,
        error: String,
    },
    StageSkipped {
        stage: StageKind,
        reason: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    scheduler: ExecutionScheduler,
    executor: Arc<StageExecutor<R>>,
    event_handlers: Vec<EventHandler>,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(),
            executor: Arc::new(StageExecutor::new(runner)),
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute the entire pipeline
    pub async fn execute(&self, pipeline: &mut Pipeline) -> Result<ExecutionStatus, EngineError> {
        let execution_id = pipeline.state.execution_id;

        info!(
            "Starting pipeline execution: {} on {} ({})",
            pipeline.name, pipeline.env.branch, execution_id
        );
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            branch: pipeline.env.branch.to_string(),
            stages: pipeline.execution_order(),
        });

        pipeline.state.start(pipeline.stages.len());
        let mut unstable = false;

        while let Some(batch) = self.scheduler.next_batch(pipeline) {
            let kinds = batch.stages();
            let parallel = kinds.len() > 1;

            let mut stages: Vec<Stage> = Vec::with_capacity(kinds.len());
            for kind in &kinds {
                let stage = pipeline
                    .stage_mut(*kind)
                    .ok_or(EngineError::StageNotFound(*kind))?;
                stage.state = StageState::Running { started_at: Utc::now() };
                stages.push(stage.clone());
                self.emit_event(ExecutionEvent::StageStarted { stage: *kind, parallel });
            }

            // siblings in a parallel batch always run to completion
            let context = &pipeline.context;
            let results = join_all(stages.iter().map(|stage| self.executor.execute(stage, context))).await;

            let mut aborted = false;
            for (kind, result) in kinds.iter().zip(results) {
                match self.record_result(pipeline, *kind, result)? {
                    ExecutionStatus::Failed => aborted = true,
                    ExecutionStatus::Unstable => unstable = true,
                    _ => {}
                }
            }

            if aborted {
                pipeline.state.status = ExecutionStatus::Failed;
                self.skip_remaining(pipeline);
            }
            pipeline.update_counts();
        }

        if !pipeline.is_complete() {
            let pending = pipeline.stages.iter().filter(|s| !s.state.is_terminal()).count();
            error!("No stages ready to run but {} not finished - pipeline stuck", pending);
            pipeline.state.finish(ExecutionStatus::Failed);
            return Err(EngineError::Stuck(pending));
        }

        let status = if pipeline.has_failed() {
            ExecutionStatus::Failed
        } else if unstable {
            ExecutionStatus::Unstable
        } else {
            ExecutionStatus::Completed
        };
        pipeline.update_counts();
        pipeline.state.finish(status);

        info!("Pipeline execution finished: {} - {:?}", pipeline.name, status);
        self.emit_event(ExecutionEvent::PipelineCompleted { execution_id, status });

        Ok(status)
    }

    /// Store a stage result; returns the effect it has on the run
    fn record_result(
        &self,
        pipeline: &mut Pipeline,
        kind: StageKind,
        result: ExecutionResult,
    ) -> Result<ExecutionStatus, EngineError> {
        let stage = pipeline.stage_mut(kind).ok_or(EngineError::StageNotFound(kind))?;
        let started_at = match &stage.state {
            StageState::Running { started_at } => *started_at,
            _ => Utc::now(),
        };
        let now = Utc::now();

        let effect = match result {
            ExecutionResult::Passed { output, warnings } => {
                stage.state = StageState::Passed {
                    output: output.clone(),
                    started_at,
                    completed_at: now,
                };
                if !output.trim().is_empty() {
                    self.emit_event(ExecutionEvent::StageOutput { stage: kind, output });
                }
                self.emit_event(ExecutionEvent::StagePassed { stage: kind, warnings });
                ExecutionStatus::Completed
            }
            ExecutionResult::Unstable { reason, output } => {
                stage.state = StageState::Unstable {
                    reason: reason.clone(),
                    started_at,
                    completed_at: now,
                };
                if !output.trim().is_empty() {
                    self.emit_event(ExecutionEvent::StageOutput { stage: kind, output });
                }
                self.emit_event(ExecutionEvent::StageUnstable { stage: kind, reason });
                ExecutionStatus::Unstable
            }
            ExecutionResult::Failed { error } => {
                error!("Stage {} failed: {}", kind, error);
                stage.state = StageState::Failed {
                    error: error.clone(),
                    started_at,
                    failed_at: now,
                };
                self.emit_event(ExecutionEvent::StageFailed { stage: kind, error });
                ExecutionStatus::Failed
            }
        };

        Ok(effect)
    }

    /// Mark every stage that has not run as skipped
    fn skip_remaining(&self, pipeline: &mut Pipeline) {
        let reason = "pipeline aborted by an earlier failure".to_string();
        for stage in pipeline.stages.iter_mut() {
            if matches!(stage.state, StageState::Pending) {
                warn!("Skipping stage {}", stage.kind);
                stage.state = StageState::Skipped { reason: reason.clone() };
                self.emit_event(ExecutionEvent::StageSkipped {
                    stage: stage.kind,
                    reason: reason.clone(),
                });
            }
        }
    }
}
