//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    context::BuildContext,
    stage::{Stage, StageKind},
    state::{ExecutionStatus, PipelineState, StageState},
    tags::BuildEnv,
};

/// A pipeline run planned for one branch
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Ephemeral environment of this run
    pub env: BuildEnv,

    /// Stages selected by the branch policy, in execution order
    pub stages: Vec<Stage>,

    /// Variables and environment for stage commands
    pub context: BuildContext,

    /// Execution state
    pub state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline from configuration for the given run environment
    pub fn from_config(config: &PipelineConfig, env: BuildEnv) -> Self {
        let policy = config.policy();

        let stages = policy
            .plan_for(&env.branch)
            .into_iter()
            .map(|rule| {
                let stage = Stage::new(
                    rule.stage,
                    config.commands_for(rule.stage),
                    rule.on_failure,
                    config.timeout_for(rule.stage),
                );
                if rule.stage == StageKind::StaticAnalysis {
                    stage.with_lint(config.lint_commands())
                } else {
                    stage
                }
            })
            .collect();

        let mut context = BuildContext::new();
        context.variables.extend(env.variables());
        context.variables.extend(config.template_variables());
        context.env = env.env_vars();

        Pipeline {
            name: config.name.clone(),
            env,
            stages,
            context,
            state: PipelineState::new(),
        }
    }

    /// Get a stage by kind
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// Get a mutable stage by kind
    pub fn stage_mut(&mut self, kind: StageKind) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.kind == kind)
    }

    /// Stage kinds in execution order
    pub fn execution_order(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }

    /// Check if every stage reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.stages.iter().all(|s| s.state.is_terminal())
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// Recount stage states into the pipeline state
    pub fn update_counts(&mut self) {
        let mut passed = 0;
        let mut unstable = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for stage in &self.stages {
            match &stage.state {
                StageState::Passed { .. } => passed += 1,
                StageState::Unstable { .. } => unstable += 1,
                StageState::Failed { .. } => failed += 1,
                StageState::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }

        self.state.total_stages = self.stages.len();
        self.state.passed_stages = passed;
        self.state.unstable_stages = unstable;
        self.state.failed_stages = failed;
        self.state.skipped_stages = skipped;
    }
}
