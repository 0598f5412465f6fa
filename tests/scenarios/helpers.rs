//! Test utilities for stagegate scenarios

use async_trait::async_trait;
use stagegate::core::config::PipelineConfig;
use stagegate::core::{ExecutionStatus, Pipeline, StageKind, StageState};
use stagegate::execution::{CommandOutput, CommandRunner, ExecutionEngine, ExecutionEvent, RunnerError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A command the mock runner saw
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: String,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

struct Rule {
    pattern: String,
    exit_code: i32,
    delay: Option<Duration>,
}

/// Scripted runner: every command passes unless a rule matches a substring
#[derive(Clone, Default)]
pub struct MockRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` exit with `exit_code`
    pub fn fail_on(self, pattern: &str, exit_code: i32) -> Self {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            exit_code,
            delay: None,
        });
        self
    }

    /// Commands containing `pattern` take `delay` and then pass
    pub fn delay_on(self, pattern: &str, delay: Duration) -> Self {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            exit_code: 0,
            delay: Some(delay),
        });
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.command).collect()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.commands().iter().any(|c| c.contains(pattern))
    }

    /// Highest number of commands that were running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        command: &str,
        env: &[(String, String)],
        _workdir: Option<&str>,
    ) -> Result<CommandOutput, RunnerError> {
        self.invocations.lock().unwrap().push(Invocation {
            command: command.to_string(),
            env: env.to_vec(),
        });

        let (exit_code, delay) = {
            let rules = self.rules.lock().unwrap();
            match rules.iter().find(|r| command.contains(&r.pattern)) {
                Some(rule) => (rule.exit_code, rule.delay),
                None => (0, None),
            }
        };

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if exit_code == 0 {
            Ok(CommandOutput::success(format!("ok: {}\n", command)))
        } else {
            Ok(CommandOutput::failure(exit_code, format!("{} failed", command)))
        }
    }
}

pub const PIPELINE: &str = r#"
name: "demo-app"
image: "demo-app"
registry: "localhost:5000"
"#;

/// Outcome of one scenario run
pub struct ScenarioResult {
    pub status: ExecutionStatus,
    pub pipeline: Pipeline,
    pub events: Vec<ExecutionEvent>,
}

impl ScenarioResult {
    pub fn state(&self, kind: StageKind) -> Option<&StageState> {
        self.pipeline.stage(kind).map(|s| &s.state)
    }

    pub fn passed(&self, kind: StageKind) -> bool {
        matches!(self.state(kind), Some(StageState::Passed { .. }))
    }

    pub fn skipped(&self, kind: StageKind) -> bool {
        matches!(self.state(kind), Some(StageState::Skipped { .. }))
    }

    pub fn unstable(&self, kind: StageKind) -> bool {
        matches!(self.state(kind), Some(StageState::Unstable { .. }))
    }

    pub fn failed(&self, kind: StageKind) -> bool {
        matches!(self.state(kind), Some(StageState::Failed { .. }))
    }

    pub fn planned(&self) -> Vec<StageKind> {
        self.pipeline.execution_order()
    }

    pub fn warnings_for(&self, kind: StageKind) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::StagePassed { stage, warnings } if *stage == kind => Some(warnings.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

pub fn build_pipeline(yaml: &str, branch: &str, build_number: u64) -> Pipeline {
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let env = config.build_env(branch, build_number);
    config.to_pipeline(env)
}

pub async fn run_pipeline(pipeline: Pipeline, runner: MockRunner) -> ScenarioResult {
    let mut pipeline = pipeline;
    let mut engine = ExecutionEngine::new(runner);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let status = engine.execute(&mut pipeline).await.unwrap();
    let events = events.lock().unwrap().clone();

    ScenarioResult {
        status,
        pipeline,
        events,
    }
}

pub async fn run_branch(branch: &str, build_number: u64, runner: MockRunner) -> ScenarioResult {
    run_pipeline(build_pipeline(PIPELINE, branch, build_number), runner).await
}
