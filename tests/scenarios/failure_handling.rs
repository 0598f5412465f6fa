//! Test: Failure Handling - fatal, unstable and ignored failures

use crate::helpers::*;
use stagegate::core::{ExecutionStatus, StageKind, StageState};
use stagegate::execution::ExecutionEvent;
use std::time::Duration;

#[tokio::test]
async fn test_lint_failure_is_only_a_warning() {
    let runner = MockRunner::new().fail_on("cargo clippy", 101);
    let result = run_branch("develop", 1, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert!(result.passed(StageKind::StaticAnalysis));
    // analysis still ran after the failed lint
    assert!(runner.ran("sonar-scanner"));

    let warnings = result.warnings_for(StageKind::StaticAnalysis);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("101"));
}

#[tokio::test]
async fn test_build_failure_skips_everything_after() {
    let runner = MockRunner::new().fail_on("cargo build", 1);
    let result = run_branch("test", 4, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.failed(StageKind::Build));
    for kind in result.planned().into_iter().skip(1) {
        assert!(result.skipped(kind), "{} should be skipped", kind);
    }
    assert!(!runner.ran("cargo test"));
    assert_eq!(result.pipeline.state.failed_stages, 1);
    assert_eq!(result.pipeline.state.skipped_stages, 8);
}

#[tokio::test]
async fn test_failed_quality_gate_aborts_prod() {
    let runner = MockRunner::new().fail_on("qualitygates", 1);
    let result = run_branch("prod", 8, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.failed(StageKind::QualityGate));
    assert!(result.skipped(StageKind::ImagePush));
    assert!(!runner.ran("docker push"));
}

#[tokio::test]
async fn test_quality_gate_timeout_is_unstable() {
    let yaml = format!("{}quality_gate_timeout_secs: 1\n", PIPELINE);
    let runner = MockRunner::new().delay_on("qualitygates", Duration::from_millis(1500));
    let result = run_pipeline(build_pipeline(&yaml, "prod", 8), runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Unstable);
    match result.state(StageKind::QualityGate) {
        Some(StageState::Unstable { reason, .. }) => assert!(reason.contains("Timeout")),
        other => panic!("expected unstable quality gate, got {:?}", other),
    }
    // the run carried on to publish
    assert!(result.passed(StageKind::ImagePush));
    assert!(runner.ran("docker push"));
}

#[tokio::test]
async fn test_failure_events_are_emitted() {
    let runner = MockRunner::new().fail_on("cargo test", 2);
    let result = run_branch("develop", 1, runner).await;

    assert!(result.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StageFailed { stage: StageKind::Test, error } if error.contains("code 2")
    )));
    assert!(result.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StageSkipped { stage: StageKind::StaticAnalysis, .. }
    )));
    assert!(matches!(
        result.events.last(),
        Some(ExecutionEvent::PipelineCompleted { status: ExecutionStatus::Failed, .. })
    ));
}
