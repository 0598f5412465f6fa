//! Test: Security Scans - the parallel scan batch

use crate::helpers::*;
use stagegate::core::{ExecutionStatus, StageKind};
use std::time::Duration;

#[tokio::test]
async fn test_scans_run_concurrently() {
    let runner = MockRunner::new()
        .delay_on("dependency-check.sh", Duration::from_millis(300))
        .delay_on("trivy image", Duration::from_millis(300));
    let result = run_branch("test", 2, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(runner.peak_concurrency(), 2);
}

#[tokio::test]
async fn test_scan_failure_on_test_is_unstable() {
    let runner = MockRunner::new().fail_on("trivy image", 1);
    let result = run_branch("test", 2, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Unstable);
    assert!(result.unstable(StageKind::ContainerScan));
    assert!(result.passed(StageKind::DependencyScan));
    assert!(result.passed(StageKind::ImagePush));
    assert_eq!(result.pipeline.state.unstable_stages, 1);
}

#[tokio::test]
async fn test_scan_failure_on_prod_is_fatal() {
    let runner = MockRunner::new()
        .fail_on("trivy image", 1)
        .delay_on("dependency-check.sh", Duration::from_millis(100));
    let result = run_branch("prod", 2, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.failed(StageKind::ContainerScan));
    // the sibling scan still finishes
    assert!(result.passed(StageKind::DependencyScan));
    assert!(result.skipped(StageKind::ImageBuild));
    assert!(!runner.ran("docker push"));
}

#[tokio::test]
async fn test_scan_severity_reaches_trivy() {
    let yaml = format!("{}scan_severity: \"CRITICAL\"\n", PIPELINE);
    let runner = MockRunner::new();
    run_pipeline(build_pipeline(&yaml, "test", 2), runner.clone()).await;

    let trivy = runner
        .commands()
        .into_iter()
        .find(|c| c.starts_with("trivy image"))
        .unwrap();
    assert!(trivy.contains("--severity CRITICAL"));
    assert!(trivy.contains("--exit-code 1"));
}
