//! Test: Branch Policy - which stages each branch runs

use crate::helpers::*;
use stagegate::core::{ExecutionStatus, StageKind};

#[tokio::test]
async fn test_develop_runs_build_test_and_analysis_only() {
    let runner = MockRunner::new();
    let result = run_branch("develop", 7, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(
        result.planned(),
        vec![StageKind::Build, StageKind::Test, StageKind::StaticAnalysis]
    );
    assert!(runner.ran("cargo build"));
    assert!(runner.ran("cargo clippy"));
    assert!(runner.ran("sonar-scanner"));
    assert!(!runner.ran("docker"));
    assert!(!runner.ran("trivy"));
}

#[tokio::test]
async fn test_test_branch_scans_publishes_and_archives() {
    let runner = MockRunner::new();
    let result = run_branch("test", 12, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    let planned = result.planned();
    assert!(!planned.contains(&StageKind::QualityGate));
    for kind in [
        StageKind::DependencyScan,
        StageKind::ContainerScan,
        StageKind::ImageBuild,
        StageKind::ImagePush,
        StageKind::ArtifactArchive,
        StageKind::DeploymentInfo,
    ] {
        assert!(planned.contains(&kind), "{} should run on test", kind);
        assert!(result.passed(kind));
    }
    assert!(runner.ran("tar -czf"));
}

#[tokio::test]
async fn test_prod_gates_on_quality_and_skips_archive() {
    let runner = MockRunner::new();
    let result = run_branch("prod", 3, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    let planned = result.planned();
    assert!(planned.contains(&StageKind::QualityGate));
    assert!(!planned.contains(&StageKind::ArtifactArchive));
    assert!(runner.ran("api/qualitygates/project_status"));
    assert!(!runner.ran("tar -czf"));
}

#[tokio::test]
async fn test_ref_prefixes_are_stripped() {
    let result = run_branch("refs/heads/prod", 1, MockRunner::new()).await;
    assert!(result.planned().contains(&StageKind::QualityGate));

    let result = run_branch("origin/test", 1, MockRunner::new()).await;
    assert!(result.planned().contains(&StageKind::ArtifactArchive));
}

#[tokio::test]
async fn test_feature_branch_follows_develop() {
    let runner = MockRunner::new();
    let result = run_branch("feature/login", 5, runner.clone()).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.planned().len(), 3);
    assert!(!runner.ran("docker push"));
}

#[tokio::test]
async fn test_stages_run_in_pipeline_order() {
    let runner = MockRunner::new();
    run_branch("prod", 9, runner.clone()).await;

    let commands = runner.commands();
    let position = |pattern: &str| commands.iter().position(|c| c.contains(pattern)).unwrap();

    assert!(position("cargo build") < position("cargo test"));
    assert!(position("cargo test") < position("sonar-scanner"));
    assert!(position("sonar-scanner") < position("qualitygates"));
    assert!(position("qualitygates") < position("trivy image"));
    assert!(position("trivy image") < position("docker push"));
    assert!(position("docker push") < position("docker pull"));
}

#[tokio::test]
async fn test_policy_override_from_pipeline_file() {
    let yaml = r#"
name: "demo-app"
image: "demo-app"
policy:
  develop:
    - stage: build
    - stage: test
    - stage: container-scan
      on_failure: ignore
  test:
    - stage: build
  prod:
    - stage: build
    - stage: image-build
    - stage: image-push
"#;
    let runner = MockRunner::new().fail_on("trivy image", 1);
    let result = run_pipeline(build_pipeline(yaml, "develop", 1), runner).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(
        result.planned(),
        vec![StageKind::Build, StageKind::Test, StageKind::ContainerScan]
    );
    assert_eq!(result.warnings_for(StageKind::ContainerScan).len(), 1);
}
