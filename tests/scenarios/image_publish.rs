//! Test: Image Publish - tags, versions and the environment of stage commands

use crate::helpers::*;
use stagegate::core::{ExecutionStatus, StageKind, StageState};

fn push_command(runner: &MockRunner) -> String {
    runner
        .commands()
        .into_iter()
        .find(|c| c.contains("docker push"))
        .unwrap()
}

#[tokio::test]
async fn test_test_branch_pushes_build_tag() {
    let runner = MockRunner::new();
    run_branch("test", 42, runner.clone()).await;

    let push = push_command(&runner);
    assert!(push.starts_with("for t in test-42; do docker push localhost:5000/demo-app:$t"));

    let invocation = runner
        .invocations()
        .into_iter()
        .find(|i| i.command.contains("docker push"))
        .unwrap();
    assert_eq!(invocation.env_var("IMAGE_TAG"), Some("test-42"));
    assert_eq!(invocation.env_var("BUILD_NUMBER"), Some("42"));
    assert_eq!(invocation.env_var("BRANCH_NAME"), Some("test"));
}

#[tokio::test]
async fn test_prod_pushes_version_latest_and_timestamp() {
    let yaml = format!("{}version: \"2.3.0\"\n", PIPELINE);
    let runner = MockRunner::new();
    let result = run_pipeline(build_pipeline(&yaml, "prod", 5), runner.clone()).await;
    assert_eq!(result.status, ExecutionStatus::Completed);

    let push = push_command(&runner);
    assert!(push.contains("for t in prod-2.3.0 latest prod-"));
    assert!(runner.ran("docker build -t localhost:5000/demo-app:prod-2.3.0"));
    assert!(runner.ran("docker tag localhost:5000/demo-app:prod-2.3.0 localhost:5000/demo-app:$t"));
}

#[tokio::test]
async fn test_prod_version_defaults_to_build_number() {
    let runner = MockRunner::new();
    run_branch("prod", 77, runner.clone()).await;

    assert!(push_command(&runner).contains("prod-1.0.77 latest"));
    let invocation = runner.invocations().into_iter().next().unwrap();
    assert_eq!(invocation.env_var("VERSION"), Some("1.0.77"));
}

#[tokio::test]
async fn test_command_line_override_wins() {
    let mut pipeline = build_pipeline(PIPELINE, "develop", 1);
    pipeline
        .context
        .set_override("sonar_url".to_string(), "http://sonar.internal:9000".to_string());

    let runner = MockRunner::new();
    run_pipeline(pipeline, runner.clone()).await;

    assert!(runner.ran("-Dsonar.host.url=http://sonar.internal:9000"));
}

#[tokio::test]
async fn test_deployment_info_output_is_captured() {
    let runner = MockRunner::new();
    let result = run_branch("test", 6, runner).await;

    match result.state(StageKind::DeploymentInfo) {
        Some(StageState::Passed { output, .. }) => {
            assert!(output.contains("docker pull localhost:5000/demo-app:test-6"));
        }
        other => panic!("expected deployment info to pass, got {:?}", other),
    }
}
