//! Built-in stage commands
//!
//! Used for any stage the pipeline file leaves empty. They shell out to the
//! same external tools the CI host provides: cargo, sonar-scanner, OWASP
//! dependency-check, trivy and docker.

use crate::core::stage::StageKind;

/// Waits for the compute-engine task of the analysis that just ran, then
/// checks the gate of that exact analysis
const QUALITY_GATE: &str = r#"task=$(sed -n 's/^ceTaskId=//p' "{{ app_dir }}/.scannerwork/report-task.txt")
[ -n "$task" ] || { echo "no ceTaskId in {{ app_dir }}/.scannerwork/report-task.txt" >&2; exit 1; }
while :; do
  ce=$(curl -sf -u "$SONAR_TOKEN:" "{{ sonar_url }}/api/ce/task?id=$task")
  case $(echo "$ce" | sed -n 's/.*"status":"\([A-Z_]*\)".*/\1/p') in
    SUCCESS) break ;;
    FAILED|CANCELED) echo "analysis task $task did not succeed" >&2; exit 1 ;;
  esac
  sleep 5
done
analysis=$(echo "$ce" | sed -n 's/.*"analysisId":"\([^"]*\)".*/\1/p')
gate=$(curl -sf -u "$SONAR_TOKEN:" "{{ sonar_url }}/api/qualitygates/project_status?analysisId=$analysis" | sed -n 's/.*"projectStatus":{"status":"\([A-Z]*\)".*/\1/p')
echo "Quality gate: ${gate:-unknown}"
[ "$gate" = OK ]"#;

/// Default commands for a stage
pub fn commands_for(kind: StageKind) -> Vec<String> {
    let commands: &[&str] = match kind {
        StageKind::Build => &["cargo build --release --locked"],
        StageKind::Test => &["cargo test --locked"],
        StageKind::StaticAnalysis => &[
            "sonar-scanner -Dsonar.projectKey={{ project }} -Dsonar.projectVersion={{ version }} -Dsonar.sources={{ app_dir }} -Dsonar.host.url={{ sonar_url }} -Dsonar.working.directory={{ app_dir }}/.scannerwork",
        ],
        StageKind::QualityGate => &[QUALITY_GATE],
        StageKind::DependencyScan => &[
            "mkdir -p {{ reports_dir }}/dependency-check",
            "dependency-check.sh --project {{ project }} --scan {{ app_dir }} --format ALL --out {{ reports_dir }}/dependency-check --failOnCVSS 7",
        ],
        StageKind::ContainerScan => &[
            "docker build -t {{ image }}:scan-{{ build_number }} {{ app_dir }}",
            "mkdir -p {{ reports_dir }}",
            "trivy image --exit-code 1 --severity {{ scan_severity }} --output {{ reports_dir }}/trivy-{{ build_number }}.txt {{ image }}:scan-{{ build_number }}",
        ],
        StageKind::ImageBuild => &[
            "docker build -t {{ image }}:{{ image_tag }} --build-arg VERSION={{ version }} {{ app_dir }}",
            "for t in {{ image_tags }}; do docker tag {{ image }}:{{ image_tag }} {{ image }}:$t; done",
        ],
        StageKind::ImagePush => &["for t in {{ image_tags }}; do docker push {{ image }}:$t || exit 1; done"],
        StageKind::ArtifactArchive => &[
            "mkdir -p {{ artifacts_dir }}",
            "tar -czf {{ artifacts_dir }}/{{ project }}-{{ version }}.tar.gz {{ reports_dir }}",
        ],
        StageKind::DeploymentInfo => &[
            "echo \"Branch:  {{ branch }}\"",
            "echo \"Build:   {{ build_number }}\"",
            "echo \"Version: {{ version }}\"",
            "for t in {{ image_tags }}; do echo \"Image:   {{ image }}:$t\"; done",
            "echo \"Pull:    docker pull {{ image }}:{{ image_tag }}\"",
        ],
    };

    commands.iter().map(|c| c.to_string()).collect()
}

/// Default lint commands for static analysis
pub fn lint_commands() -> Vec<String> {
    vec!["cargo clippy --all-targets".to_string()]
}
