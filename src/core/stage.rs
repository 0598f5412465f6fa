//! Stage domain model

use crate::core::state::StageState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The stages a pipeline run can contain, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    Build,
    Test,
    StaticAnalysis,
    QualityGate,
    DependencyScan,
    ContainerScan,
    ImageBuild,
    ImagePush,
    ArtifactArchive,
    DeploymentInfo,
}

impl StageKind {
    /// Every stage, in pipeline order
    pub const ALL: [StageKind; 10] = [
        StageKind::Build,
        StageKind::Test,
        StageKind::StaticAnalysis,
        StageKind::QualityGate,
        StageKind::DependencyScan,
        StageKind::ContainerScan,
        StageKind::ImageBuild,
        StageKind::ImagePush,
        StageKind::ArtifactArchive,
        StageKind::DeploymentInfo,
    ];

    /// Stable identifier used in configuration files and output
    pub fn id(&self) -> &'static str {
        match self {
            StageKind::Build => "build",
            StageKind::Test => "test",
            StageKind::StaticAnalysis => "static-analysis",
            StageKind::QualityGate => "quality-gate",
            StageKind::DependencyScan => "dependency-scan",
            StageKind::ContainerScan => "container-scan",
            StageKind::ImageBuild => "image-build",
            StageKind::ImagePush => "image-push",
            StageKind::ArtifactArchive => "artifact-archive",
            StageKind::DeploymentInfo => "deployment-info",
        }
    }

    /// Look up a stage by its identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.id() == id)
    }

    /// Human-readable stage name
    pub fn title(&self) -> &'static str {
        match self {
            StageKind::Build => "Build",
            StageKind::Test => "Test",
            StageKind::StaticAnalysis => "Static Analysis",
            StageKind::QualityGate => "Quality Gate",
            StageKind::DependencyScan => "Dependency Scan",
            StageKind::ContainerScan => "Container Scan",
            StageKind::ImageBuild => "Build Image",
            StageKind::ImagePush => "Push Image",
            StageKind::ArtifactArchive => "Archive Artifacts",
            StageKind::DeploymentInfo => "Deployment Info",
        }
    }

    /// Dependency and container scans run side by side
    pub fn is_security_scan(&self) -> bool {
        matches!(self, StageKind::DependencyScan | StageKind::ContainerScan)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// What a stage failure does to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Abort the pipeline
    Fatal,
    /// Keep going, but the run ends up unstable
    Unstable,
    /// Log a warning and keep going
    Ignore,
}

impl Default for FailureMode {
    fn default() -> Self {
        FailureMode::Fatal
    }
}

/// A single stage in a pipeline run
#[derive(Debug, Clone)]
pub struct Stage {
    pub kind: StageKind,

    /// Shell command templates, run in order
    pub commands: Vec<String>,

    /// Lint commands run ahead of `commands`; their failures are only logged
    pub lint_commands: Vec<String>,

    /// Effect of a failing command on the run
    pub failure_mode: FailureMode,

    /// Timeout in seconds for the whole stage
    pub timeout_secs: u64,

    /// Runtime state
    pub state: StageState,
}

impl Stage {
    pub fn new(kind: StageKind, commands: Vec<String>, failure_mode: FailureMode, timeout_secs: u64) -> Self {
        Stage {
            kind,
            commands,
            lint_commands: Vec::new(),
            failure_mode,
            timeout_secs,
            state: StageState::Pending,
        }
    }

    pub fn with_lint(mut self, lint_commands: Vec<String>) -> Self {
        self.lint_commands = lint_commands;
        self
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    /// Render every command with variable substitution
    pub fn render_commands(&self, variables: &HashMap<String, String>) -> Vec<String> {
        self.commands.iter().map(|c| render_template(c, variables)).collect()
    }

    pub fn render_lint_commands(&self, variables: &HashMap<String, String>) -> Vec<String> {
        self.lint_commands.iter().map(|c| render_template(c, variables)).collect()
    }
}

/// Replace `{{ name }}` placeholders with their values
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{ {} }}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }

    rendered
}
