//! Pipeline configuration from YAML

use crate::core::{
    defaults,
    policy::StagePolicy,
    stage::StageKind,
    tags::BuildEnv,
    Pipeline,
};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Severities trivy understands
const SEVERITIES: [&str; 5] = ["UNKNOWN", "LOW", "MEDIUM", "HIGH", "CRITICAL"];

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, also used as the project key
    pub name: String,

    /// Release version; derived from the build number when absent
    #[serde(default)]
    pub version: Option<String>,

    /// Image name, without registry or tag
    pub image: String,

    /// Registry host the images are pushed to (empty = local only)
    #[serde(default)]
    pub registry: String,

    /// Directory holding the application under build
    #[serde(default = "default_app_dir")]
    pub app_dir: String,

    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,

    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,

    #[serde(default = "default_sonar_url")]
    pub sonar_url: String,

    /// How long to wait for the quality gate verdict
    #[serde(default = "default_quality_gate_timeout")]
    pub quality_gate_timeout_secs: u64,

    /// Comma-separated severities that fail a container scan
    #[serde(default = "default_scan_severity")]
    pub scan_severity: String,

    /// Timeout for every other stage (in seconds)
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,

    /// Extra template variables
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Per-stage command overrides
    #[serde(default)]
    pub stages: BTreeMap<StageKind, StageConfig>,

    /// Branch policy override
    #[serde(default)]
    pub policy: Option<StagePolicy>,
}

/// Commands for one stage, either a bare list or a detailed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageConfig {
    Commands(Vec<String>),
    Detailed {
        #[serde(default)]
        commands: Vec<String>,

        /// Lint commands (static analysis only); failures are only logged
        #[serde(default)]
        lint: Option<Vec<String>>,

        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl StageConfig {
    pub fn commands(&self) -> &[String] {
        match self {
            StageConfig::Commands(commands) => commands,
            StageConfig::Detailed { commands, .. } => commands,
        }
    }

    pub fn lint(&self) -> Option<&[String]> {
        match self {
            StageConfig::Commands(_) => None,
            StageConfig::Detailed { lint, .. } => lint.as_deref(),
        }
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            StageConfig::Commands(_) => None,
            StageConfig::Detailed { timeout_secs, .. } => *timeout_secs,
        }
    }
}

fn default_app_dir() -> String {
    ".".to_string()
}

fn default_reports_dir() -> String {
    "reports".to_string()
}

fn default_artifacts_dir() -> String {
    "artifacts".to_string()
}

fn default_sonar_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_quality_gate_timeout() -> u64 {
    600
}

fn default_scan_severity() -> String {
    "HIGH,CRITICAL".to_string()
}

fn default_timeout() -> u64 {
    1800
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        let image_re = Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$")?;
        if !image_re.is_match(&self.image) {
            anyhow::bail!("Invalid image name: '{}'", self.image);
        }

        if self.default_timeout_secs == 0 {
            anyhow::bail!("default_timeout_secs must be greater than zero");
        }
        if self.quality_gate_timeout_secs == 0 {
            anyhow::bail!("quality_gate_timeout_secs must be greater than zero");
        }

        let severities: Vec<&str> = self
            .scan_severity
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if severities.is_empty() {
            anyhow::bail!("scan_severity must list at least one severity");
        }
        for severity in severities {
            if !SEVERITIES.contains(&severity) {
                anyhow::bail!(
                    "Unknown scan severity '{}' (expected one of {})",
                    severity,
                    SEVERITIES.join(", ")
                );
            }
        }

        for (kind, stage) in &self.stages {
            if stage.timeout_secs() == Some(0) {
                anyhow::bail!("Stage '{}' has a zero timeout", kind);
            }
            if stage.lint().is_some() && *kind != StageKind::StaticAnalysis {
                anyhow::bail!("Stage '{}' cannot define lint commands", kind);
            }
        }

        if let Some(policy) = &self.policy {
            policy.validate()?;
        }

        Ok(())
    }

    /// The policy in effect: the configured one or the built-in table
    pub fn policy(&self) -> StagePolicy {
        self.policy.clone().unwrap_or_default()
    }

    /// Commands for a stage, falling back to the built-in ones
    pub fn commands_for(&self, kind: StageKind) -> Vec<String> {
        match self.stages.get(&kind) {
            Some(stage) if !stage.commands().is_empty() => stage.commands().to_vec(),
            _ => defaults::commands_for(kind),
        }
    }

    /// Lint commands run ahead of static analysis
    pub fn lint_commands(&self) -> Vec<String> {
        self.stages
            .get(&StageKind::StaticAnalysis)
            .and_then(|stage| stage.lint())
            .map(|lint| lint.to_vec())
            .unwrap_or_else(defaults::lint_commands)
    }

    /// Timeout for a stage
    pub fn timeout_for(&self, kind: StageKind) -> u64 {
        if let Some(timeout) = self.stages.get(&kind).and_then(|s| s.timeout_secs()) {
            return timeout;
        }
        match kind {
            StageKind::QualityGate => self.quality_gate_timeout_secs,
            _ => self.default_timeout_secs,
        }
    }

    /// Template variables contributed by the configuration
    pub fn template_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("project".to_string(), self.name.clone());
        vars.insert("app_dir".to_string(), self.app_dir.clone());
        vars.insert("reports_dir".to_string(), self.reports_dir.clone());
        vars.insert("artifacts_dir".to_string(), self.artifacts_dir.clone());
        vars.insert("sonar_url".to_string(), self.sonar_url.clone());
        vars.insert("scan_severity".to_string(), self.scan_severity.clone());
        vars.extend(self.variables.clone());
        vars
    }

    /// Build the run environment for a branch and build number
    pub fn build_env(&self, branch: &str, build_number: u64) -> BuildEnv {
        BuildEnv::new(
            crate::core::BranchKind::parse(branch),
            build_number,
            &self.image,
            &self.registry,
        )
        .with_version(self.version.as_deref())
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self, env: BuildEnv) -> Pipeline {
        Pipeline::from_config(self, env)
    }
}
