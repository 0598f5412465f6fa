//! Branch-gated stage policy
//!
//! The policy decides which stages run for a branch and what a failure in
//! each of them does to the run. The built-in table is:
//!
//! | Stage                               | develop | test     | prod   |
//! |-------------------------------------|---------|----------|--------|
//! | build, test, static-analysis        | fatal   | fatal    | fatal  |
//! | quality-gate                        | -       | -        | fatal  |
//! | dependency-scan, container-scan     | -       | unstable | fatal  |
//! | image-build, image-push             | -       | fatal    | fatal  |
//! | artifact-archive                    | -       | fatal    | -      |
//! | deployment-info                     | -       | fatal    | fatal  |
//!
//! Branches other than the three above follow the `develop` row unless the
//! policy file gives them an `other` entry.

use crate::core::{
    branch::BranchKind,
    stage::{FailureMode, StageKind},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One stage enabled for a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRule {
    pub stage: StageKind,

    #[serde(default)]
    pub on_failure: FailureMode,
}

impl StageRule {
    pub fn new(stage: StageKind, on_failure: FailureMode) -> Self {
        Self { stage, on_failure }
    }

    fn fatal(stage: StageKind) -> Self {
        Self::new(stage, FailureMode::Fatal)
    }
}

/// Which stages run on which branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePolicy {
    pub develop: Vec<StageRule>,
    pub test: Vec<StageRule>,
    pub prod: Vec<StageRule>,

    /// Rules for unlisted branches (falls back to `develop`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<Vec<StageRule>>,
}

impl Default for StagePolicy {
    fn default() -> Self {
        use StageKind::*;

        let base = vec![
            StageRule::fatal(Build),
            StageRule::fatal(Test),
            StageRule::fatal(StaticAnalysis),
        ];

        let mut test = base.clone();
        test.extend([
            StageRule::new(DependencyScan, FailureMode::Unstable),
            StageRule::new(ContainerScan, FailureMode::Unstable),
            StageRule::fatal(ImageBuild),
            StageRule::fatal(ImagePush),
            StageRule::fatal(ArtifactArchive),
            StageRule::fatal(DeploymentInfo),
        ]);

        let mut prod = base.clone();
        prod.extend([
            StageRule::fatal(QualityGate),
            StageRule::fatal(DependencyScan),
            StageRule::fatal(ContainerScan),
            StageRule::fatal(ImageBuild),
            StageRule::fatal(ImagePush),
            StageRule::fatal(DeploymentInfo),
        ]);

        StagePolicy {
            develop: base,
            test,
            prod,
            other: None,
        }
    }
}

impl StagePolicy {
    /// Load a policy override from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a policy from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let policy: StagePolicy = serde_yaml::from_str(yaml)?;
        policy.validate()?;
        Ok(policy)
    }

    fn rules_for(&self, branch: &BranchKind) -> &[StageRule] {
        match branch {
            BranchKind::Develop => &self.develop,
            BranchKind::Test => &self.test,
            BranchKind::Prod => &self.prod,
            BranchKind::Other(_) => self.other.as_deref().unwrap_or(&self.develop),
        }
    }

    /// Stages to run for a branch, in pipeline order
    pub fn plan_for(&self, branch: &BranchKind) -> Vec<StageRule> {
        let mut rules = self.rules_for(branch).to_vec();
        rules.sort_by_key(|rule| rule.stage);
        rules
    }

    /// Whether a stage runs on a branch
    pub fn runs(&self, branch: &BranchKind, stage: StageKind) -> bool {
        self.rules_for(branch).iter().any(|rule| rule.stage == stage)
    }

    /// Failure mode of a stage on a branch, if the stage runs there
    pub fn failure_mode(&self, branch: &BranchKind, stage: StageKind) -> Option<FailureMode> {
        self.rules_for(branch)
            .iter()
            .find(|rule| rule.stage == stage)
            .map(|rule| rule.on_failure)
    }

    /// Validate every branch entry
    pub fn validate(&self) -> Result<()> {
        let mut entries = vec![
            ("develop", self.develop.as_slice()),
            ("test", self.test.as_slice()),
            ("prod", self.prod.as_slice()),
        ];
        if let Some(other) = &self.other {
            entries.push(("other", other.as_slice()));
        }

        for (branch, rules) in entries {
            let mut seen = HashSet::new();
            for rule in rules {
                if !seen.insert(rule.stage) {
                    anyhow::bail!("Branch '{}' lists stage '{}' more than once", branch, rule.stage);
                }
            }

            if !seen.contains(&StageKind::Build) {
                anyhow::bail!("Branch '{}' must run the 'build' stage", branch);
            }

            if seen.contains(&StageKind::ImagePush) && !seen.contains(&StageKind::ImageBuild) {
                anyhow::bail!(
                    "Branch '{}' pushes an image but never runs 'image-build'",
                    branch
                );
            }
        }

        Ok(())
    }
}
