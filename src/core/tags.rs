//! Per-run build environment and image tag derivation

use crate::core::branch::BranchKind;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Format of the `prod-{timestamp}` tag
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Docker tags are at most 128 characters of `[A-Za-z0-9_.-]`, not starting with `.` or `-`
const MAX_TAG_LEN: usize = 128;

fn invalid_tag_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap())
}

/// Make an arbitrary string usable as an image tag
pub fn sanitize_tag(raw: &str) -> String {
    let cleaned = invalid_tag_chars().replace_all(raw, "-");
    let trimmed = cleaned.trim_start_matches(['.', '-']);
    trimmed.chars().take(MAX_TAG_LEN).collect()
}

/// Ephemeral environment of a single pipeline run
#[derive(Debug, Clone)]
pub struct BuildEnv {
    pub branch: BranchKind,
    pub build_number: u64,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub image_name: String,
    pub registry: String,
}

impl BuildEnv {
    /// Create the environment for a run started now
    pub fn new(branch: BranchKind, build_number: u64, image_name: &str, registry: &str) -> Self {
        Self {
            branch,
            build_number,
            version: default_version(build_number),
            timestamp: Utc::now(),
            image_name: image_name.to_string(),
            registry: registry.trim_end_matches('/').to_string(),
        }
    }

    /// Use a configured version instead of the derived one
    pub fn with_version(mut self, version: Option<&str>) -> Self {
        if let Some(version) = version {
            self.version = version.to_string();
        }
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Tags pushed for this run's branch
    pub fn image_tags(&self) -> Vec<String> {
        match self.branch {
            BranchKind::Test => vec![sanitize_tag(&format!("test-{}", self.build_number))],
            BranchKind::Prod => vec![
                sanitize_tag(&format!("prod-{}", self.version)),
                "latest".to_string(),
                format!("prod-{}", self.timestamp.format(TIMESTAMP_FORMAT)),
            ],
            _ => Vec::new(),
        }
    }

    /// Repository reference without a tag
    pub fn image_repository(&self) -> String {
        if self.registry.is_empty() {
            self.image_name.clone()
        } else {
            format!("{}/{}", self.registry, self.image_name)
        }
    }

    /// Full image reference for a tag
    pub fn image_ref(&self, tag: &str) -> String {
        format!("{}:{}", self.image_repository(), tag)
    }

    /// Tag used for the primary image of the run; branches without pushed
    /// images get a local `build-{n}` tag
    pub fn primary_tag(&self) -> String {
        self.image_tags()
            .into_iter()
            .next()
            .unwrap_or_else(|| format!("build-{}", self.build_number))
    }

    /// Variables available to stage command templates
    pub fn variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("branch".to_string(), self.branch.name().to_string());
        vars.insert("build_number".to_string(), self.build_number.to_string());
        vars.insert("version".to_string(), self.version.clone());
        vars.insert(
            "timestamp".to_string(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        );
        vars.insert("image".to_string(), self.image_repository());
        vars.insert("image_name".to_string(), self.image_name.clone());
        vars.insert("image_tag".to_string(), self.primary_tag());
        vars.insert("image_tags".to_string(), self.image_tags().join(" "));
        vars.insert("registry".to_string(), self.registry.clone());
        vars
    }

    /// Environment variables exported to every stage command
    pub fn env_vars(&self) -> Vec<(String, String)> {
        vec![
            ("BRANCH_NAME".to_string(), self.branch.name().to_string()),
            ("BUILD_NUMBER".to_string(), self.build_number.to_string()),
            ("VERSION".to_string(), self.version.clone()),
            ("IMAGE_TAG".to_string(), self.primary_tag()),
        ]
    }
}

fn default_version(build_number: u64) -> String {
    format!("1.0.{}", build_number)
}
