//! Host bootstrap for the CI platform
//!
//! Runs the steps needed before the first pipeline can execute: check that
//! docker is available, create the data directories the services mount,
//! make sure no other process holds a service port, start the stack with
//! `docker compose` and poll every service until it answers.

use crate::execution::runner::CommandRunner;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Port conflict: {}", format_conflicts(.0))]
    PortConflict(Vec<(String, u16)>),

    #[error("Failed to create {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("docker compose failed: {0}")]
    Compose(String),

    #[error("{service} not ready after {attempts} attempts")]
    NotReady { service: String, attempts: u32 },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

fn format_conflicts(conflicts: &[(String, u16)]) -> String {
    conflicts
        .iter()
        .map(|(service, port)| format!("{} ({})", port, service))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A service of the platform stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCheck {
    pub name: String,
    pub port: u16,
    /// Path polled for readiness; any 2xx answer counts
    pub health_path: String,
}

impl ServiceCheck {
    fn new(name: &str, port: u16, health_path: &str) -> Self {
        Self {
            name: name.to_string(),
            port,
            health_path: health_path.to_string(),
        }
    }

    pub fn health_url(&self, host: &str) -> String {
        format!("http://{}:{}{}", host, self.port, self.health_path)
    }
}

/// Bootstrap configuration, loadable from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    #[serde(default = "default_compose_file")]
    pub compose_file: String,

    /// Host the readiness probes connect to
    #[serde(default = "default_host")]
    pub host: String,

    /// Directories created under the root before the stack starts
    #[serde(default = "default_directories")]
    pub directories: Vec<String>,

    #[serde(default = "default_services")]
    pub services: Vec<ServiceCheck>,

    #[serde(default = "default_attempts")]
    pub readiness_attempts: u32,

    #[serde(default = "default_interval_ms")]
    pub readiness_interval_ms: u64,
}

fn default_compose_file() -> String {
    "docker-compose.yml".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_directories() -> Vec<String> {
    [
        "jenkins_home",
        "sonarqube/data",
        "sonarqube/extensions",
        "registry/data",
        "prometheus/data",
        "grafana/data",
        "loki/data",
        "alertmanager/data",
        "reports",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

fn default_services() -> Vec<ServiceCheck> {
    vec![
        ServiceCheck::new("jenkins", 8080, "/login"),
        ServiceCheck::new("sonarqube", 9000, "/api/system/status"),
        ServiceCheck::new("registry", 5000, "/v2/"),
        ServiceCheck::new("prometheus", 9090, "/-/ready"),
        ServiceCheck::new("grafana", 3001, "/api/health"),
        ServiceCheck::new("loki", 3100, "/ready"),
        ServiceCheck::new("alertmanager", 9093, "/-/ready"),
    ]
}

fn default_attempts() -> u32 {
    30
}

fn default_interval_ms() -> u64 {
    5000
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            compose_file: default_compose_file(),
            host: default_host(),
            directories: default_directories(),
            services: default_services(),
            readiness_attempts: default_attempts(),
            readiness_interval_ms: default_interval_ms(),
        }
    }
}

impl SetupConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SetupConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut ports = std::collections::HashSet::new();
        for service in &self.services {
            if service.port == 0 {
                anyhow::bail!("Service '{}' has no port", service.name);
            }
            if !ports.insert(service.port) {
                anyhow::bail!("Port {} is assigned to more than one service", service.port);
            }
            if !service.health_path.starts_with('/') {
                anyhow::bail!("Health path of '{}' must start with '/'", service.name);
            }
        }
        if self.readiness_attempts == 0 {
            anyhow::bail!("readiness_attempts must be greater than zero");
        }
        Ok(())
    }
}

/// Executes the bootstrap steps
pub struct Bootstrap<R> {
    config: SetupConfig,
    root: PathBuf,
    runner: R,
    http: reqwest::Client,
}

impl<R: CommandRunner> Bootstrap<R> {
    pub fn new(config: SetupConfig, root: impl Into<PathBuf>, runner: R) -> Result<Self, SetupError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            config,
            root: root.into(),
            runner,
            http,
        })
    }

    pub fn config(&self) -> &SetupConfig {
        &self.config
    }

    /// Docker and the compose plugin must be installed
    pub async fn check_prerequisites(&self) -> Result<(), SetupError> {
        let checks = [
            ("command -v docker", "docker is not installed or not on PATH"),
            ("docker compose version", "the docker compose plugin is not available"),
            ("docker info", "the docker daemon is not running"),
        ];

        for (command, message) in checks {
            let output = self
                .runner
                .run(command, &[], None)
                .await
                .map_err(|e| SetupError::MissingPrerequisite(format!("{} ({})", message, e)))?;
            if !output.is_success() {
                return Err(SetupError::MissingPrerequisite(message.to_string()));
            }
            debug!("Prerequisite ok: {}", command);
        }

        Ok(())
    }

    /// Create every data directory; returns the paths created
    pub fn create_directories(&self) -> Result<Vec<PathBuf>, SetupError> {
        let mut created = Vec::new();
        for dir in &self.config.directories {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path).map_err(|source| SetupError::Directory {
                path: path.clone(),
                source,
            })?;
            info!("Directory ready: {}", path.display());
            created.push(path);
        }
        Ok(created)
    }

    /// Fail if any service port is already taken
    pub async fn check_ports(&self) -> Result<(), SetupError> {
        let mut conflicts = Vec::new();

        for service in &self.config.services {
            match tokio::net::TcpListener::bind(("0.0.0.0", service.port)).await {
                Ok(listener) => drop(listener),
                Err(e) => {
                    warn!("Port {} for {} is unavailable: {}", service.port, service.name, e);
                    conflicts.push((service.name.clone(), service.port));
                }
            }
        }

        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(SetupError::PortConflict(conflicts))
        }
    }

    /// `docker compose up -d`
    pub async fn start_services(&self) -> Result<(), SetupError> {
        let command = format!("docker compose -f {} up -d", self.config.compose_file);
        let root = self.root.to_string_lossy().into_owned();
        let output = self
            .runner
            .run(&command, &[], Some(&root))
            .await
            .map_err(|e| SetupError::Compose(e.to_string()))?;

        if !output.is_success() {
            return Err(SetupError::Compose(output.stderr.trim().to_string()));
        }
        Ok(())
    }

    /// Poll one service until it answers with 2xx
    pub async fn wait_ready(&self, service: &ServiceCheck) -> Result<(), SetupError> {
        let url = service.health_url(&self.config.host);
        let interval = Duration::from_millis(self.config.readiness_interval_ms);

        for attempt in 1..=self.config.readiness_attempts {
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("{} ready after {} attempt(s)", service.name, attempt);
                    return Ok(());
                }
                Ok(response) => debug!("{} answered {}", service.name, response.status()),
                Err(e) => debug!("{} not reachable yet: {}", service.name, e),
            }
            if attempt < self.config.readiness_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(SetupError::NotReady {
            service: service.name.clone(),
            attempts: self.config.readiness_attempts,
        })
    }
}
