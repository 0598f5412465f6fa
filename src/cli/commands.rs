//! CLI command definitions

use clap::{Args, Subcommand};

/// Print the stages a branch would run
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Branch name (refs/heads/ and origin/ prefixes are stripped)
    #[arg(short, long)]
    pub branch: String,

    /// Pipeline YAML file whose policy to use
    #[arg(short, long)]
    pub file: Option<String>,

    /// Standalone policy YAML file (wins over --file)
    #[arg(long)]
    pub policy: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Branch being built
    #[arg(short, long, env = "BRANCH_NAME")]
    pub branch: String,

    /// CI build number
    #[arg(short = 'n', long, env = "BUILD_NUMBER", default_value_t = 1)]
    pub build_number: u64,

    /// Variable overrides (key=value)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Working directory for stage commands
    #[arg(short, long)]
    pub workdir: Option<String>,

    /// Print commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Lines of stage output to show
    #[arg(long, default_value_t = 10)]
    pub output_lines: usize,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Prepare the host and start the platform services
#[derive(Debug, Args, Clone)]
pub struct SetupCommand {
    /// Setup YAML file (built-in defaults when omitted)
    #[arg(short, long)]
    pub file: Option<String>,

    /// Directory the data directories are created in
    #[arg(short, long, default_value = ".")]
    pub root: String,

    /// Stop after the port check
    #[arg(long)]
    pub no_start: bool,
}

/// Query the image registry
#[derive(Debug, Args, Clone)]
pub struct RegistryCommand {
    /// Registry address
    #[arg(short, long, env = "REGISTRY_URL", default_value = "localhost:5000")]
    pub url: String,

    #[command(subcommand)]
    pub action: RegistryAction,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum RegistryAction {
    /// List repositories
    Catalog,

    /// List the tags of one image
    Tags {
        /// Image name
        image: String,
    },
}

/// Run the demo HTTP service
#[derive(Debug, Args, Clone)]
pub struct ServeCommand {
    /// Port to listen on (falls back to PORT, then 3000)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
