use anyhow::{Context, Result};
use stagegate::cli::commands::{
    PlanCommand, RegistryAction, RegistryCommand, RunCommand, ServeCommand, SetupCommand,
    ValidateCommand,
};
use stagegate::cli::output::*;
use stagegate::cli::{Cli, Command};
use stagegate::core::{config::PipelineConfig, BranchKind, ExecutionStatus, Pipeline, StagePolicy};
use stagegate::execution::{CommandRunner, DryRunRunner, ExecutionEngine, ExecutionEvent, ShellRunner};
use stagegate::registry::RegistryClient;
use stagegate::setup::{Bootstrap, SetupConfig};
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Plan(cmd) => show_plan(cmd)?,
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Setup(cmd) => setup_host(cmd).await?,
        Command::Registry(cmd) => query_registry(cmd).await?,
        Command::Serve(cmd) => serve_demo(cmd).await?,
    }

    Ok(())
}

fn show_plan(cmd: &PlanCommand) -> Result<()> {
    let policy = match (&cmd.policy, &cmd.file) {
        (Some(path), _) => StagePolicy::from_file(path)
            .with_context(|| format!("Failed to load policy file {}", path))?,
        (None, Some(path)) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load pipeline config {}", path))?
            .policy(),
        (None, None) => StagePolicy::default(),
    };

    let branch = BranchKind::parse(&cmd.branch);
    let plan = policy.plan_for(&branch);

    if cmd.json {
        let data = serde_json::json!({
            "branch": branch.name(),
            "known_branch": branch.is_known(),
            "stages": plan,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Stage plan for {}", INFO, style(branch.name()).bold());
    if !branch.is_known() {
        println!(
            "{} '{}' is not develop, test or prod; using the develop stages",
            WARN,
            branch.name()
        );
    }
    for (index, rule) in plan.iter().enumerate() {
        println!("{}", format_plan_entry(index, rule));
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let env = config.build_env(&cmd.branch, cmd.build_number);
    let tags = env.image_tags();
    let mut pipeline = config.to_pipeline(env);

    for (key, value) in &cmd.variable {
        pipeline.context.set_override(key.clone(), value.clone());
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
    pipeline.context.workdir = cmd.workdir.clone();

    if !tags.is_empty() {
        println!("{} Image tags: {}", INFO, style(tags.join(", ")).cyan());
    }

    let status = if cmd.dry_run {
        println!("{} Dry run: commands are printed, not executed", WARN);
        execute(DryRunRunner, &mut pipeline, cmd.output_lines).await?
    } else {
        execute(ShellRunner::new(), &mut pipeline, cmd.output_lines).await?
    };

    println!("\n{} Stage summary:", INFO);
    for stage in &pipeline.stages {
        println!("{}", format_stage_summary(stage));
    }

    println!();
    match status {
        ExecutionStatus::Completed => println!(
            "{} {} completed {}",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green()
        ),
        ExecutionStatus::Unstable => println!(
            "{} {} finished {} ({} unstable stage(s))",
            WARN,
            style(&pipeline.name).bold(),
            style("unstable").yellow(),
            pipeline.state.unstable_stages
        ),
        _ => {
            println!("{} {} {}", CROSS, style(&pipeline.name).bold(), style("failed").red());
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn execute<R: CommandRunner + 'static>(
    runner: R,
    pipeline: &mut Pipeline,
    output_lines: usize,
) -> Result<ExecutionStatus> {
    let mut engine = ExecutionEngine::new(runner);

    engine.add_event_handler(move |event| {
        match &event {
            ExecutionEvent::StageStarted { parallel: false, .. } => println!("{}", style(separator()).dim()),
            ExecutionEvent::StageOutput { stage, output } => {
                println!("{} Output from {}:", INFO, style(stage.id()).dim());
                println!("{}", format_output(output.trim_end(), output_lines));
                return;
            }
            _ => {}
        }
        println!("{}", format_execution_event(&event));
    });

    println!();
    let status = engine.execute(pipeline).await.map_err(|e| {
        error!("{}", e);
        e
    })?;

    Ok(status)
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let policy = config.policy();
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Image: {}", style(&config.image).cyan());
            for branch in [BranchKind::Develop, BranchKind::Test, BranchKind::Prod] {
                println!(
                    "  Stages on {}: {}",
                    branch,
                    style(policy.plan_for(&branch).len()).cyan()
                );
            }
            println!("  Variables: {}", style(config.variables.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn setup_host(cmd: &SetupCommand) -> Result<()> {
    let config = match &cmd.file {
        Some(path) => SetupConfig::from_file(path)
            .with_context(|| format!("Failed to load setup file {}", path))?,
        None => SetupConfig::default(),
    };
    let bootstrap = Bootstrap::new(config, &cmd.root, ShellRunner::new())?;

    println!("{} Checking prerequisites...", INFO);
    if let Err(e) = bootstrap.check_prerequisites().await {
        abort_setup(e);
    }
    println!("{} docker and docker compose available", CHECK);

    println!("{} Creating data directories...", INFO);
    match bootstrap.create_directories() {
        Ok(created) => println!("{} {} directories ready under {}", CHECK, created.len(), cmd.root),
        Err(e) => abort_setup(e),
    }

    println!("{} Checking ports...", INFO);
    if let Err(e) = bootstrap.check_ports().await {
        abort_setup(e);
    }
    println!("{} All service ports are free", CHECK);

    if cmd.no_start {
        println!("{} --no-start given; services not started", INFO);
        return Ok(());
    }

    println!("{} Starting services...", ROCKET);
    if let Err(e) = bootstrap.start_services().await {
        abort_setup(e);
    }

    let mut not_ready = Vec::new();
    for service in &bootstrap.config().services {
        let spinner = create_spinner(format!("Waiting for {}", service.name));
        let result = bootstrap.wait_ready(service).await;
        spinner.finish_and_clear();

        match result {
            Ok(()) => println!(
                "{} {} ready at {}",
                CHECK,
                style(&service.name).bold(),
                style(service.health_url(&bootstrap.config().host)).dim()
            ),
            Err(e) => {
                println!("{} {}", CROSS, style(&e).red());
                not_ready.push(service.name.clone());
            }
        }
    }

    if !not_ready.is_empty() {
        println!("{} Services not ready: {}", CROSS, not_ready.join(", "));
        std::process::exit(1);
    }

    println!("\n{} Platform is up", CHECK);
    Ok(())
}

fn abort_setup(e: stagegate::setup::SetupError) -> ! {
    println!("{} {}", CROSS, style(&e).red());
    std::process::exit(1);
}

async fn query_registry(cmd: &RegistryCommand) -> Result<()> {
    let client = RegistryClient::new(&cmd.url)?;

    let (title, items) = match &cmd.action {
        RegistryAction::Catalog => ("Repositories".to_string(), client.catalog().await?),
        RegistryAction::Tags { image } => (format!("Tags of {}", image), client.tags(image).await?),
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    println!("{} {} in {}:", INFO, title, style(client.base_url()).dim());
    if items.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for item in &items {
        println!("  {}", style(item).cyan());
    }

    Ok(())
}

async fn serve_demo(cmd: &ServeCommand) -> Result<()> {
    println!("{} Starting demo service", ROCKET);
    stagegate::demo::serve(cmd.port).await
}
