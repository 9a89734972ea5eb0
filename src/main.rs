use anyhow::{Context, Result};
use chrono::Utc;
use console::Term;
use indicatif::ProgressBar;
use provisioner::cli::commands::{HistoryCommand, RunCommand, StagesCommand, ValidateCommand};
use provisioner::cli::output::*;
use provisioner::cli::{Cli, Command};
use provisioner::core::config::ProvisionConfig;
use provisioner::core::{title_links, PipelinePhase, ProgressSnapshot, StageCatalog, STAGES};
use provisioner::execution::{PipelineController, PipelineHandle};
use provisioner::persistence::{create_summary, HistoryBackend, InMemoryHistory, RunSummary};
use provisioner::{PlayFabAdminClient, SeedData};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "provision.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_provisioning(cmd, &cli).await?,
        Command::Validate(cmd) => validate_seed(cmd, &cli)?,
        Command::Stages(cmd) => list_stages(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<ProvisionConfig> {
    match path {
        Some(path) => ProvisionConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path)),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            debug!("Using {}", DEFAULT_CONFIG_FILE);
            ProvisionConfig::from_file(DEFAULT_CONFIG_FILE)
                .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG_FILE))
        }
        None => Ok(ProvisionConfig::default()),
    }
}

async fn open_history(ephemeral: bool) -> Result<Arc<dyn HistoryBackend>> {
    if ephemeral {
        return Ok(Arc::new(InMemoryHistory::new()));
    }
    open_persistent_history().await
}

#[cfg(feature = "sqlite")]
async fn open_persistent_history() -> Result<Arc<dyn HistoryBackend>> {
    let store = provisioner::persistence::SqliteHistoryStore::with_default_path()
        .await
        .context("Failed to open run history")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_persistent_history() -> Result<Arc<dyn HistoryBackend>> {
    anyhow::bail!("Run history requires the `sqlite` feature (or pass --no-history)")
}

async fn run_provisioning(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    cmd.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let secret_key = cmd
        .secret_key
        .clone()
        .context("No secret key given (use --secret-key or PROVISION_SECRET_KEY)")?;

    let seed = SeedData::from_dir(&config.data_dir)
        .with_context(|| format!("Failed to load seed data from {}", config.data_dir.display()))?;
    let catalog = StageCatalog::new(seed, config.catalog_version.clone())?;

    println!(
        "{} Provisioning title {} from {}",
        INFO,
        style(&config.title_id).bold(),
        style(config.data_dir.display()).dim()
    );

    let history = open_history(cmd.no_history).await?;
    let client = PlayFabAdminClient::new(&config.admin_client_config())?;

    let bar = create_progress_bar();
    let mut controller = PipelineController::new(client, catalog)
        .with_throttle(config.throttle())
        .with_stall_policy(config.stall_policy());

    // Set up event handler for console output
    let printer = bar.clone();
    controller.add_event_handler(move |event| {
        if let Some(line) = format_provision_event(&event) {
            printer.println(line);
        }
    });

    let started_at = Utc::now();
    let handle = controller.start(secret_key)?;
    let outcome = drive(&handle, &bar, cmd.non_interactive).await;
    bar.finish_and_clear();
    let snapshot = outcome?;

    // Save to history
    let summary = create_summary(&config.title_id, started_at, &snapshot);
    history.save_run(&summary).await?;
    if !cmd.no_history {
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    // Print final status
    if snapshot.phase == PipelinePhase::Complete {
        println!(
            "\n{} {} provisioned {}",
            CHECK,
            style(&config.title_id).bold(),
            style("successfully").green()
        );
        println!("\n{}", style("What this created:").bold());
        for (title, url) in title_links(&config.title_id) {
            println!("  {} {}", style(title).cyan(), style(url).dim());
        }
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&config.title_id).bold(),
            format_status(summary.status)
        );
        if let Some(error) = &snapshot.error {
            error!("{}", error);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// What the operator chose to do about a halted run
enum Recovery {
    Retry,
    Clear,
    Abort,
}

/// Render progress until the run completes, is aborted, or halts in
/// non-interactive mode
async fn drive(
    handle: &PipelineHandle,
    bar: &ProgressBar,
    non_interactive: bool,
) -> Result<ProgressSnapshot> {
    let mut progress = handle.progress();
    loop {
        let snapshot = (*progress.borrow_and_update()).clone();
        render_progress(bar, &snapshot);

        match snapshot.phase {
            PipelinePhase::Complete | PipelinePhase::Aborted => return Ok(snapshot),
            PipelinePhase::Halted(_) if non_interactive => return Ok(snapshot),
            PipelinePhase::Halted(_) => {
                match prompt_recovery(bar).await? {
                    Recovery::Retry => {
                        handle.clear_error().await?;
                        let count = handle.retry_failed().await?;
                        debug!(count, "Retry requested");
                    }
                    Recovery::Clear => {
                        handle.clear_error().await?;
                    }
                    Recovery::Abort => {
                        handle.abort().await?;
                    }
                }
                continue;
            }
            _ => {}
        }

        if progress.changed().await.is_err() {
            return Ok((*progress.borrow()).clone());
        }
    }
}

async fn prompt_recovery(bar: &ProgressBar) -> Result<Recovery> {
    loop {
        bar.suspend(|| {
            println!(
                "{} [{}]etry failed calls, [{}]lear the error, [{}]bort?",
                WARN,
                style("r").bold(),
                style("c").bold(),
                style("a").bold()
            );
        });

        let key = tokio::task::spawn_blocking(|| Term::stdout().read_char())
            .await?
            .context("Failed to read from terminal (use --non-interactive)")?;

        match key.to_ascii_lowercase() {
            'r' => return Ok(Recovery::Retry),
            'c' => return Ok(Recovery::Clear),
            'a' => return Ok(Recovery::Abort),
            _ => continue,
        }
    }
}

fn validate_seed(cmd: &ValidateCommand, cli: &Cli) -> Result<()> {
    println!("{} Validating seed data...", INFO);

    let config = load_config(cli.config.as_deref())?;
    let data_dir = cmd.data_dir.clone().unwrap_or(config.data_dir);

    let result = SeedData::from_dir(&data_dir)
        .and_then(|seed| StageCatalog::new(seed, config.catalog_version.clone()));

    match result {
        Ok(catalog) => {
            let plan = catalog.plan();
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }

            println!("{} Seed data is valid!", CHECK);
            println!("  Directory: {}", style(data_dir.display()).bold());
            println!("  Catalog version: {}", style(catalog.catalog_version()).cyan());
            for (index, (stage, step)) in STAGES.iter().zip(&plan).enumerate() {
                println!("{}", format_stage(index, stage, Some(step.calls)));
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

fn list_stages(cmd: &StagesCommand) -> Result<()> {
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&STAGES)?);
        return Ok(());
    }

    println!("{} Provisioning stages:", INFO);
    for (index, stage) in STAGES.iter().enumerate() {
        println!("{}", format_stage(index, stage, None));
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history(false).await?;

    // If a specific run is requested
    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let runs = store.list_runs(cmd.title_id.as_deref(), cmd.limit).await?;

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, cmd.limit);
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Title: {}", style(&summary.title_id).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(finished) = summary.finished_at {
        println!("  Finished: {}", style(finished.to_rfc3339()).dim());
        if let Ok(duration) = finished.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Stages: {}/{}",
        summary.stages_completed, summary.total_stages
    );
    if let Some(error) = &summary.last_error {
        println!("  Error: {}", style(error).red());
    }

    Ok(())
}
