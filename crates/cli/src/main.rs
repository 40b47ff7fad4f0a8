//! repomigrate command-line tool.
//!
//! Migrates every repository of a Bitbucket workspace to GitHub, and provides
//! subcommands for listing the catalog, previewing destination names, and
//! generating / validating / checking the configuration.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use repomigrate_core::config::{AppConfig, DEFAULT_CONFIG_TEMPLATE};
use repomigrate_core::models::{RepoOutcome, RepoReport, RunSummary};
use repomigrate_core::preflight;
use repomigrate_core::{
    BitbucketClient, GitHubClient, MirrorEngine, Migrator, NameTranslator, ProcessGitRunner,
    SourceListing,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Migrate Bitbucket repositories to GitHub with full history.
#[derive(Parser, Debug)]
#[command(
    name = "repomigrate",
    version,
    about = "Migrate a Bitbucket workspace to GitHub with full history"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "repomigrate.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate every repository in the source workspace.
    Run {
        /// Only migrate these source repositories (repeatable).
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,

        /// Translate names and check destinations without changing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// List source repositories with their destination names.
    List,

    /// Print the destination name for each source name.
    Translate {
        /// Source repository names.
        #[arg(required = true)]
        names: Vec<String>,

        /// Destination name prefix.
        #[arg(long, default_value = "bb")]
        prefix: String,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./repomigrate.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Check required tools and configuration.
    Doctor,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Translate { names, prefix } => {
            let _guard = init_tracing(cli.log_level.as_deref().unwrap_or("warn"), None)?;
            Ok(cmd_translate(&names, &prefix))
        }
        Commands::Init { output } => {
            let _guard = init_tracing(cli.log_level.as_deref().unwrap_or("warn"), None)?;
            cmd_init(&output).map(|()| ExitCode::SUCCESS)
        }
        Commands::Validate => {
            let _guard = init_tracing(cli.log_level.as_deref().unwrap_or("warn"), None)?;
            cmd_validate(&cli.config).map(|()| ExitCode::SUCCESS)
        }
        Commands::Doctor => {
            let _guard = init_tracing(cli.log_level.as_deref().unwrap_or("warn"), None)?;
            cmd_doctor(&cli.config).await
        }
        Commands::List => {
            let (config, _guard) = load_config(&cli.config, cli.log_level.as_deref())?;
            cmd_list(&config).await
        }
        Commands::Run { only, dry_run } => {
            let (config, _guard) = load_config(&cli.config, cli.log_level.as_deref())?;
            cmd_run(&config, only, dry_run).await
        }
    }
}

// ---------------------------------------------------------------------------
// Logging & config helpers
// ---------------------------------------------------------------------------

/// Install the global subscriber: stderr, plus `log_file` when given. The
/// returned guard flushes the file writer on drop.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .context("log_file must name a file")?;
            std::fs::create_dir_all(dir).context("failed to create log directory")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to initialize logging")?;
    Ok(guard)
}

/// Parse the config, start logging at the configured level, then resolve
/// secrets and validate everything but the secrets themselves.
fn load_config(path: &Path, log_level: Option<&str>) -> Result<(AppConfig, Option<WorkerGuard>)> {
    let mut config = AppConfig::load_from_file(path).context("failed to load configuration file")?;
    let level = log_level.unwrap_or(&config.migration.log_level).to_string();
    let guard = init_tracing(&level, config.migration.log_file.as_deref())?;

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config
        .validate_settings()
        .context("configuration validation failed")?;
    Ok((config, guard))
}

fn bitbucket_client(config: &AppConfig) -> Result<BitbucketClient> {
    let password = config.source.password.clone().with_context(|| {
        format!(
            "source password not set (environment variable {})",
            config.source.password_env
        )
    })?;
    BitbucketClient::new(&config.source.api_url, &config.source.username, password)
        .context("failed to build Bitbucket client")
}

async fn list_source(config: &AppConfig) -> Result<SourceListing> {
    let client = bitbucket_client(config)?;
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .context("invalid progress template")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(format!(
        "Listing repositories in {}...",
        config.source.workspace
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let listing = client.list_repositories(&config.source.workspace).await;
    spinner.finish_and_clear();

    if let Some(e) = &listing.incomplete {
        eprintln!(
            "{}",
            style::warn(&format!(
                "Source listing incomplete ({} repositories listed): {}",
                listing.repositories.len(),
                e
            ))
        );
    }
    Ok(listing)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, only: Vec<String>, dry_run: bool) -> Result<ExitCode> {
    config
        .validate()
        .context("configuration validation failed")?;

    if !dry_run {
        let report = preflight::check_tools(&config.mirror.git_binary).await;
        report
            .ensure_ready()
            .context("required tools are missing; run `repomigrate doctor`")?;
    }

    info!(
        workspace = %config.source.workspace,
        owner = %config.destination.owner,
        dry_run,
        "starting repomigrate v{}",
        env!("CARGO_PKG_VERSION")
    );

    let listing = list_source(config).await?;
    let github = GitHubClient::from_config(&config.destination)
        .context("failed to build GitHub client")?;
    let engine = MirrorEngine::from_config(
        ProcessGitRunner::new(&config.mirror.git_binary),
        &config.mirror,
    );
    let migrator = Migrator::new(config, github, engine)
        .context("failed to prepare working directory root")?
        .with_dry_run(dry_run)
        .with_only(only);

    let total = migrator.select(&listing.repositories).len() as u64;
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.blue} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let summary = migrator
        .run_listing(&listing, |report| {
            bar.inc(1);
            bar.set_message(report.source_name.clone());
            bar.println(report_line(report));
            rows.push(report_row(report));
        })
        .await;
    bar.finish_and_clear();

    print_summary(&summary, rows, dry_run);
    Ok(ExitCode::from(summary.exit_code()))
}

fn report_line(report: &RepoReport) -> String {
    match &report.result {
        Ok(RepoOutcome::Migrated {
            destination,
            warnings,
            ..
        }) if warnings.is_empty() => style::success(&style::mapping(&report.source_name, destination)),
        Ok(RepoOutcome::Migrated {
            destination,
            warnings,
            ..
        }) => style::warn(&format!(
            "{} ({})",
            style::mapping(&report.source_name, destination),
            warnings.join("; ")
        )),
        Ok(RepoOutcome::Skipped {
            destination,
            reason,
        }) => style::dim(&format!(
            "  - {} → {} (skipped: {})",
            report.source_name, destination, reason
        )),
        Err(e) => style::error(&format!(
            "{} failed after {}: {}",
            report.source_name, e.phase, e.kind
        )),
    }
}

fn report_row(report: &RepoReport) -> Vec<Cell> {
    match &report.result {
        Ok(RepoOutcome::Migrated {
            destination,
            created,
            warnings,
        }) => vec![
            Cell::new(&report.source_name),
            Cell::new(destination),
            Cell::new("✓ migrated").fg(Color::Green),
            Cell::new(if *created { "created" } else { "existing" }),
            Cell::new(warnings.join("; ")),
        ],
        Ok(RepoOutcome::Skipped {
            destination,
            reason,
        }) => vec![
            Cell::new(&report.source_name),
            Cell::new(destination),
            Cell::new("○ skipped").fg(Color::Yellow),
            Cell::new(""),
            Cell::new(reason),
        ],
        Err(e) => vec![
            Cell::new(&report.source_name),
            Cell::new("—"),
            Cell::new("✗ failed").fg(Color::Red),
            Cell::new(e.phase),
            Cell::new(&e.kind),
        ],
    }
}

fn print_summary(summary: &RunSummary, rows: Vec<Vec<Cell>>, dry_run: bool) {
    println!();
    println!(
        "{}",
        style::header(if dry_run {
            "Migration Preview"
        } else {
            "Migration Summary"
        })
    );
    println!();

    if !rows.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Source", "Destination", "Result", "Phase", "Detail"]);
        for row in rows {
            table.add_row(row);
        }
        println!("{}", table);
        println!();
    }

    println!("  Succeeded : {}", summary.succeeded.len());
    println!("  Skipped   : {}", summary.skipped.len());
    println!("  Failed    : {}", summary.failed.len());
    println!("  Warnings  : {}", summary.warnings);
    if let Some(done) = summary.completed_at {
        let secs = (done - summary.started_at).num_seconds();
        println!("  Duration  : {}s", secs);
    }
    if !summary.listing_complete {
        println!();
        println!(
            "  {}",
            style::warn("The source listing was incomplete; re-run to pick up the rest.")
        );
    }
    println!();
}

async fn cmd_list(config: &AppConfig) -> Result<ExitCode> {
    let listing = list_source(config).await?;
    let translator = NameTranslator::new(&config.destination.name_prefix);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Source", "Destination"]);
    for record in &listing.repositories {
        let destination = match translator.translate(&record.source_name) {
            Ok(name) => Cell::new(name),
            Err(e) => Cell::new(format!("✗ {}", e)).fg(Color::Red),
        };
        table.add_row(vec![Cell::new(&record.source_name), destination]);
    }

    println!();
    println!(
        "{}",
        style::header(&format!(
            "{} repositories in {}",
            listing.repositories.len(),
            config.source.workspace
        ))
    );
    println!();
    println!("{}", table);
    println!();

    Ok(if listing.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_translate(names: &[String], prefix: &str) -> ExitCode {
    let translator = NameTranslator::new(prefix);
    let mut failed = false;
    for name in names {
        match translator.translate(name) {
            Ok(dest) => println!("{}", style::mapping(name, dest.as_str())),
            Err(e) => {
                eprintln!("{}", style::error(&e.to_string()));
                failed = true;
            }
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG_TEMPLATE).context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your Bitbucket workspace and GitHub owner");
    println!("  2. Set the referenced environment variables (BITBUCKET_PASS, GITHUB_ACCESS_TOKEN)");
    println!(
        "  3. Check your setup with: repomigrate doctor --config {}",
        output.display()
    );
    println!(
        "  4. Preview the migration: repomigrate run --dry-run --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  {}", style::success("Environment variable references processed"));

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All required fields are valid"));

    let set = |v: &Option<String>| if v.is_some() { "set" } else { "NOT SET" };
    println!();
    println!("Configuration summary:");
    println!("  Bitbucket workspace : {}", config.source.workspace);
    println!("  Bitbucket user      : {}", config.source.username);
    println!("  Bitbucket password  : {}", set(&config.source.password));
    println!(
        "  GitHub owner        : {} ({:?})",
        config.destination.owner, config.destination.owner_kind
    );
    println!("  GitHub token        : {}", set(&config.destination.token));
    println!("  Name prefix         : {}", config.destination.name_prefix);
    println!(
        "  Legacy identities   : {}",
        config.identity.legacy_names.len()
    );
    println!(
        "  Blob size limit     : {} bytes",
        config.mirror.blob_size_limit_bytes
    );
    println!(
        "  Working directory   : {}",
        config.migration.work_dir.display()
    );
    println!();

    Ok(())
}

async fn cmd_doctor(config_path: &Path) -> Result<ExitCode> {
    println!();
    println!("{}", style::header("repomigrate Doctor"));
    println!("{}", "═".repeat(18));
    println!();

    let mut issues = Vec::new();

    // 1. Configuration
    let config = match AppConfig::load_from_file(config_path) {
        Ok(mut config) => {
            config
                .resolve_env_vars()
                .context("failed to resolve environment variables")?;
            match config.validate() {
                Ok(()) => println!("  {}", style::success("Configuration     Valid")),
                Err(e) => {
                    println!("  {}", style::error(&format!("Configuration     {}", e)));
                    issues.push("Fix configuration errors (see `repomigrate validate`)".to_string());
                }
            }
            Some(config)
        }
        Err(e) => {
            println!("  {}", style::error(&format!("Configuration     {}", e)));
            issues.push(format!(
                "Create a config with: repomigrate init --output {}",
                config_path.display()
            ));
            None
        }
    };

    // 2. Tools
    let git_binary = config
        .as_ref()
        .map(|c| c.mirror.git_binary.as_str())
        .unwrap_or("git");
    let report = preflight::check_tools(git_binary).await;
    for check in &report.checks {
        let line = format!("{:<17} {}", check.name, check_detail(check));
        if check.is_available() {
            println!("  {}", style::success(&line));
        } else {
            println!("  {}", style::error(&line));
        }
    }
    for missing in report.missing() {
        issues.push(match missing.name {
            "git filter-repo" => {
                "Install git-filter-repo: https://github.com/newren/git-filter-repo".to_string()
            }
            other => format!("Install {} and make sure it is on PATH", other),
        });
    }

    // 3. Working directory root
    if let Some(config) = &config {
        let work_dir = &config.migration.work_dir;
        if work_dir.exists() {
            println!(
                "  {}",
                style::success(&format!("Working Directory {}", work_dir.display()))
            );
        } else {
            println!(
                "  {}",
                style::dim(&format!(
                    "  ○ Working Directory {} (created on first run)",
                    work_dir.display()
                ))
            );
        }
    }

    println!();
    if issues.is_empty() {
        println!("{}", style::success("All checks passed."));
        println!();
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}", style::header("Issues"));
        for issue in &issues {
            println!("  • {}", issue);
        }
        println!();
        Ok(ExitCode::FAILURE)
    }
}

fn check_detail(check: &preflight::ToolCheck) -> String {
    match &check.status {
        preflight::ToolStatus::Available { version } => version.clone(),
        preflight::ToolStatus::Missing { reason } => reason.clone(),
    }
}
