//! sqlgate - pre-execution gatekeeper for SQL change scripts
//!
//! Screens SQL scripts for dangerous statements before they run. Approved
//! scripts get a point-in-time backup of the supplied snapshot and a rollback
//! stub; every batch is appended to `execution_log.json` in the output
//! directory and mirrored to `latest_run.json`.
//!
//! The gate never executes SQL and never talks to a database.

mod config;
mod error;
mod pipeline;

use crate::config::{LoggingConfig, Settings};
use crate::error::AppError;
use crate::pipeline::{Orchestrator, RulesEngine};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sqlgate", version, about = "SQL validation + backup gate")]
struct Cli {
    /// SQL file to validate
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with = "sql_dir",
        required_unless_present_any = ["sql_dir", "list_rules"]
    )]
    sql: Option<PathBuf>,

    /// Directory of *.sql files, processed in file name order
    #[arg(long, value_name = "DIR")]
    sql_dir: Option<PathBuf>,

    /// Snapshot file copied verbatim as the backup of approved scripts
    #[arg(long, value_name = "FILE", required_unless_present = "list_rules")]
    snapshot: Option<PathBuf>,

    /// Directory receiving backups, rollback stubs and run logs
    #[arg(long, value_name = "DIR", required_unless_present = "list_rules")]
    output_dir: Option<PathBuf>,

    /// Settings file (defaults to ./sqlgate.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the rule catalog as JSON and exit
    #[arg(long, conflicts_with_all = ["sql", "sql_dir", "snapshot", "output_dir"])]
    list_rules: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())
        .map_err(AppError::from)
        .context("loading settings")?;
    init_tracing(&settings.logging);

    if cli.list_rules {
        let engine = RulesEngine::with_disabled(&settings.rules.disabled);
        println!("{}", serde_json::to_string_pretty(engine.list_rules())?);
        return Ok(());
    }

    if let Err(e) = run(&cli, &settings) {
        error!("❌ {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(cli: &Cli, settings: &Settings) -> anyhow::Result<()> {
    let (snapshot, output_dir) = match (&cli.snapshot, &cli.output_dir) {
        (Some(s), Some(o)) => (s, o),
        _ => anyhow::bail!("--snapshot and --output-dir are required"),
    };

    let sql_paths = match (&cli.sql, &cli.sql_dir) {
        (Some(file), None) => vec![file.clone()],
        (None, Some(dir)) => Orchestrator::collect_sql_files(dir)
            .with_context(|| format!("collecting SQL files from {}", dir.display()))?,
        _ => anyhow::bail!("provide exactly one of --sql or --sql-dir"),
    };

    info!(
        files = sql_paths.len(),
        output_dir = %output_dir.display(),
        "🚀 Starting SQL gate run"
    );

    let summary = Orchestrator::from_settings(settings)
        .run_batch(&sql_paths, snapshot, output_dir)
        .context("processing SQL batch")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Initialize tracing with structured logging on stderr
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .compact(),
            )
            .init();
    }
}
