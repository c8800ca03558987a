mod archive;
mod config;
mod database;
mod errors;
mod loader;
mod model;
mod orchestrator;
mod parser;
mod transformer;
mod utils;
mod writer;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::fmt::format::FmtSpan;

use config::Config;
use errors::Error;
use loader::postgres::PostgresLoader;
use loader::{Loader, RunMode};
use orchestrator::{AcquisitionSource, NoAcquisitionSource, Orchestrator};

/// Loads the FDA Structured Product Labeling corpus into a relational
/// warehouse.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

impl ToString for LogFormat {
    fn to_string(&self) -> String {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
        .to_string()
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Creates the production, staging, and tracking tables
    Init,

    /// Runs a FULL load: truncates and repopulates every production table
    FullLoad {
        /// Directory of already-acquired archives. Omit to use the
        /// registered AcquisitionSource.
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Runs a DELTA load: merges new or superseding documents into production
    DeltaLoad {
        /// Directory of already-acquired archives. Omit to use the
        /// registered AcquisitionSource.
        #[arg(long)]
        source: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "run failed");
            exit_code_for(&err)
        }
    }
}

fn init_logging(format: LogFormat) {
    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt().json().with_span_events(FmtSpan::CLOSE).init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .init();
        }
    }
}

fn run(command: Commands) -> Result<ExitCode, Error> {
    let config = Config::from_env()?;

    match command {
        Commands::Init => {
            let pool = database::get_pool(&config.database_url)?;
            let loader = PostgresLoader::new(pool, config.stale_run_threshold);
            loader.initialize_schema()?;
            info!("schema initialized");
            Ok(ExitCode::SUCCESS)
        }
        Commands::FullLoad { source } => run_pipeline(config, RunMode::Full, source),
        Commands::DeltaLoad { source } => run_pipeline(config, RunMode::Delta, source),
    }
}

fn run_pipeline(config: Config, mode: RunMode, source: Option<PathBuf>) -> Result<ExitCode, Error> {
    let archives = match source {
        Some(dir) => discover_archives(&dir)?,
        None => {
            let scratch = config.run_state_dir.join("acquired");
            NoAcquisitionSource.fetch(&scratch)?
        }
    };

    let pool = database::get_pool(&config.database_url)?;
    let loader = PostgresLoader::new(pool, config.stale_run_threshold);
    let orchestrator = Orchestrator::new(config, loader);

    let summary = orchestrator.run(mode, &archives)?;
    info!(
        archives_processed = summary.archives_processed,
        archives_quarantined = summary.archives_quarantined,
        documents_loaded = summary.documents_loaded,
        documents_failed = summary.documents_failed,
        "run complete"
    );

    if summary.had_quarantine() {
        Ok(ExitCode::from(3))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Non-recursive: one archive per `.zip` file directly under `dir`, matching
/// the flat "archive directory" input spec.md §2's data-flow diagram shows.
fn discover_archives(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut archives = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("zip") {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

fn exit_code_for(error: &Error) -> ExitCode {
    match error {
        Error::Config(_) | Error::Acquisition(_) => ExitCode::from(1),
        Error::Canceled => ExitCode::from(130),
        _ => ExitCode::from(2),
    }
}
