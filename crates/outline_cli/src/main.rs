//! Command line front end for an outline database.
//!
//! # Responsibility
//! - Load configuration, start stderr or file logging and open the database.
//! - Run one import, export or integrity check per invocation.

use clap::{Parser, Subcommand};
use log::{error, info};
use outline_core::db::open_db;
use outline_core::{
    init_logging, init_stderr_logging, Context, CoreConfig, ExportFormat, OutlineService,
    SqliteThoughtStore,
};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(name = "outline", version, about = "Import, export and check an outline database")]
struct Cli {
    /// TOML config file; defaults apply when missing.
    #[arg(long, global = true, default_value = "outline.toml")]
    config: PathBuf,

    /// Overrides `db_path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Overrides `log_level` from the config.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Imports an indented bullet list below a context.
    Import {
        file: PathBuf,
        /// Slash separated context, e.g. `work/projects`; home when empty.
        #[arg(long, default_value = "")]
        context: String,
    },
    /// Prints a context and its descendants.
    Export {
        #[arg(long, default_value = "")]
        context: String,
        /// `text/plain` or `text/html`; the config default otherwise.
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        exclude_archived: bool,
    },
    /// Loads every record and reports index inconsistencies.
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = CoreConfig::load(Some(cli.config.as_path()))?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    config.validate()?;

    match &config.log_dir {
        Some(dir) => init_logging(&config.log_level, &dir.to_string_lossy())?,
        None => init_stderr_logging(&config.log_level)?,
    }
    info!(
        "event=cli_start module=cli status=ok version={} db={}",
        outline_core::core_version(),
        config.db_path.display()
    );

    let mut conn = open_db(&config.db_path)?;
    let store = SqliteThoughtStore::try_new(&mut conn)?;
    let mut service = OutlineService::open(store)?.with_max_fetch_rounds(config.max_fetch_rounds);

    match cli.command {
        Command::Import { file, context } => {
            let text = fs::read_to_string(&file)?;
            let count = service.import_text(&parse_context(&context), &text)?;
            println!("imported {count} thoughts from {}", file.display());
        }
        Command::Export {
            context,
            format,
            exclude_archived,
        } => {
            let format = match format {
                Some(raw) => ExportFormat::from_str(&raw)?,
                None => config.export.format()?,
            };
            let mut options = config.export.options();
            options.exclude_archived |= exclude_archived;
            println!("{}", service.export(&parse_context(&context), format, &options)?);
        }
        Command::Check => {
            let report = service.check_integrity()?;
            if report.is_healthy() {
                println!("ok");
            } else {
                println!(
                    "{} lexeme and {} parent records need repair",
                    report.thought_index_updates.len(),
                    report.context_index_updates.len()
                );
                return Err("integrity check failed".into());
            }
        }
    }
    Ok(())
}

fn parse_context(raw: &str) -> Context {
    let values: Vec<&str> = raw
        .split('/')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();
    if values.is_empty() {
        Context::root()
    } else {
        Context::new(values)
    }
}
