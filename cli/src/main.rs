use std::path::Path;

use adminkit_core::api::{CliError, LoggingConfig};
use adminkit_core::config::{load_default, load_from};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod output;

use commands::cli;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(hint) = e.remediation() {
                eprintln!("hint: {hint}");
            }
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: cli::Args) -> Result<i32, CliError> {
    let cfg = match &args.config {
        Some(path) => load_from(path)?,
        None => load_default()?,
    };
    let paths = cfg.resolve_paths()?;
    let _guard = init_tracing(&cfg.logging, paths.log_dir.as_deref());

    let app = app::App::build(cfg, paths)
        .await
        .map_err(|e| CliError::Command(format!("{e:#}")))?;

    dispatch(&app, args.command, args.json).await
}

async fn dispatch(app: &app::App, cmd: cli::Commands, json: bool) -> Result<i32, CliError> {
    match cmd {
        cli::Commands::Catalog(a) => commands::catalog::run(app, &a, json).await,
        cli::Commands::Preflight(a) => commands::preflight::run(app, &a, json).await,
        cli::Commands::Run(a) => commands::run::run(app, &a).await,
        cli::Commands::Cache(a) => commands::cache::run(app, &a, json).await,
        cli::Commands::History(a) => commands::history::run(app, &a, json).await,
    }
}

/// `RUST_LOG` wins over the configured level. With a log directory, output
/// goes to a daily-rolling file instead of stderr.
fn init_tracing(cfg: &LoggingConfig, dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    match dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &cfg.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
