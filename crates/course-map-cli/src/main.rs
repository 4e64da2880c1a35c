mod inspect;
mod settings;

use clap::Parser;
use course_map_lib::MapError;
use settings::Settings;
use std::io::Write;
use std::process::ExitCode;

/// Error types for the inspector
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Map(#[from] MapError),
}

/// Initialize logging; `RUST_LOG` wins over the verbosity flag
fn setup_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr so stdout stays valid JSON
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();
}

fn run(settings: &Settings) -> Result<(), CliError> {
    let config = inspect::load_config(settings)?;
    let rows = inspect::load_points(&settings.input)?;
    tracing::info!("Loaded {} rows from {}", rows.len(), settings.input.display());

    let report = inspect::inspect(rows, config, settings)?;
    let json = if settings.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };

    match &settings.output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Report written to {}", path.display());
        }
        None => writeln!(std::io::stdout().lock(), "{json}")?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let settings = Settings::parse();
    setup_logging(settings.verbose);

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
