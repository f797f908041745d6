//! Masterchain CLI
//!
//! Command-line front end for offline mastering and loudness analysis.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use masterchain::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Masterchain v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            input,
            output,
            settings,
            format,
        } => {
            let settings = commands::load_settings(settings.as_deref())?;
            commands::render(&input, &output, &settings, &format, config)
        }
        Commands::Analyze { input, settings } => {
            let settings = commands::load_settings(settings.as_deref())?;
            commands::analyze(&input, &settings, &config)
        }
    }
}
