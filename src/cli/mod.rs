//! CLI Module
//!
//! Command-line interface for offline mastering.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::export::ExportFormat;

/// Masterchain - render and measure mastered audio
#[derive(Parser, Debug)]
#[command(name = "masterchain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Master a WAV file and write the result
    #[command(name = "render")]
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Output file
        output: PathBuf,

        /// Settings file (JSON, camelCase fields)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// wav16, wav24, wav32, wav24@96000 or codec:kbps
        #[arg(short, long, default_value = "wav16")]
        format: ExportFormat,
    },

    /// Print the loudness of the mastered render as JSON
    #[command(name = "analyze")]
    Analyze {
        /// Input WAV file
        input: PathBuf,

        /// Settings file (JSON, camelCase fields)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "masterchain",
            "render",
            "in.wav",
            "out.wav",
            "--format",
            "wav24@96000",
        ])
        .unwrap();
        match cli.command {
            Commands::Render { format, .. } => assert_eq!(format.to_string(), "wav24@96000"),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
