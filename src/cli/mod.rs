//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Assetline - build assets through scheme-tagged plugin chains
#[derive(Parser)]
#[command(name = "assetline")]
#[command(about = "Assetline - build assets through scheme-tagged plugin chains")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging (repeat for more detail)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which files to register and where to write them
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Build the release version
    #[arg(long)]
    pub release: bool,

    /// Manifest to build
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// File (or glob) to build
    #[arg(short, long)]
    pub file: Option<String>,

    /// Output directory to save files into
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Root directory for input files (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the project from scratch
    Build {
        #[command(flatten)]
        sources: SourceArgs,

        /// Print the build result as JSON
        #[arg(long)]
        json: bool,

        /// Exit with an error when any file fails to build
        #[arg(long)]
        strict: bool,
    },

    /// Build the project, then watch and rebuild on changes
    Watch {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

/// Default log filter for the number of `-v` flags.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 | 1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to start async runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let verbose = cli.verbose > 0;
    match cli.command {
        Commands::Build { sources, json, strict } => {
            runtime.block_on(build::run_build(&sources, verbose, json, strict))
        }
        Commands::Watch { sources } => runtime.block_on(build::run_watch(&sources, verbose)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::parse_from([
            "assetline", "-vv", "build", "--release", "-c", "assets.json5", "-o", "dist", "--json",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Build { sources, json, strict } => {
                assert!(sources.release);
                assert_eq!(sources.config, Some(PathBuf::from("assets.json5")));
                assert_eq!(sources.output, Some(PathBuf::from("dist")));
                assert!(sources.file.is_none());
                assert!(json);
                assert!(!strict);
            }
            Commands::Watch { .. } => panic!("expected build"),
        }
    }

    #[test]
    fn test_parse_watch_with_verbose_after_subcommand() {
        let cli = Cli::parse_from(["assetline", "watch", "-f", "src/**/*.css", "-r", "src", "-v"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Watch { sources } => {
                assert_eq!(sources.file.as_deref(), Some("src/**/*.css"));
                assert_eq!(sources.root, Some(PathBuf::from("src")));
            }
            Commands::Build { .. } => panic!("expected watch"),
        }
    }

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(0), "info");
        assert_eq!(default_filter(2), "debug");
        assert_eq!(default_filter(5), "trace");
    }
}
