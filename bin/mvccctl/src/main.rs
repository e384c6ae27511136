//! ---
//! mvcc_section: "06-operator-cli"
//! mvcc_subsection: "binary"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Operator CLI entrypoint."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use mvcc_common::{Dialect, LoadedRunnerConfig, RunnerConfig};

mod catalog;
mod run;

const DEFAULT_CONFIG: &str = "configs/mvcc-sim.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Run multi-session isolation anomaly scenarios against a local database",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Open one session per transaction and play a scenario")]
    Run(run::RunArgs),
    #[command(about = "List the tests available for a dialect")]
    List(catalog::ListArgs),
    #[command(about = "Print the step plan of a test without touching the database")]
    Show(catalog::ShowArgs),
}

/// Options shared by every subcommand that reads a scenario file.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Scenario document; defaults to `scenario_path` from the configuration.
    #[arg(long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,
    /// Runner configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl SourceArgs {
    pub fn load_config(&self) -> Result<LoadedRunnerConfig> {
        RunnerConfig::load_with_source(self.config.as_deref(), &[Path::new(DEFAULT_CONFIG)])
    }

    pub fn scenario_path(&self, config: &RunnerConfig) -> PathBuf {
        self.scenario
            .clone()
            .unwrap_or_else(|| config.scenario_path.clone())
    }
}

/// Parse a dialect name, telling the operator what is accepted when it is unknown.
pub fn parse_dialect(name: &str) -> Option<Dialect> {
    match name.parse() {
        Ok(dialect) => Some(dialect),
        Err(_) => {
            println!(
                "unknown dialect '{name}', expected one of: {}",
                Dialect::supported()
            );
            None
        }
    }
}

fn version_string() -> String {
    format!(
        "mvccctl {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    // usage errors are benign and exit 0 like every other non-interrupt outcome
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
    };
    if cli.version {
        println!("{}", version_string());
        return ExitCode::SUCCESS;
    }

    let outcome = match cli.command {
        Some(Commands::Run(args)) => run::execute(args).await,
        Some(Commands::List(args)) => catalog::list(args).map(|_| 0),
        Some(Commands::Show(args)) => catalog::show(args).map(|_| 0),
        None => {
            let _ = Cli::command().print_help();
            Ok(0)
        }
    };

    match outcome {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::SUCCESS
        }
    }
}
