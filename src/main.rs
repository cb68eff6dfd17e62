//! tasker CLI: dependency-aware quantum-chemistry input generation.

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tasker::cli::{self, Commands};
use tasker::core::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "tasker",
    version,
    about = "Generate quantum-chemistry inputs from declarative task files, one ready block at a time"
)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Calculation directory holding task directories
    #[arg(long, global = true)]
    calc_dir: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn run(cli: Cli) -> Result<(), String> {
    if let Commands::Completions { shell } = cli.command {
        cli::print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    cli::logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;
    let mut config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(dir) = cli.calc_dir {
        config.calc_dir = dir;
    }
    cli::dispatch(cli.command, config)
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
