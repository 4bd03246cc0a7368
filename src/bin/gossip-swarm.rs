//! CLI entry point. Configuration loading, signal/deadline wiring, and
//! log-sink setup live here, not in the library.

use clap::Parser;
use gossip_swarm::output::FileSink;
use gossip_swarm::{init_tracing, Config, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "gossip-swarm", about = "Gossip-protocol secret reconstruction swarm")]
struct Args {
    /// Path to a TOML config file. Falls back to built-in defaults when
    /// omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the config's log_level.
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> Config {
    let mut config = match &args.config {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("failed to parse config file {path:?}: {err}");
                    std::process::exit(1);
                }
            },
            Err(err) => {
                eprintln!("failed to read config file {path:?}: {err}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = load_config(&args);

    init_tracing(&config.log_level);

    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return ExitCode::FAILURE;
    }

    let sink = Arc::new(FileSink::new(config.output_file.clone()));
    let orchestrator = match Orchestrator::new(config, sink) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!(error = %err, "failed to build orchestrator");
            return ExitCode::FAILURE;
        }
    };

    orchestrator.run().await;
    ExitCode::SUCCESS
}
