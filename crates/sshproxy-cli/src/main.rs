//! sshproxy command-line interface
//!
//! Entry point invoked by the orchestrator for every hook and action of one
//! unit. Each invocation is a fresh process; everything that must survive
//! between invocations lives under the configured state directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod effects;

use commands::{action, hook, status};
use config::ProxyConfig;

#[derive(Parser)]
#[command(name = "sshproxy")]
#[command(about = "Leader-gated SSH credential bootstrap for proxy units", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".sshproxy/config.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Deliver a lifecycle or relation hook to this unit
    Hook {
        /// install, upgrade, config-changed, relation-changed, or leader-elected
        event: String,
    },

    /// Re-deliver deferred hooks
    Tick,

    /// Run an operator action
    Action {
        /// Action name
        name: String,

        /// Action parameter as key=value, repeatable
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Show unit status and bootstrap phase
    Status,
}

fn init_logging(verbose: bool, config: &ProxyConfig) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = ProxyConfig::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(cli.verbose, &config);

    let runtime = effects::build_runtime(&config).await?;

    match cli.command {
        Commands::Hook { event } => hook::run(&runtime, &event).await,
        Commands::Tick => hook::tick(&runtime).await,
        Commands::Action { name, params } => action::run(&runtime, &name, &params).await,
        Commands::Status => status::show(&runtime).await,
    }
}
