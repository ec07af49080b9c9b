//! # Fleet Credits Miner
//!
//! A command line client that asks a Fleet Credits daemon to mine blocks
//! through its JSON-RPC `generate` call. The daemon does the proof-of-work;
//! this program decides when to ask, reports what happened and stops cleanly
//! on Ctrl+C.
//!
//! ## Key Components
//! - **`main.rs`**: argument parsing, startup checks and command dispatch.
//! - **`config.rs`**: configuration file, network profiles and overrides.
//! - **`logging.rs`**: application-wide logging with `tracing`.
//! - **`fleet_rpc_connector`** (module): JSON-RPC transport to the daemon.
//! - **`fleet_mining_controller`** (module): mining sessions and preflight checks.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::future::Future;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

mod config;
mod logging;

use config::{Network, Overrides};
use fleet_mining_controller::{CancellationToken, MiningController};
use fleet_rpc_connector::RpcConnector;

/// Exit status of a command interrupted with Ctrl+C (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

/// Command-line arguments for the Fleet Credits miner.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file. Defaults to the platform config directory.
    #[clap(short, long, value_name = "FILE_PATH", global = true)]
    config: Option<String>,

    /// Network profile (selects default port, generate dialect and timeouts).
    #[clap(long, value_enum, global = true)]
    network: Option<Network>,

    /// JSON-RPC endpoint of the daemon.
    #[clap(long, value_name = "URL", global = true)]
    rpc_url: Option<String>,

    #[clap(long, value_name = "USER", global = true)]
    rpc_user: Option<String>,

    #[clap(long, value_name = "PASSWORD", global = true)]
    rpc_password: Option<String>,

    /// Log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[clap(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Write a default configuration file to FILE_PATH and exit.
    #[clap(long, value_name = "FILE_PATH")]
    generate_config: Option<String>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Mine a fixed number of blocks in one call.
    Mine {
        #[clap(value_parser = clap::value_parser!(u64).range(1..))]
        blocks: u64,
    },
    /// Mine one block at a time until stopped.
    Auto {
        /// Pause between attempts, in seconds.
        #[clap(long, value_name = "SECONDS", allow_negative_numbers = true)]
        interval: Option<f64>,
        /// Stop after this many blocks.
        #[clap(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        max_blocks: Option<u64>,
    },
    /// Show chain, node and wallet status.
    Status,
    /// Check that the daemon is ready for mining.
    Verify,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            network: self.network,
            rpc_url: self.rpc_url.clone(),
            rpc_user: self.rpc_user.clone(),
            rpc_password: self.rpc_password.clone(),
        }
    }
}

/// Runs `task` unless Ctrl+C arrives first. `None` means the user interrupted it.
///
/// The signal handler replaces the default SIGINT behaviour, so every daemon
/// call made from `main` has to go through here to stay interruptible.
async fn until_cancelled<F: Future>(shutdown: &CancellationToken, task: F) -> Option<F::Output> {
    tokio::select! {
        biased; // Prioritize the shutdown signal.
        _ = shutdown.cancelled() => None,
        out = task => Some(out),
    }
}

fn interrupted(what: &str) -> ExitCode {
    warn!("{} interrupted", what);
    ExitCode::from(EXIT_INTERRUPTED)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // --- 1. Initialization ---
    let args = Args::parse();

    // `--generate-config` needs neither a daemon nor a subcommand.
    if let Some(path) = args.generate_config.as_deref() {
        config::generate_default_config(path)
            .with_context(|| format!("Failed to write default configuration to '{}'", path))?;
        println!("Default configuration written to {}", path);
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = args.command.clone() else {
        Args::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    };

    // The config file carries the log level, so it is read before logging
    // starts; what the load did is reported right after.
    let (app_config, origin) = config::Config::load(args.config.as_deref()).context(
        "Failed to load configuration. Fix the file or write a fresh one with --generate-config",
    )?;
    logging::init_logging(args.log_level.as_deref(), Some(app_config.logging.level.as_str()));
    info!("Starting Fleet Credits miner v{}...", env!("CARGO_PKG_VERSION"));
    origin.log();
    debug!("Loaded configuration: {:?}", app_config);

    // Flags beat the file, the file beats the network profile.
    let settings = app_config.resolve(&args.overrides());
    settings.warn_on_missing_credentials();

    // --- 2. Setup RPC Connector and Controller ---
    let connector = RpcConnector::new(settings.rpc.clone()).context("Invalid RPC endpoint")?;
    info!("Using {} daemon at {}", settings.network, connector.endpoint().redacted());
    let controller = MiningController::new(connector, settings.controller.clone());

    // --- 3. Ctrl+C handling ---
    // Cancelling the token abandons whatever RPC call is in flight.
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl+C received. Stopping...");
                    shutdown.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    });

    // --- 4. Connectivity check ---
    // Every command needs the daemon; fail early with hints instead of per command.
    match until_cancelled(&shutdown, controller.check_connection()).await {
        None => return Ok(interrupted("Connectivity check")),
        Some(Ok(info)) => info!("Connected to {} network, height {}", info.chain, info.blocks),
        Some(Err(e)) => {
            error!("Cannot reach the daemon: {}", e);
            eprintln!("Error: cannot reach the daemon: {}", e);
            for hint in config::startup_hints(&settings) {
                eprintln!("  - {}", hint);
            }
            return Ok(ExitCode::FAILURE);
        }
    }

    // --- 5. Command dispatch ---
    // Results go to stdout, diagnostics to stderr.
    let code = match command {
        Command::Mine { blocks } => match until_cancelled(&shutdown, controller.mine_once(blocks, true)).await {
            None => interrupted("Mining"),
            Some(Ok(outcome)) => {
                println!("{}", outcome);
                ExitCode::SUCCESS
            }
            Some(Err(e)) => {
                eprintln!("Error: mining failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Auto { interval, max_blocks } => {
            // auto_mine watches the token itself and always ends with a summary.
            let interval = interval.map(config::interval_from_secs).unwrap_or(settings.interval);
            let summary = controller.auto_mine(interval, max_blocks, &shutdown).await;
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Command::Status => match until_cancelled(&shutdown, controller.status()).await {
            None => interrupted("Status"),
            Some(Ok(status)) => {
                println!("{}", status);
                ExitCode::SUCCESS
            }
            Some(Err(e)) => {
                eprintln!("Error: status unavailable: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Verify => match until_cancelled(&shutdown, controller.verify()).await {
            None => interrupted("Verification"),
            Some(report) => {
                println!("{}", report);
                if report.passed() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }
        },
    };
    Ok(code)
}
