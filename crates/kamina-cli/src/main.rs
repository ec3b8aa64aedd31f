//! Kamina community daemon CLI.
//!
//! `kamina daemon` launches the storage node and the API server under the
//! process supervisor and runs until a termination signal arrives.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kamina_core::config::DaemonConfig;
use kamina_core::process::{ManagedService, ProcessSupervisor};
use kamina_core::shutdown::SignalBridge;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "kamina")]
#[command(about = "The Kamina community daemon")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "conf/kamina.yaml")]
    config: PathBuf,

    /// Show child process output and enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the community daemon (storage node + API server)
    Daemon,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let result = match args.command {
        Command::Daemon => run_daemon(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            let code = e
                .downcast_ref::<kamina_core::KaminaError>()
                .map(|k| k.exit_code())
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

fn run_daemon(args: &Args) -> Result<()> {
    let mut config = DaemonConfig::load_or_default(&args.config)?;
    if args.verbose {
        config.troubleshoot.verbose = true;
    }

    info!("Starting community daemon...");

    let services = vec![
        ManagedService::storage_node(&config),
        ManagedService::api_server(&config),
    ];
    let mut supervisor = ProcessSupervisor::new(services).with_config(&config.daemon);

    SignalBridge::install(supervisor.shutdown_token())?;

    supervisor.start()?;
    info!("- API server listening on port {}", config.api.port);
    info!("- Storage node listening on port {}", config.ipfs.api_port);

    supervisor.run()?;
    Ok(())
}
