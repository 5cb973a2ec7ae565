//! Simulate Lamport mutual exclusion across in-process peers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lamport_mutex::{Simulation, SimulationConfig};
use lamport_sim::logs;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "lamport-sim")]
#[command(about = "Simulate Lamport mutual exclusion across in-process peers")]
struct Args {
    /// Number of peer processes (at least 2)
    #[arg(short, long, default_value_t = 4)]
    processes: usize,

    /// Time horizon in logical-clock ticks
    #[arg(short, long, default_value_t = 100)]
    duration: u64,

    /// Directory receiving messageLog.csv and criticalSectionLog.txt
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match SimulationConfig::new(args.processes, args.duration) {
        Ok(config) => config,
        Err(error) => {
            error!("invalid configuration: {error:?}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Simulate {} processes for {} time units",
        config.process_count, config.duration
    );

    let report = match Simulation::new(&config).run().await {
        Ok(report) => report,
        Err(error) => {
            // A protocol violation falsifies the run; nothing to log.
            error!("simulation aborted: {error:?}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        operations = report.operations.len(),
        deliveries = report.deliveries.len(),
        "simulation complete"
    );

    // Log-file failures are reported but do not fail the run.
    if let Err(error) = logs::write_message_log(&args.output, &report.deliveries) {
        error!(error = %error, "failed to write the message log");
    }
    if let Err(error) = logs::write_critical_section_log(&args.output, &report.operations) {
        error!(error = %error, "failed to write the critical section log");
    }

    ExitCode::SUCCESS
}
