//! Huddle room simulator.
//!
//! # Usage
//!
//! ```bash
//! # Four members, calm relay
//! huddle-sim --members 4 --messages 100
//!
//! # Hostile relay, reproducible from the seed
//! huddle-sim --seed 7 --drop-rate 0.05 --tamper-rate 0.1 --replay-rate 0.1
//! ```

use std::process::ExitCode;

use clap::Parser;
use huddle_harness::{ChaosConfig, SimConfig, run};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Huddle room simulator
#[derive(Parser, Debug)]
#[command(name = "huddle-sim")]
#[command(about = "Run a seeded Huddle room over a hostile relay and check invariants")]
#[command(version)]
struct Args {
    /// Room size
    #[arg(short, long, default_value = "4")]
    members: usize,

    /// Messages to send, round robin across members
    #[arg(short = 'n', long, default_value = "32")]
    messages: usize,

    /// Seed for keys, padding, IVs and chaos
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Chance that a receiver misses a frame
    #[arg(long, default_value = "0.0")]
    drop_rate: f64,

    /// Chance that a message frame is corrupted
    #[arg(long, default_value = "0.0")]
    tamper_rate: f64,

    /// Chance that a frame is replayed
    #[arg(long, default_value = "0.0")]
    replay_rate: f64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = SimConfig {
        members: args.members,
        messages: args.messages,
        seed: args.seed,
        chaos: ChaosConfig {
            drop_rate: args.drop_rate,
            tamper_rate: args.tamper_rate,
            replay_rate: args.replay_rate,
        },
    };
    tracing::info!(?config, "starting simulation");

    match run(&config) {
        Ok(report) => {
            tracing::info!(
                frames = report.stats.frames,
                dropped = report.stats.dropped,
                tampered = report.stats.tampered,
                replayed = report.stats.replayed,
                established_pairs = report.established_pairs,
                "all invariants held"
            );
            ExitCode::SUCCESS
        },
        Err(violations) => {
            for violation in &violations {
                tracing::error!(invariant = violation.invariant, "{}", violation.message);
            }
            ExitCode::FAILURE
        },
    }
}
