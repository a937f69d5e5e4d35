//! CLI definition using clap derive.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "velolink", about = "real-time bike rental state sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a self-contained demo: in-memory store, simulated bike agent,
    /// and a rider session issuing commands
    Demo(DemoOpts),
    /// Validate a bike id and print the string handed to the QR encoder
    Code(CodeOpts),
}

#[derive(clap::Args)]
pub struct DemoOpts {
    /// Bike identifier to simulate and track
    #[arg(long, default_value = "bike_001")]
    pub bike: String,

    /// Snapshot silence tolerated before the session goes stale (seconds)
    #[arg(long, default_value = "30")]
    pub stale_after_secs: u64,

    /// Agent heartbeat interval in milliseconds
    #[arg(long, default_value = "2000")]
    pub heartbeat_ms: u64,

    /// How long the demo runs before shutting down (seconds)
    #[arg(long, default_value = "20")]
    pub duration_secs: u64,
}

#[derive(clap::Args)]
pub struct CodeOpts {
    /// Bike identifier to encode
    pub bike_id: String,
}
