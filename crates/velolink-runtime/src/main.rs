//! velolink: bike rental state-sync runtime binary.
//! Wires the in-process demo together and exposes the code validation
//! step the QR encoder consumes.

use clap::Parser;

use velolink_session::{CodeResolver, DirectResolver};

mod agent;
mod cli;
mod demo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Demo(opts) => {
            let filter = std::env::var("VELOLINK_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            tracing::info!("velolink demo starting");
            demo::run(opts).await?;
        }
        cli::Command::Code(opts) => {
            // Same validation the session applies on scan, so a printed
            // code is guaranteed to resolve back to its bike.
            let bike_id = DirectResolver.resolve(&opts.bike_id)?;
            println!("{bike_id}");
        }
    }

    Ok(())
}
