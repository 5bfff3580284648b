//! querylane demo CLI.
//!
//! Runners that connect to the embedding service and a Pinecone index,
//! submit a fixed list of queries concurrently, and print per-query
//! timings plus a summary:
//!
//! ```bash
//! # Routed and batched through the bin layer
//! querylane demo
//!
//! # Direct per-query access for comparison
//! querylane baseline
//!
//! # One-shot embedding round trip
//! querylane embed --prompt "Random Prompt"
//!
//! # Debug logging
//! RUST_LOG=debug querylane demo
//! ```

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Semantic request router and batcher for remote vector databases.
#[derive(Parser)]
#[command(name = "querylane")]
#[command(version)]
#[command(about = "Semantic request router and batcher for remote vector databases")]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the routed, batched demo workload
    Demo(commands::demo::DemoArgs),
    /// Run the same workload with direct per-query access
    Baseline(commands::baseline::BaselineArgs),
    /// Round-trip a single prompt through the embedding service
    Embed(commands::embed::EmbedArgs),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Demo(args) => commands::demo::run(args).await,
        Commands::Baseline(args) => commands::baseline::run(args).await,
        Commands::Embed(args) => commands::embed::run(args).await,
    }
}
