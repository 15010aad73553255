/// Relay Sim - drive a playback session against a simulated engine
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod engine;
mod session;

use config::SimConfig;
use session::Session;

#[derive(Parser)]
#[command(name = "relay-sim")]
#[command(about = "Simulate a Relay Player session", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./relay-sim.toml if present)
    #[arg(short, long, global = true, env = "RELAY_SIM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play the configured queue to completion
    Run {
        /// Skip each track after this many delivered frames
        #[arg(long)]
        skip_after: Option<u64>,
    },
    /// Play the queue, then print the recently played list
    History {
        /// First entry, 0 = most recent
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// End of the page (exclusive); defaults to the whole history
        #[arg(long)]
        end: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_sim=info,relay_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = SimConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { skip_after } => run(&config, skip_after.or(config.skip_after_frames))?,
        Commands::History { start, end } => history(&config, start, end)?,
    }

    Ok(())
}

fn run(config: &SimConfig, skip_after: Option<u64>) -> anyhow::Result<()> {
    let session = Session::new(config)?;
    let summary = session.run(skip_after);

    println!();
    println!(
        "Started {} tracks, delivered {} of {} frames",
        summary.tracks_started, summary.delivered, summary.polls
    );
    println!("Loss: {}", summary.loss);

    session.close();
    Ok(())
}

fn history(config: &SimConfig, start: usize, end: Option<usize>) -> anyhow::Result<()> {
    let session = Session::new(config)?;
    session.run(config.skip_after_frames);

    let page = session.history(start, end);
    println!();
    if page.is_empty() {
        println!(
            "No history entries in that range ({} recorded)",
            session.player().track_count_in_history()
        );
    } else {
        println!("Recently played:");
        for (i, context) in page.iter().enumerate() {
            println!("  {}. {} [{}]", start + i + 1, context.effective_title(), context.id);
        }
    }

    session.close();
    Ok(())
}
