//! task-notify CLI - Main entry point

mod demo;

use clap::{Parser, Subcommand};
use demo::{DemoPlan, Outcome};
use std::path::PathBuf;
use std::time::Duration;
use task_notify_foundation::{project_config_path, NotifyConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// task-notify - watch an asynchronous computation through change notifications
#[derive(Parser, Debug)]
#[command(name = "task-notify")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Settings file (defaults to .task-notify/settings.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a demo computation and print every notification
    Run {
        /// How the computation ends
        #[arg(long, value_enum, default_value_t = Outcome::Success)]
        outcome: Outcome,

        /// Time the computation takes before it settles
        #[arg(long, default_value_t = 200)]
        delay_ms: u64,

        /// Value produced on success
        #[arg(long, default_value_t = 42, allow_negative_numbers = true)]
        value: i64,

        /// Observer label (overrides the settings file)
        #[arg(long)]
        label: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = match &args.config {
        Some(path) => NotifyConfig::load(path)?,
        None => NotifyConfig::load_or_default(&project_config_path(&std::env::current_dir()?))?,
    };

    match args.command {
        Command::Run {
            outcome,
            delay_ms,
            value,
            label,
        } => {
            let config = match label {
                Some(label) => config.with_label(label),
                None => config,
            };
            let plan = DemoPlan {
                outcome,
                delay: Duration::from_millis(delay_ms),
                value,
            };

            let snapshot = demo::run(config, plan).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}
