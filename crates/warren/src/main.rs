//! Warren: background monitors for broker servers, licenses and releases
//!
//! Main binary with subcommands:
//! - `daemon`: Run every monitor on its own interval until ctrl-c
//! - `check-once`: Run one cycle of every monitor and print the summaries

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod daemon;
mod http;
mod monitors;
mod notify;
mod store;

use config::{DaemonConfig, MonitorArgs};

#[derive(Parser)]
#[command(name = "warren")]
#[command(about = "Background monitors for Warren", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor daemon
    Daemon {
        #[command(flatten)]
        args: MonitorArgs,
    },

    /// Run one cycle of every monitor and print a JSON summary
    CheckOnce {
        #[command(flatten)]
        args: MonitorArgs,
    },
}

fn load_config(args: MonitorArgs) -> Result<DaemonConfig> {
    DaemonConfig::from_args(args).map_err(|e| miette::miette!("invalid configuration: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "warren=info,warren_scheduler=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { args } => daemon::run(load_config(args)?).await,

        Commands::CheckOnce { args } => {
            let summaries = daemon::check_once(load_config(args)?).await?;
            let json = serde_json::to_string_pretty(&summaries)
                .map_err(|e| miette::miette!("failed to serialize summaries: {}", e))?;
            println!("{}", json);
            Ok(())
        }
    }
}
