use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use coordinator_config::Config;
use tracing_subscriber::EnvFilter;

mod demo;

#[derive(Parser)]
#[command(name = "coordinator-demo", about = "Drives the workers coordinator against an in-memory transport")]
struct CliArgs {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the coordinator and let it consume synthetic messages.
    Run {
        /// Path to a TOML configuration file. Falls back to built-in defaults if omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop automatically after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        duration_seconds: Option<u64>,
    },
    /// Print the fully resolved configuration without running anything.
    ShowConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Config {
    match path {
        Some(path) => Config::load_from_path(&path).unwrap_or_else(|error| {
            eprintln!("failed to load configuration from {}: {error:?}", path.display());
            std::process::exit(1);
        }),
        None => Config::default_for_demo(),
    }
}

fn init_tracing(filter_directives: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter_directives))
        .init();
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    match args.command {
        CliCommand::Run {
            config,
            duration_seconds,
        } => {
            let config = load_config(config);
            init_tracing(&config.logging.filter_directives);

            let duration = duration_seconds.map(Duration::from_secs);
            demo::run(config, duration).await;
        }
        CliCommand::ShowConfig { config } => {
            let config = load_config(config);
            demo::show_config(&config);
        }
    }
}
