use clap::{Parser, Subcommand};
use studytimer_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "studytimer-cli", version, about = "Study Timer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Study session timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Sleep and mood logs
    Log {
        #[command(subcommand)]
        action: commands::log::LogAction,
    },
    /// Past study sessions
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// `STUDYTIMER_LOG` wins over `fallback_level`. Logs go to stderr so
/// stdout stays machine readable.
fn init_tracing(fallback_level: &str) {
    let filter = EnvFilter::try_from_env("STUDYTIMER_LOG")
        .or_else(|_| EnvFilter::try_new(fallback_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Config commands must keep working on a broken config file so it can
    // be repaired or reset.
    let command = match cli.command {
        Commands::Config { action } => {
            init_tracing("info");
            return commands::config::run(action);
        }
        other => other,
    };

    let config = Config::load()?;
    init_tracing(&config.logging.level);
    tracing::debug!(level = %config.logging.level, "configuration loaded");

    match command {
        Commands::Timer { action } => commands::timer::run(action, &config).await,
        Commands::Log { action } => commands::log::run(action, &config),
        Commands::History { json } => commands::history::run(json, &config).await,
        Commands::Config { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
