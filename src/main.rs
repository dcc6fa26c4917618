use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod context;

use commands::{
    CacheCommand, ConfigCommand, CreateCommand, DeleteCommand, GetCommand, InitCommand,
    SyncCommand, UpdateCommand,
};
use config::Config;
use context::AppContext;

#[derive(Parser)]
#[command(name = "tailorshop")]
#[command(version)]
#[command(about = "Tailor shop client with offline caching and background sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Work from the local cache without contacting the server
    #[arg(long, global = true)]
    offline: bool,

    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load data from the server or the local cache
    Init(InitCommand),

    /// Fetch customers, orders, employees or suit types
    Get(GetCommand),

    /// Create a record
    Create(CreateCommand),

    /// Update a record
    Update(UpdateCommand),

    /// Delete a record
    Delete(DeleteCommand),

    /// Replay queued changes and refresh the cache
    Sync(SyncCommand),

    /// Inspect or clear the local cache
    Cache(CacheCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Save config path for config init
    let cli_config_path = cli.config.clone();

    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config, cli_config_path),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let ctx = AppContext::open(&config, cli.offline).await?;

    match command {
        Commands::Init(cmd) => cmd.run(&ctx).await,
        Commands::Get(cmd) => cmd.run(&ctx).await,
        Commands::Create(cmd) => cmd.run(&ctx).await,
        Commands::Update(cmd) => cmd.run(&ctx).await,
        Commands::Delete(cmd) => cmd.run(&ctx).await,
        Commands::Sync(cmd) => cmd.run(&ctx).await,
        Commands::Cache(cmd) => cmd.run(&ctx).await,
        Commands::Config(_) => Ok(()),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "tailorshop=info,tailorshop_core=info"
    } else {
        "tailorshop=warn,tailorshop_core=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
