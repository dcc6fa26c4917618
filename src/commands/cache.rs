use clap::{Args, Subcommand};
use std::io::{self, Write};

use super::OutputFormat;
use crate::context::AppContext;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// Show cached record counts and pending changes
    Stats {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete all cached records and pending changes
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

impl CacheCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        let initializer = ctx.initializer();

        match &self.command {
            CacheSubcommand::Stats { format } => {
                let stats = initializer.cache_stats().await?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                    OutputFormat::Text => {
                        println!("Cache: {}", ctx.config.database_path.value.display());
                        println!();
                        println!("  customers:    {}", stats.customers);
                        println!("  orders:       {}", stats.orders);
                        println!("  employees:    {}", stats.employees);
                        println!("  suit types:   {}", stats.suit_types);
                        println!("  pending sync: {}", stats.pending_sync);
                    }
                }
                Ok(())
            }

            CacheSubcommand::Clear { force } => {
                let pending = initializer.cache_stats().await?.pending_sync;

                if !force {
                    if pending > 0 {
                        println!(
                            "Warning: {} unsynced change(s) will be lost.",
                            pending
                        );
                    }
                    print!("Clear the local cache? [y/N] ");
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Cancelled.");
                        return Ok(());
                    }
                }

                initializer.clear_cache().await?;
                println!("Cache cleared.");
                Ok(())
            }
        }
    }
}
