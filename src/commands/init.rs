//! Startup check: can the client work with the data it has?

use clap::Args;

use super::OutputFormat;
use crate::context::AppContext;

/// Load data from the server, or fall back to the local cache
#[derive(Args)]
pub struct InitCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl InitCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        let initializer = ctx.initializer();
        let ready = initializer.initialize().await;
        let stats = initializer.cache_stats().await?;

        match self.format {
            OutputFormat::Json => {
                let report = serde_json::json!({
                    "ready": ready,
                    "online": ctx.connectivity.is_online(),
                    "cache": stats,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Text => {
                if ready {
                    println!("Data ready.");
                    println!();
                    println!("  customers:  {}", stats.customers);
                    println!("  orders:     {}", stats.orders);
                    println!("  employees:  {}", stats.employees);
                    println!("  suit types: {}", stats.suit_types);
                    if stats.pending_sync > 0 {
                        println!();
                        println!("{} change(s) waiting to sync.", stats.pending_sync);
                    }
                }
            }
        }

        if !ready {
            return Err(
                "No data available: the server could not be reached and the local cache is empty"
                    .into(),
            );
        }
        Ok(())
    }
}
