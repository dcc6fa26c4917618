//! Sync CLI commands: replay queued changes and refresh the cache.

use clap::{Args, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};

use std::time::Duration;

use tailorshop_core::remote::get_with_timeout;
use tailorshop_core::{
    Connectivity, EntityKind, RemoteApi, SkipReason, SyncEvent, SyncOutcome, SyncReport,
};

use crate::context::AppContext;

/// Sync with remote server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show server settings, cache counts and queued changes
    Status,

    /// Keep syncing in the background until interrupted
    Watch,
}

impl SyncCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => self.sync(ctx).await,
            Some(SyncSubcommand::Status) => self.status(ctx).await,
            Some(SyncSubcommand::Watch) => self.watch(ctx).await,
        }
    }

    async fn sync(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        let service = ctx.sync_service();
        let events = service.subscribe();

        println!("Syncing with {}...", ctx.endpoints.base_url());
        let printer = tokio::spawn(print_events(events, true));

        match service.sync().await {
            SyncOutcome::Completed(report) => {
                let _ = printer.await;
                println!();
                print_report(&report);
                Ok(())
            }
            SyncOutcome::Skipped(reason) => {
                printer.abort();
                match reason {
                    SkipReason::Offline => Err("Offline: nothing was synced".into()),
                    SkipReason::AlreadyRunning => {
                        println!("A sync is already in progress.");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn status(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        println!("Sync Status");
        println!("===========");
        println!();

        println!("Server:   {}", ctx.endpoints.base_url());
        println!(
            "Mode:     {}",
            if ctx.connectivity.is_online() {
                "online"
            } else {
                "offline"
            }
        );
        println!("Interval: {}s", ctx.config.sync.interval_secs);
        println!();

        let stats = ctx.store.stats().await?;
        println!("Cached records:");
        println!("  customers:  {}", stats.customers);
        println!("  orders:     {}", stats.orders);
        println!("  employees:  {}", stats.employees);
        println!("  suit types: {}", stats.suit_types);
        println!();

        let queue = ctx.store.list_queue().await?;
        if queue.is_empty() {
            println!("No pending changes.");
            return Ok(());
        }

        println!("Pending changes ({}):", queue.len());
        for op in &queue {
            let retries = if op.retries > 0 {
                format!(" (retried {}x)", op.retries)
            } else {
                String::new()
            };
            println!("  #{} {} {}{}", op.id, op.kind, op.url, retries);
        }

        Ok(())
    }

    async fn watch(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        let service = ctx.sync_service();
        let events = service.subscribe();

        println!(
            "Watching {} (every {}s). Press Ctrl-C to stop.",
            ctx.endpoints.base_url(),
            ctx.config.sync.interval_secs
        );
        service.start();

        tokio::select! {
            _ = print_events(events, false) => {}
            _ = watch_connectivity(ctx) => {}
            result = tokio::signal::ctrl_c() => result?,
        }

        println!("Stopping; waiting for the current pass to finish...");
        service.stop().await;
        println!();
        println!("Stopped.");
        Ok(())
    }
}

/// Keeps the believed online state current by polling the server on the
/// sync interval. A failed poll marks the client offline; the next
/// successful one flips it back, which wakes the sync service.
async fn watch_connectivity(ctx: &AppContext) {
    if ctx.forced_offline {
        return std::future::pending().await;
    }

    let url = ctx.endpoints.collection(EntityKind::Customers);
    let mut ticker = tokio::time::interval(ctx.config.sync.interval());
    ticker.tick().await;
    loop {
        ticker.tick().await;
        probe_once(
            ctx.remote.as_ref(),
            &url,
            ctx.config.sync.fetch_timeout(),
            &ctx.connectivity,
        )
        .await;
    }
}

async fn probe_once(
    remote: &dyn RemoteApi,
    url: &str,
    limit: Duration,
    connectivity: &Connectivity,
) -> bool {
    let reachable = match get_with_timeout(remote, url, limit).await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("Server check failed: {}", e);
            false
        }
    };

    if reachable != connectivity.is_online() {
        tracing::info!(
            "Server is {}",
            if reachable { "reachable again" } else { "unreachable" }
        );
        println!("{}", if reachable { "Back online" } else { "Offline" });
    }
    connectivity.set_online(reachable);
    reachable
}

/// Prints sync events. With `once`, returns after the first completed pass.
async fn print_events(mut events: broadcast::Receiver<SyncEvent>, once: bool) {
    loop {
        match events.recv().await {
            Ok(SyncEvent::Started) => {
                if !once {
                    println!("Sync started");
                }
            }
            Ok(SyncEvent::Progress(percent)) => {
                if once {
                    println!("  {:>3}%", percent);
                }
            }
            Ok(SyncEvent::OperationSynced(op)) => {
                println!("  ✓ {} {}", op.kind, op.url);
            }
            Ok(SyncEvent::OperationAbandoned(op)) => {
                println!(
                    "  ✗ {} {} gave up after {} attempts; the local change will not reach the server",
                    op.kind, op.url, op.retries
                );
            }
            Ok(SyncEvent::Completed(report)) => {
                if once {
                    return;
                }
                print_report(&report);
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return,
        }
    }
}

fn print_report(report: &SyncReport) {
    if let Some(error) = &report.error {
        println!("Sync stopped early: {}", error);
    }
    println!(
        "Replayed {}, failed {}, abandoned {}; refreshed {} of {} collections.",
        report.replayed,
        report.failed,
        report.abandoned,
        report.refreshed.len(),
        EntityKind::ALL.len()
    );
}
