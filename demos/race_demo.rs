//! Mutation Race Demo Application
//!
//! Fires two overlapping mutations at a counter whose server answers with
//! different delays, then shows that the cache ends on the server's state
//! after a single revalidation rather than on whichever commit finished last.
//!
//! Usage:
//!   cargo run --example race_demo
//!
//! Environment variables:
//!   RUST_LOG - Log filter (default: info,spree=debug)

use spree::{CacheConfig, MutationOptions, Query, ResultCell};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,spree=debug")),
        )
        .init();

    info!("=== Spree Mutation Race Demo ===");

    let counter = Arc::new(AtomicI64::new(0));
    let fetches = Arc::new(AtomicUsize::new(0));

    let loader_counter = counter.clone();
    let loader_fetches = fetches.clone();
    let query = Query::with_config(
        move |_name: &'static str| {
            let counter = loader_counter.clone();
            loader_fetches.fetch_add(1, Ordering::SeqCst);
            async move { anyhow::Ok(counter.load(Ordering::SeqCst)) }
        },
        CacheConfig::small(),
    )?;

    let spree = query.spree("clicks")?;
    spree.load().await?;

    spree.subscribe(|cell: &ResultCell<i64>| {
        if let Some(value) = cell.value() {
            info!("View shows {}", value);
        }
    });

    // Each commit increments on the server, then answers with the value it
    // saw. The slow one answers with an out-of-date value.
    let commit = |delay_ms: u64| {
        let counter = counter.clone();
        move || async move {
            let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            anyhow::Ok(seen)
        }
    };

    let (slow, fast) = tokio::join!(
        spree.mutate(commit(400), MutationOptions::optimistic(1)),
        spree.mutate(commit(100), MutationOptions::optimistic(2)),
    );

    info!("Slow mutation was last in flight: {}", slow?);
    info!("Fast mutation was last in flight: {}", fast?);
    info!(
        "Server holds {}, cache holds {:?}, loader ran {} time(s)",
        counter.load(Ordering::SeqCst),
        spree.cell().value(),
        fetches.load(Ordering::SeqCst)
    );

    Ok(())
}
