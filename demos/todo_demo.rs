//! Todo List Demo Application
//!
//! Loads a todo list through a query, watches it, and applies an optimistic
//! mutation against a simulated server.
//!
//! Usage:
//!   cargo run --example todo_demo
//!
//! Environment variables:
//!   RUST_LOG                    - Log filter (default: info,spree=debug)
//!   SPREE_CACHE_MAX_ENTRIES     - Cache capacity (default: 1000)
//!   SPREE_CACHE_ENABLE_METRICS  - Collect cache statistics (default: true)

use parking_lot::Mutex;
use spree::{CacheConfig, MutationOptions, Query, ResultCell, Suspense};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
struct Todo {
    id: u32,
    title: String,
    done: bool,
}

/// Stand-in for a remote todo service
#[derive(Clone, Default)]
struct TodoServer {
    todos: Arc<Mutex<Vec<Todo>>>,
}

impl TodoServer {
    async fn list(&self, owner: String) -> anyhow::Result<Vec<Todo>> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        info!("Server: listing todos for {}", owner);
        Ok(self.todos.lock().clone())
    }

    async fn add(&self, title: &str) -> anyhow::Result<Vec<Todo>> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut todos = self.todos.lock();
        let id = todos.len() as u32 + 1;
        todos.push(Todo {
            id,
            title: title.to_string(),
            done: false,
        });
        Ok(todos.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,spree=debug")),
        )
        .init();

    info!("=== Spree Todo Demo ===");

    let config = CacheConfig::from_env()?;
    let server = TodoServer::default();

    let loader_server = server.clone();
    let todos = Query::with_config(
        move |owner: String| {
            let server = loader_server.clone();
            async move { server.list(owner).await }
        },
        config,
    )?;

    let spree = todos.spree("ada".to_string())?;
    info!("Key for ada's todos: {}", spree.key());

    let subscription = spree.subscribe(|cell: &ResultCell<Vec<Todo>>| match cell {
        ResultCell::Pending(_) => info!("View: loading..."),
        ResultCell::Resolved(todos) => info!("View: {} todo(s) {:?}", todos.len(), todos),
        ResultCell::Rejected(e) => info!("View: failed to load: {}", e),
    });

    // First render suspends until the list arrives
    if let Suspense::NotReady(load) = spree.read() {
        info!("Render suspended, waiting for the loader");
        load.await?;
    }

    info!("\n--- Optimistic add ---");
    let mut draft = spree.load().await?;
    draft.push(Todo {
        id: 0,
        title: "Write the demo".to_string(),
        done: false,
    });

    let mutation_server = server.clone();
    let last = spree
        .mutate(
            move || async move { mutation_server.add("Write the demo").await },
            MutationOptions::optimistic(draft),
        )
        .await?;
    info!("Mutation was the last in flight: {}", last);

    info!("\n--- Cache statistics ---");
    info!("{}", todos.cache().stats());

    subscription.unsubscribe();
    Ok(())
}
