//! One-shot sync run without the HTTP server.
//!
//! Usage: `run_sync [full|members|bills|dedup]` (defaults to `full`).

use std::sync::Arc;

use rust_lawgg_sync::config::Config;
use rust_lawgg_sync::db::Database;
use rust_lawgg_sync::db_storage::PgStore;
use rust_lawgg_sync::models::SyncMode;
use rust_lawgg_sync::sync_job::{SyncContext, SyncOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_lawgg_sync=info,run_sync=info".into()),
        )
        .init();

    let mode: SyncMode = match std::env::args().nth(1) {
        Some(arg) => serde_json::from_value(serde_json::Value::String(arg.to_lowercase()))
            .map_err(|_| anyhow::anyhow!("Unknown mode {:?}; use full, members, bills or dedup", arg))?,
        None => SyncMode::Full,
    };

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    let store = PgStore::new(db.pool.clone());
    let context = SyncContext::new(config, Arc::new(store.clone()), Arc::new(store))?;

    tracing::info!("Running {:?} sync", mode);
    let status = SyncOrchestrator::new(context).run_to_completion(mode).await?;

    if let Some(error) = status.error {
        anyhow::bail!("Sync failed: {}", error);
    }
    tracing::info!("{}", status.message);

    Ok(())
}
