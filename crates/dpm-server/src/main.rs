//! DPM Server: process entry point.

mod bootstrap;
mod config;

use anyhow::{Context, Result};
use dpm_core::events::EventSink;
use dpm_db::{DbManager, SurrealStore};
use dpm_service::{BroadcastEventSink, LogEventSink};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::Bootstrapper;
use crate::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dpm=info".parse()?))
        .json()
        .init();

    info!("Starting DPM server...");

    let settings = Settings::load().context("Failed to load configuration")?;

    let db = DbManager::connect(&settings.database)
        .await
        .context("Failed to connect to SurrealDB")?;
    dpm_db::run_migrations(db.client())
        .await
        .context("Failed to apply schema migrations")?;
    let store = SurrealStore::new(db.client().clone());

    // Forward resource events to the log until the channel closes.
    let events = BroadcastEventSink::new(settings.events.capacity);
    let mut rx = events.subscribe();
    let forwarder = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => LogEventSink.publish(event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    Bootstrapper::new(store, events.clone(), settings.auth.clone())
        .seed(&settings.bootstrap)
        .await
        .context("Bootstrap seeding failed")?;

    info!("DPM server ready");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    drop(events);
    forwarder.await.context("Event forwarder panicked")?;
    info!("DPM server stopped.");
    Ok(())
}
