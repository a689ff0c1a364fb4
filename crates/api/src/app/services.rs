//! Ledger wiring for the HTTP layer.

use std::sync::Arc;

use stockwatch_core::{Clock, SystemClock};
use stockwatch_infra::event_store::{EventStore, InMemoryEventStore};
use stockwatch_infra::StockLedger;

use crate::config::ServiceConfig;

#[cfg(feature = "postgres")]
use anyhow::Context;
#[cfg(feature = "postgres")]
use sqlx::postgres::PgPoolOptions;
#[cfg(feature = "postgres")]
use stockwatch_infra::event_store::PostgresEventStore;

/// Shared services behind every handler.
#[derive(Debug)]
pub struct AppServices {
    ledger: StockLedger<Arc<dyn EventStore>>,
}

impl AppServices {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, config: &ServiceConfig) -> Self {
        let ledger = StockLedger::new(store, clock, config.detection.clone()).with_config(config.ledger.clone());
        Self { ledger }
    }

    /// In-memory store and system clock.
    pub fn in_memory(config: &ServiceConfig) -> Self {
        Self::new(Arc::new(InMemoryEventStore::new()), Arc::new(SystemClock), config)
    }

    pub fn ledger(&self) -> &StockLedger<Arc<dyn EventStore>> {
        &self.ledger
    }
}

#[cfg(not(feature = "postgres"))]
pub async fn build_services(config: &ServiceConfig) -> anyhow::Result<AppServices> {
    tracing::info!("using in-memory event store");
    Ok(AppServices::in_memory(config))
}

#[cfg(feature = "postgres")]
pub async fn build_services(config: &ServiceConfig) -> anyhow::Result<AppServices> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory event store");
        return Ok(AppServices::in_memory(config));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("connecting to postgres")?;
    let store = PostgresEventStore::new(pool);
    store.ensure_schema().await.context("applying event store schema")?;

    let services = AppServices::new(Arc::new(store), Arc::new(SystemClock), config);
    // Read models live in memory; replay the store so they match it.
    let replayed = services
        .ledger()
        .rebuild_read_models()
        .context("rebuilding read models")?;
    tracing::info!(events = replayed, "using postgres event store");
    Ok(services)
}
