//! services/bot/src/adapters/store.rs
//!
//! Picks the session store backend once, at startup.

use crate::adapters::db::PgSessionStore;
use crate::config::Config;
use lead_bot_core::memory::MemorySessionStore;
use lead_bot_core::ports::SessionStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Returns the durable store when the database is reachable, otherwise the volatile one.
///
/// The choice holds for the lifetime of the process.
pub async fn connect_session_store(config: &Config) -> Arc<dyn SessionStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL is not set. Using in-memory session storage; data will be lost on restart.");
        return Arc::new(MemorySessionStore::new());
    };

    match PgSessionStore::connect(database_url, config.db_max_connections).await {
        Ok(store) => {
            info!("Using PostgreSQL session storage.");
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                error = %e,
                "Durable session storage unavailable. Falling back to in-memory storage; data will be lost on restart."
            );
            Arc::new(MemorySessionStore::new())
        }
    }
}
