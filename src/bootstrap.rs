//! Process startup: env loading, tracing, and component wiring.
//!
//! Env vars are loaded from the process environment with a local `.env`
//! as fallback (dotenvy never overwrites existing vars). Store selection
//! follows `DATABASE_URL`: present and built with the `postgres` feature,
//! the PostgreSQL backend is used; otherwise the in-memory store.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::custody::KeyCustody;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::rpc::{JsonRpcClient, LedgerRpc};
use crate::store::memory::MemoryStore;
use crate::store::Store;

/// Install the global tracing subscriber. `RUST_LOG` controls verbosity;
/// defaults to `info` for this crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("solbundle=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load `.env` (if present) and resolve the full configuration.
pub fn load_config() -> Result<Config> {
    let _ = dotenvy::dotenv();
    Ok(Config::from_env()?)
}

/// Wire up the orchestrator from configuration.
pub async fn build_orchestrator(config: Config) -> Result<Orchestrator> {
    let custody = Arc::new(KeyCustody::new(&config.custody)?);
    let rpc: Arc<dyn LedgerRpc> = Arc::new(JsonRpcClient::new(&config.rpc)?);

    let store: Arc<dyn Store> = match &config.database {
        #[cfg(feature = "postgres")]
        Some(database) => {
            tracing::info!("using the PostgreSQL store");
            Arc::new(crate::store::postgres::PgStore::connect(database, config.pending.ttl).await?)
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!(
                "DATABASE_URL is set but the postgres feature is disabled; \
                 pending requests and history will not survive a restart"
            );
            Arc::new(MemoryStore::new(config.pending.ttl))
        }
        None => {
            tracing::warn!(
                "no DATABASE_URL configured; pending requests and history \
                 will not survive a restart"
            );
            Arc::new(MemoryStore::new(config.pending.ttl))
        }
    };

    Ok(Orchestrator::new(store, rpc, custody, config))
}
