//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::PgStore;
use crate::services::cart::CartLocks;
use crate::services::payment::{GatewayError, MidtransGateway};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] GatewayError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store, the gateway client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: PgStore,
    gateway: MidtransGateway,
    cart_locks: CartLocks,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment gateway client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, AppStateError> {
        let gateway = MidtransGateway::new(&config.payment)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store: PgStore::new(pool),
                gateway,
                cart_locks: CartLocks::default(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.store.pool()
    }

    /// Catalog, order and login-history store.
    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    /// Payment gateway client.
    #[must_use]
    pub fn gateway(&self) -> &MidtransGateway {
        &self.inner.gateway
    }

    /// Per-session cart locks.
    #[must_use]
    pub fn cart_locks(&self) -> &CartLocks {
        &self.inner.cart_locks
    }
}
