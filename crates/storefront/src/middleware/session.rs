//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions.

use sqlx::PgPool;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "loka_session";

/// Session lifetime for "remember me" logins and idle carts (14 days).
pub const SESSION_EXPIRY_SECONDS: i64 = 14 * 24 * 60 * 60;

/// Inactivity expiry used by default and for "remember me" logins.
#[must_use]
pub const fn remembered_expiry() -> Expiry {
    Expiry::OnInactivity(Duration::seconds(SESSION_EXPIRY_SECONDS))
}

/// Create the `PostgreSQL` session store.
///
/// The `tower_sessions.session` table is created by `PostgresStore::migrate`,
/// which the CLI `migrate` command runs.
#[must_use]
pub fn create_session_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
}

/// Create the session layer over the `PostgreSQL` store.
#[must_use]
pub fn create_session_layer(
    store: PostgresStore,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(remembered_expiry())
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
