//! Login history listing and retention.
//!
//! # Usage
//!
//! ```bash
//! loka login-history list --limit 50
//! loka login-history purge --days 30
//! ```

use chrono::{Duration, Utc};
use tracing::info;

use loka_storefront::db::LoginHistoryStore;

use super::{CommandError, connect};

/// Log the most recent logins.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn list(limit: i64) -> Result<(), CommandError> {
    let store = connect().await?;
    let records = store.recent_logins(limit).await?;

    for record in &records {
        info!(
            "{}  {} <{}>  {}  {} / {} / {}  {}",
            record.login_time.format("%Y-%m-%d %H:%M"),
            record.name,
            record.email,
            record.ip_address,
            record.device.browser,
            record.device.os,
            record.device.device,
            record.duration_label(),
        );
    }
    Ok(())
}

/// Delete records that logged in more than `days` days ago.
///
/// # Errors
///
/// Returns an error for a zero or negative window or a database failure.
pub async fn purge(days: i64) -> Result<(), CommandError> {
    if days <= 0 {
        return Err(CommandError::InvalidInput("days must be positive".to_string()));
    }

    let cutoff = Utc::now() - Duration::days(days);
    let store = connect().await?;
    let deleted = store.purge_before(cutoff).await?;
    info!(deleted, days, "Purged old login records");
    Ok(())
}
