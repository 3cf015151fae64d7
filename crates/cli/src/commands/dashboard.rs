//! Operator dashboard metrics.
//!
//! # Usage
//!
//! ```bash
//! loka dashboard                     # day/month boundaries in UTC+8
//! loka dashboard --utc-offset-hours 7
//! ```

use chrono::{FixedOffset, Utc};
use tracing::info;

use loka_storefront::services::reports::DashboardMetrics;

use super::{CommandError, connect};

/// Convert an hour offset into a timezone.
///
/// # Errors
///
/// Returns `InvalidInput` outside -23..=23 hours.
pub fn offset_from_hours(hours: i32) -> Result<FixedOffset, CommandError> {
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| CommandError::InvalidInput(format!("UTC offset {hours}h out of range")))
}

/// Collect and log dashboard metrics.
///
/// # Errors
///
/// Returns an error for an invalid offset or a database failure.
pub async fn show(utc_offset_hours: i32) -> Result<(), CommandError> {
    let offset = offset_from_hours(utc_offset_hours)?;
    let store = connect().await?;
    let m = DashboardMetrics::collect(&store, Utc::now(), offset).await?;

    info!("Catalog");
    info!("  Categories: {}", m.categories);
    info!(
        "  Products: {} ({} with images, {}% complete)",
        m.products, m.products_with_image, m.image_completeness
    );
    info!("  Low stock (< 10): {}", m.low_stock);
    info!("  Stock value: {}", m.stock_value.display_idr());
    info!("Orders");
    info!("  Pending: {}", m.pending_orders);
    info!("  Paid: {}", m.paid_orders);
    info!("  Completed: {}", m.completed_orders);
    info!("  Cancelled: {}", m.cancelled_orders);
    info!("Revenue (paid + completed)");
    info!("  All time: {}", m.revenue_total.display_idr());
    info!("  This month: {}", m.revenue_month.display_idr());
    info!("  Today: {}", m.revenue_today.display_idr());
    info!("Logins");
    info!("  Total: {}", m.logins_total);
    info!("  Today: {}", m.logins_today);
    info!("  Active sessions: {}", m.active_sessions);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_from_hours() {
        assert_eq!(offset_from_hours(8).unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(offset_from_hours(-5).unwrap().local_minus_utc(), -5 * 3600);
        assert!(offset_from_hours(30).is_err());
    }
}
