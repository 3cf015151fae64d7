//! Operator dashboard metrics.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use loka_core::catalog::Product;
use loka_core::order::Order;
use loka_core::{Money, OrderStatus};

use crate::db::{CatalogStore, LoginHistoryStore, OrderStore, ProductFilter, RepositoryError};

/// Store-wide numbers shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardMetrics {
    pub categories: usize,
    pub products: usize,
    pub products_with_image: usize,
    /// Share of products with a photo, 0-100.
    pub image_completeness: u8,
    pub low_stock: usize,
    /// Σ list price over all products.
    pub stock_value: Money,
    pub pending_orders: usize,
    pub paid_orders: usize,
    pub completed_orders: usize,
    pub cancelled_orders: usize,
    pub revenue_total: Money,
    pub revenue_today: Money,
    pub revenue_month: Money,
    pub logins_total: i64,
    pub logins_today: i64,
    pub active_sessions: i64,
}

/// Start of the day and of the month containing `now`, in `offset` local time.
fn period_starts(now: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local = now.with_timezone(&offset).date_naive();
    let month = local.with_day(1).unwrap_or(local);
    let start = |date: chrono::NaiveDate| {
        offset
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .map_or(now, |dt| dt.with_timezone(&Utc))
    };
    (start(local), start(month))
}

fn revenue<'a>(orders: impl Iterator<Item = &'a Order>, since: Option<DateTime<Utc>>) -> Money {
    orders
        .filter(|o| o.status.counts_as_revenue())
        .filter(|o| since.is_none_or(|since| o.created_at >= since))
        .map(|o| o.total_amount)
        .sum()
}

fn percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    u8::try_from(part * 100 / whole).unwrap_or(100)
}

impl DashboardMetrics {
    /// Collect metrics as of `now`, with day and month boundaries taken in
    /// the store's local `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if any store query fails.
    pub async fn collect<S>(
        store: &S,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<Self, RepositoryError>
    where
        S: CatalogStore + OrderStore + LoginHistoryStore,
    {
        let categories = store.list_categories().await?.len();
        let products = store.list_products(&ProductFilter::default()).await?;
        let orders = store.list_orders(None, None).await?;
        let (today, month) = period_starts(now, offset);
        let logins = store.login_stats(today).await?;

        let with_image = products.iter().filter(|p| p.has_image()).count();
        let count = |status: OrderStatus| orders.iter().filter(|o| o.status == status).count();

        Ok(Self {
            categories,
            products: products.len(),
            products_with_image: with_image,
            image_completeness: percentage(with_image, products.len()),
            low_stock: products.iter().filter(|p| p.is_low_stock()).count(),
            stock_value: products.iter().map(|p: &Product| p.price).sum(),
            pending_orders: count(OrderStatus::Pending),
            paid_orders: count(OrderStatus::Paid),
            completed_orders: count(OrderStatus::Completed),
            cancelled_orders: count(OrderStatus::Cancelled),
            revenue_total: revenue(orders.iter(), None),
            revenue_today: revenue(orders.iter(), Some(today)),
            revenue_month: revenue(orders.iter(), Some(month)),
            logins_total: logins.total,
            logins_today: logins.since,
            active_sessions: logins.active,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_period_starts_use_local_offset() {
        let wita = FixedOffset::east_opt(8 * 3600).unwrap();
        // 2026-03-01 17:30 UTC is already 2 March in UTC+8.
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 17, 30, 0).unwrap();
        let (today, month) = period_starts(now, wita);
        assert_eq!(today, Utc.with_ymd_and_hms(2026, 3, 1, 16, 0, 0).unwrap());
        assert_eq!(month, Utc.with_ymd_and_hms(2026, 2, 28, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(4, 4), 100);
    }
}
