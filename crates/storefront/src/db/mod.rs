//! Persistence for catalog, orders and login history.
//!
//! # Database: `loka`
//!
//! ## Tables (schema `storefront`)
//!
//! - `category`, `product` - the catalog
//! - `customer_order`, `order_item` - orders and their lines
//! - `login_history` - login/logout audit trail
//! - `tower_sessions` - session storage
//!
//! Access goes through three store traits so services can run against
//! [`PgStore`] in production and [`MemoryStore`] in tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p loka-cli -- migrate
//! ```

pub mod catalog;
pub mod login_history;
pub mod memory;
pub mod orders;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use loka_core::audit::{LoginRecord, NewLoginRecord};
use loka_core::catalog::{Category, NewCategory, NewProduct, Product};
use loka_core::order::{NewOrder, Order, OrderItem};
use loka_core::{CategoryId, Email, LoginRecordId, OrderId, OrderNumber, OrderStatus, ProductId};

pub use memory::MemoryStore;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be turned back into a domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to [`RepositoryError::Conflict`].
    fn from_insert(err: sqlx::Error, what: &str) -> Self {
        let unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");
        if unique_violation {
            Self::Conflict(format!("{what} already exists"))
        } else {
            Self::Database(err)
        }
    }
}

/// Outcome of a conditional stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAdjustment {
    /// The change was applied; `remaining` is the new stock.
    Applied { remaining: i32 },
    /// A decrement was refused because stock was lower than requested.
    Insufficient { available: i32 },
    /// The product no longer exists.
    Missing,
}

/// Filter for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub active_only: bool,
    pub with_image_only: bool,
    pub category: Option<CategoryId>,
    pub exclude: Option<ProductId>,
    pub limit: Option<i64>,
}

impl ProductFilter {
    /// Active products visible to customers.
    #[must_use]
    pub fn storefront() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    /// Whether `product` passes every criterion except the limit.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        (!self.active_only || product.is_active)
            && (!self.with_image_only || product.has_image())
            && self.category.is_none_or(|c| product.category_id == c)
            && self.exclude != Some(product.id)
    }
}

/// Login counters for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginStats {
    pub total: i64,
    pub since: i64,
    pub active: i64,
}

/// Categories and products.
pub trait CatalogStore: Send + Sync {
    fn list_categories(&self) -> impl Future<Output = Result<Vec<Category>, RepositoryError>> + Send;

    fn create_category(
        &self,
        new: &NewCategory,
    ) -> impl Future<Output = Result<Category, RepositoryError>> + Send;

    /// Delete a category and, by cascade, its products. Returns whether it existed.
    fn delete_category(
        &self,
        id: CategoryId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    fn create_product(
        &self,
        new: &NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Overwrite stock. Returns whether the product existed.
    fn set_stock(
        &self,
        id: ProductId,
        stock: i32,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Current stock for each product that still exists.
    fn stock_levels(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<HashMap<ProductId, i32>, RepositoryError>> + Send;

    /// Add `delta` to stock in a single conditional statement. Decrements
    /// only apply when stock covers them.
    fn adjust_stock(
        &self,
        id: ProductId,
        delta: i32,
    ) -> impl Future<Output = Result<StockAdjustment, RepositoryError>> + Send;
}

/// Orders and their items.
pub trait OrderStore: Send + Sync {
    /// Insert the order and all of its items, or nothing.
    fn create_order(
        &self,
        new: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn get_order(
        &self,
        number: &OrderNumber,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn order_items(
        &self,
        order: OrderId,
    ) -> impl Future<Output = Result<Vec<OrderItem>, RepositoryError>> + Send;

    /// A customer's orders, newest first.
    fn orders_for_customer(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// All orders, newest first, optionally filtered by status.
    fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: Option<i64>,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Move an order from `from` to `to` only if it is still in `from`.
    /// Returns whether this call made the change.
    fn transition_status(
        &self,
        number: &OrderNumber,
        from: OrderStatus,
        to: OrderStatus,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// [`transition_status`](Self::transition_status) plus `direction ×
    /// quantity` applied to each item's product stock, committed together.
    ///
    /// Returns `None` if the order was no longer in `from`; otherwise one
    /// outcome per item. Refused decrements and missing products are
    /// reported, not errors. On error nothing is changed.
    fn transition_with_stock(
        &self,
        number: &OrderNumber,
        from: OrderStatus,
        to: OrderStatus,
        direction: i32,
    ) -> impl Future<Output = Result<Option<Vec<(OrderItem, StockAdjustment)>>, RepositoryError>> + Send;
}

/// Login history audit trail.
pub trait LoginHistoryStore: Send + Sync {
    fn record_login(
        &self,
        new: &NewLoginRecord,
    ) -> impl Future<Output = Result<LoginRecord, RepositoryError>> + Send;

    /// Close the most recent open record for `(email, session_key)`.
    fn record_logout(
        &self,
        email: &Email,
        session_key: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<LoginRecordId>, RepositoryError>> + Send;

    fn recent_logins(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<LoginRecord>, RepositoryError>> + Send;

    /// Totals overall, since `since`, and still open.
    fn login_stats(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<LoginStats, RepositoryError>> + Send;

    /// Delete records that logged in before `cutoff`. Returns how many.
    fn purge_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// `PostgreSQL`-backed implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a database quantity to the domain's unsigned form.
fn quantity_from_db(quantity: i32) -> Result<u32, RepositoryError> {
    u32::try_from(quantity)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative quantity {quantity}")))
}

/// Convert a domain quantity for binding.
fn quantity_to_db(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::DataCorruption(format!("quantity {quantity} out of range")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use loka_core::{Money, Slug};

    use super::*;

    fn product(active: bool, image: Option<&str>) -> Product {
        Product {
            id: ProductId::new(1),
            category_id: CategoryId::new(2),
            name: "Keripik".to_owned(),
            slug: Slug::from_name("Keripik"),
            description: String::new(),
            price: Money::from_major(12_000),
            stock: 4,
            image: image.map(str::to_owned),
            is_active: active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_product_filter() {
        let filter = ProductFilter {
            active_only: true,
            with_image_only: true,
            ..ProductFilter::default()
        };
        assert!(filter.matches(&product(true, Some("keripik.jpg"))));
        assert!(!filter.matches(&product(true, None)));
        assert!(!filter.matches(&product(false, Some("keripik.jpg"))));

        let related = ProductFilter {
            category: Some(CategoryId::new(2)),
            exclude: Some(ProductId::new(1)),
            ..ProductFilter::storefront()
        };
        assert!(!related.matches(&product(true, None)));
    }

    #[test]
    fn test_quantity_conversion() {
        assert!(matches!(quantity_from_db(-1), Err(RepositoryError::DataCorruption(_))));
        assert_eq!(quantity_to_db(3).ok(), Some(3));
    }
}
