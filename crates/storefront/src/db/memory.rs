//! In-process store for tests and local demos.
//!
//! Implements every store trait over a single mutex-guarded state. Each
//! operation takes the lock once, so conditional updates behave like their
//! SQL counterparts. Order creation and stock-moving transitions can be told
//! to fail part-way to exercise rollback.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use loka_core::audit::{LoginRecord, NewLoginRecord};
use loka_core::catalog::{Category, NewCategory, NewProduct, Product};
use loka_core::order::{NewOrder, Order, OrderItem};
use loka_core::{
    CategoryId, Email, LoginRecordId, OrderId, OrderItemId, OrderNumber, OrderStatus, ProductId,
    Slug,
};

use super::{
    CatalogStore, LoginHistoryStore, LoginStats, OrderStore, ProductFilter, RepositoryError,
    StockAdjustment,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i32,
    categories: Vec<Category>,
    products: Vec<Product>,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    logins: Vec<LoginRecord>,
    /// Fail the next order insert after this many items have been written.
    fail_order_after_items: Option<usize>,
    /// Fail the next stock-moving transition after this many items.
    fail_stock_after_items: Option<usize>,
}

impl MemoryState {
    const fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mutex-guarded in-memory implementation of the store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_order` fail after writing `items` order items.
    pub fn fail_next_order_after(&self, items: usize) {
        self.lock().fail_order_after_items = Some(items);
    }

    /// Make the next `transition_with_stock` fail after adjusting `items`
    /// products.
    pub fn fail_next_stock_move_after(&self, items: usize) {
        self.lock().fail_stock_after_items = Some(items);
    }

    /// Number of stored orders and order items.
    #[must_use]
    pub fn order_counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.orders.len(), state.items.len())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn injected_failure(what: &str) -> RepositoryError {
    RepositoryError::Database(sqlx::Error::Protocol(format!("injected {what} failure")))
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut categories = self.lock().categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, new: &NewCategory) -> Result<Category, RepositoryError> {
        let mut state = self.lock();
        let name = new.name.trim();
        if state.categories.iter().any(|c| c.name == name) {
            return Err(RepositoryError::Conflict("category already exists".to_owned()));
        }
        let slug = Slug::unique(&Slug::from_name(name), |s| {
            state.categories.iter().any(|c| c.slug.as_str() == s)
        });
        let category = Category {
            id: CategoryId::new(state.next_id()),
            name: name.to_owned(),
            slug,
            description: new.description.clone(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        let existed = state.categories.len() != before;
        if existed {
            state.products.retain(|p| p.category_id != id);
        }
        Ok(existed)
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let state = self.lock();
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            products.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.lock();
        if !state.categories.iter().any(|c| c.id == new.category_id) {
            return Err(RepositoryError::NotFound);
        }
        let slug = Slug::unique(&Slug::from_name(&new.name), |s| {
            state.products.iter().any(|p| p.slug.as_str() == s)
        });
        let product = Product {
            id: ProductId::new(state.next_id()),
            category_id: new.category_id,
            name: new.name.trim().to_owned(),
            slug,
            description: new.description.clone(),
            price: new.price,
            stock: new.stock,
            image: new.image.clone(),
            is_active: new.is_active,
            created_at: Utc::now(),
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn set_stock(&self, id: ProductId, stock: i32) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        let Some(product) = state.products.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        product.stock = stock;
        Ok(true)
    }

    async fn stock_levels(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, i32>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| (p.id, p.stock))
            .collect())
    }

    async fn adjust_stock(
        &self,
        id: ProductId,
        delta: i32,
    ) -> Result<StockAdjustment, RepositoryError> {
        let mut state = self.lock();
        let Some(product) = state.products.iter_mut().find(|p| p.id == id) else {
            return Ok(StockAdjustment::Missing);
        };
        match product.stock.checked_add(delta) {
            Some(remaining) if remaining >= 0 => {
                product.stock = remaining;
                Ok(StockAdjustment::Applied { remaining })
            }
            _ => Ok(StockAdjustment::Insufficient {
                available: product.stock,
            }),
        }
    }
}

impl OrderStore for MemoryStore {
    async fn create_order(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.lock();
        if state.orders.iter().any(|o| o.order_number == new.order_number) {
            return Err(RepositoryError::Conflict("order already exists".to_owned()));
        }
        let fail_after = state.fail_order_after_items.take();

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(state.next_id()),
            order_number: new.order_number.clone(),
            customer_email: new.customer.email.clone(),
            customer_name: new.customer.name.clone(),
            total_amount: new.total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        // Stage everything, publish only once every item is written.
        let mut items = Vec::with_capacity(new.items.len());
        for (written, item) in new.items.iter().enumerate() {
            if fail_after == Some(written) {
                return Err(injected_failure("order item"));
            }
            items.push(OrderItem {
                id: OrderItemId::new(state.next_id()),
                order_id: order.id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
            });
        }

        state.orders.push(order.clone());
        state.items.extend(items);
        Ok(order)
    }

    async fn get_order(&self, number: &OrderNumber) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|o| &o.order_number == number)
            .cloned())
    }

    async fn order_items(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(self
            .lock()
            .items
            .iter()
            .filter(|i| i.order_id == order)
            .cloned()
            .collect())
    }

    async fn orders_for_customer(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .iter()
            .filter(|o| o.is_owned_by(email))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        newest_first(&mut orders);
        if let Some(limit) = limit {
            orders.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(orders)
    }

    async fn transition_status(
        &self,
        number: &OrderNumber,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        match state
            .orders
            .iter_mut()
            .find(|o| &o.order_number == number && o.status == from)
        {
            Some(order) => {
                order.status = to;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn transition_with_stock(
        &self,
        number: &OrderNumber,
        from: OrderStatus,
        to: OrderStatus,
        direction: i32,
    ) -> Result<Option<Vec<(OrderItem, StockAdjustment)>>, RepositoryError> {
        let mut state = self.lock();
        let Some(position) = state
            .orders
            .iter()
            .position(|o| &o.order_number == number && o.status == from)
        else {
            return Ok(None);
        };
        let fail_after = state.fail_stock_after_items.take();
        let order_id = state.orders[position].id;

        // Stage stock changes, publish them with the status only at the end.
        let mut stock: HashMap<ProductId, i32> =
            state.products.iter().map(|p| (p.id, p.stock)).collect();
        let items: Vec<OrderItem> = state
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        let mut outcomes = Vec::with_capacity(items.len());
        for (adjusted, item) in items.into_iter().enumerate() {
            if fail_after == Some(adjusted) {
                return Err(injected_failure("stock adjustment"));
            }
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity {} out of range", item.quantity))
            })?;
            let outcome = match stock.get_mut(&item.product_id) {
                None => StockAdjustment::Missing,
                Some(current) => match current.checked_add(direction * quantity) {
                    Some(remaining) if remaining >= 0 => {
                        *current = remaining;
                        StockAdjustment::Applied { remaining }
                    }
                    _ => StockAdjustment::Insufficient { available: *current },
                },
            };
            outcomes.push((item, outcome));
        }

        for product in &mut state.products {
            if let Some(&remaining) = stock.get(&product.id) {
                product.stock = remaining;
            }
        }
        let order = &mut state.orders[position];
        order.status = to;
        order.updated_at = Utc::now();
        Ok(Some(outcomes))
    }
}

impl LoginHistoryStore for MemoryStore {
    async fn record_login(&self, new: &NewLoginRecord) -> Result<LoginRecord, RepositoryError> {
        let mut state = self.lock();
        let record = LoginRecord {
            id: LoginRecordId::new(state.next_id()),
            email: new.email.clone(),
            name: new.name.clone(),
            ip_address: new.ip_address.clone(),
            user_agent: new.user_agent.clone(),
            session_key: new.session_key.clone(),
            device: new.device.clone(),
            login_time: Utc::now(),
            logout_time: None,
        };
        state.logins.push(record.clone());
        Ok(record)
    }

    async fn record_logout(
        &self,
        email: &Email,
        session_key: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<LoginRecordId>, RepositoryError> {
        let mut state = self.lock();
        let open = state
            .logins
            .iter_mut()
            .filter(|r| &r.email == email && r.session_key == session_key && r.is_active())
            .max_by(|a, b| a.login_time.cmp(&b.login_time).then(a.id.cmp(&b.id)));
        Ok(open.map(|record| {
            record.logout_time = Some(at);
            record.id
        }))
    }

    async fn recent_logins(&self, limit: i64) -> Result<Vec<LoginRecord>, RepositoryError> {
        let mut logins = self.lock().logins.clone();
        logins.sort_by(|a, b| b.login_time.cmp(&a.login_time).then(b.id.cmp(&a.id)));
        logins.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(logins)
    }

    async fn login_stats(&self, since: DateTime<Utc>) -> Result<LoginStats, RepositoryError> {
        let state = self.lock();
        let count = |pred: &dyn Fn(&LoginRecord) -> bool| {
            i64::try_from(state.logins.iter().filter(|r| pred(r)).count()).unwrap_or(i64::MAX)
        };
        Ok(LoginStats {
            total: count(&|_| true),
            since: count(&|r| r.login_time >= since),
            active: count(&|r| r.is_active()),
        })
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut state = self.lock();
        let before = state.logins.len();
        state.logins.retain(|r| r.login_time >= cutoff);
        Ok(u64::try_from(before - state.logins.len()).unwrap_or(0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loka_core::Money;
    use loka_core::order::{Customer, NewOrderItem};

    use super::*;

    async fn seeded() -> (MemoryStore, Product) {
        let store = MemoryStore::new();
        let category = store
            .create_category(&NewCategory {
                name: "Kopi".to_owned(),
                description: String::new(),
            })
            .await
            .unwrap();
        let product = store
            .create_product(&NewProduct {
                category_id: category.id,
                name: "Kopi Toraja".to_owned(),
                description: String::new(),
                price: Money::from_major(80_000),
                stock: 5,
                image: None,
                is_active: true,
            })
            .await
            .unwrap();
        (store, product)
    }

    #[tokio::test]
    async fn test_product_slugs_get_numeric_suffix() {
        let (store, first) = seeded().await;
        let second = store
            .create_product(&NewProduct {
                category_id: first.category_id,
                name: "Kopi Toraja".to_owned(),
                description: String::new(),
                price: Money::from_major(1),
                stock: 0,
                image: None,
                is_active: true,
            })
            .await
            .unwrap();
        assert_eq!(first.slug.as_str(), "kopi-toraja");
        assert_eq!(second.slug.as_str(), "kopi-toraja-1");
    }

    #[tokio::test]
    async fn test_adjust_stock_never_goes_negative() {
        let (store, product) = seeded().await;
        assert_eq!(
            store.adjust_stock(product.id, -3).await.unwrap(),
            StockAdjustment::Applied { remaining: 2 }
        );
        assert_eq!(
            store.adjust_stock(product.id, -3).await.unwrap(),
            StockAdjustment::Insufficient { available: 2 }
        );
        assert_eq!(
            store.adjust_stock(ProductId::new(999), 1).await.unwrap(),
            StockAdjustment::Missing
        );
    }

    #[tokio::test]
    async fn test_delete_category_cascades() {
        let (store, product) = seeded().await;
        assert!(store.delete_category(product.category_id).await.unwrap());
        assert!(store.get_product(product.id).await.unwrap().is_none());
        assert!(!store.delete_category(product.category_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_transition_status_is_compare_and_swap() {
        let (store, product) = seeded().await;
        let order = store
            .create_order(&NewOrder {
                order_number: OrderNumber::generate(),
                customer: Customer {
                    email: Email::parse("a@loka.co").unwrap(),
                    name: "A".to_owned(),
                },
                total_amount: Money::from_major(80_000),
                items: vec![NewOrderItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    unit_price: product.price,
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        let number = &order.order_number;
        let pending_to_paid = || store.transition_status(number, OrderStatus::Pending, OrderStatus::Paid);
        assert!(pending_to_paid().await.unwrap());
        assert!(!pending_to_paid().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_stock_move_changes_nothing() {
        let (store, product) = seeded().await;
        let order = store
            .create_order(&NewOrder {
                order_number: OrderNumber::generate(),
                customer: Customer {
                    email: Email::parse("a@loka.co").unwrap(),
                    name: "A".to_owned(),
                },
                total_amount: Money::from_major(160_000),
                items: vec![NewOrderItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    unit_price: product.price,
                    quantity: 2,
                }],
            })
            .await
            .unwrap();
        let number = &order.order_number;

        store.fail_next_stock_move_after(0);
        let failed = store
            .transition_with_stock(number, OrderStatus::Pending, OrderStatus::Paid, -1)
            .await;
        assert!(matches!(failed, Err(RepositoryError::Database(_))));
        assert_eq!(store.get_order(number).await.unwrap().unwrap().status, OrderStatus::Pending);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);

        let outcomes = store
            .transition_with_stock(number, OrderStatus::Pending, OrderStatus::Paid, -1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcomes[0].1, StockAdjustment::Applied { remaining: 3 });
        assert!(
            store
                .transition_with_stock(number, OrderStatus::Pending, OrderStatus::Paid, -1)
                .await
                .unwrap()
                .is_none()
        );
    }
}
