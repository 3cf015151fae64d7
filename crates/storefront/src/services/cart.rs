//! Session cart operations.
//!
//! The cart lives in the session under [`session_keys::CART`]. Every
//! read-modify-write of it holds a per-session async lock so concurrent
//! requests from one browser cannot lose each other's updates.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_sessions::Session;
use tracing::instrument;

use loka_core::ProductId;
use loka_core::cart::{Cart, ProductSnapshot};

use crate::db::{CatalogStore, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::session::read_session_value;
use crate::models::session_keys;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist or is not for sale.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Per-session locks, dropped after a period without use.
#[derive(Clone)]
pub struct CartLocks {
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl CartLocks {
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        Self {
            locks: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(idle)
                .build(),
        }
    }

    /// Acquire the lock for `session`, saving it first if it has no id yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a new session cannot be saved.
    pub async fn acquire(&self, session: &Session) -> Result<OwnedMutexGuard<()>, CartError> {
        let id = match session.id() {
            Some(id) => id,
            None => {
                session.save().await?;
                session.id().ok_or_else(|| {
                    CartError::Session(tower_sessions::session::Error::Store(
                        tower_sessions::session_store::Error::Backend(
                            "session has no id after save".to_owned(),
                        ),
                    ))
                })?
            }
        };
        let lock = self
            .locks
            .get_with(id.to_string(), async { Arc::new(Mutex::new(())) })
            .await;
        Ok(lock.lock_owned().await)
    }
}

impl Default for CartLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }
}

/// Read the cart, treating a missing or unreadable payload as empty.
pub async fn load_cart(session: &Session) -> Cart {
    read_session_value(session, session_keys::CART)
        .await
        .unwrap_or_default()
}

/// Write the cart back to the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), CartError> {
    session.insert(session_keys::CART, cart).await?;
    Ok(())
}

/// Cart operations against a catalog.
pub struct CartService<'a, S> {
    store: &'a S,
    locks: &'a CartLocks,
}

impl<'a, S> CartService<'a, S>
where
    S: CatalogStore,
{
    #[must_use]
    pub const fn new(store: &'a S, locks: &'a CartLocks) -> Self {
        Self { store, locks }
    }

    /// Add `quantity` units (at least 1) of an active product.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` for unknown or inactive products.
    #[instrument(skip(self, session))]
    pub async fn add(
        &self,
        session: &Session,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|p| p.is_available())
            .ok_or(CartError::ProductNotFound(product_id))?;

        let _guard = self.locks.acquire(session).await?;
        let mut cart = load_cart(session).await;
        let line_quantity = cart.add(&ProductSnapshot::from(&product), quantity);
        save_cart(session, &cart).await?;

        tracing::info!(%product_id, line_quantity, "Added to cart");
        add_breadcrumb("cart", "Added to cart", Some(&[("product", product.name.as_str())]));
        Ok(cart)
    }

    /// Remove a product's line. Absent products are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self, session))]
    pub async fn remove(&self, session: &Session, product_id: ProductId) -> Result<Cart, CartError> {
        let _guard = self.locks.acquire(session).await?;
        let mut cart = load_cart(session).await;
        if cart.remove(product_id) {
            save_cart(session, &cart).await?;
            tracing::info!(%product_id, "Removed from cart");
        }
        Ok(cart)
    }

    /// Change a line's quantity by `delta`, never below 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    #[instrument(skip(self, session))]
    pub async fn adjust(
        &self,
        session: &Session,
        product_id: ProductId,
        delta: i32,
    ) -> Result<Cart, CartError> {
        let _guard = self.locks.acquire(session).await?;
        let mut cart = load_cart(session).await;
        if cart.adjust_quantity(product_id, delta).is_some() {
            save_cart(session, &cart).await?;
        }
        Ok(cart)
    }

    /// Re-read current stock for every line.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or session store fails.
    pub async fn refresh(&self, session: &Session) -> Result<Cart, CartError> {
        let _guard = self.locks.acquire(session).await?;
        self.refresh_held(session).await
    }

    /// [`refresh`](Self::refresh) for a caller already holding the
    /// session's lock.
    pub(crate) async fn refresh_held(&self, session: &Session) -> Result<Cart, CartError> {
        let mut cart = load_cart(session).await;
        if cart.is_empty() {
            return Ok(cart);
        }
        let stock = self.store.stock_levels(&cart.product_ids()).await?;
        cart.refresh_stock(&stock);
        save_cart(session, &cart).await?;
        Ok(cart)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn clear(&self, session: &Session) -> Result<(), CartError> {
        let _guard = self.locks.acquire(session).await?;
        session.remove_value(session_keys::CART).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use loka_core::Money;
    use loka_core::catalog::{NewCategory, NewProduct};

    use super::*;
    use crate::db::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(tower_sessions::MemoryStore::default()), None)
    }

    async fn store_with_products() -> (MemoryStore, ProductId, ProductId) {
        let store = MemoryStore::new();
        let category = store
            .create_category(&NewCategory {
                name: "Batik".to_owned(),
                description: String::new(),
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for (name, active) in [("Kemeja Batik", true), ("Arsip", false)] {
            let product = store
                .create_product(&NewProduct {
                    category_id: category.id,
                    name: name.to_owned(),
                    description: String::new(),
                    price: Money::from_major(100_000),
                    stock: 5,
                    image: None,
                    is_active: active,
                })
                .await
                .unwrap();
            ids.push(product.id);
        }
        (store, ids[0], ids[1])
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_and_inactive() {
        let (store, _, inactive) = store_with_products().await;
        let locks = CartLocks::default();
        let service = CartService::new(&store, &locks);
        let session = session();

        assert!(matches!(
            service.add(&session, inactive, 1).await,
            Err(CartError::ProductNotFound(_))
        ));
        assert!(matches!(
            service.add(&session, ProductId::new(404), 1).await,
            Err(CartError::ProductNotFound(_))
        ));
        assert!(load_cart(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_cart_persists_in_session() {
        let (store, active, _) = store_with_products().await;
        let locks = CartLocks::default();
        let service = CartService::new(&store, &locks);
        let session = session();

        service.add(&session, active, 2).await.unwrap();
        service.add(&session, active, 1).await.unwrap();
        let cart = service.adjust(&session, active, -10).await.unwrap();
        assert_eq!(cart.get(active).unwrap().quantity, 1);

        store.set_stock(active, 2).await.unwrap();
        let cart = service.refresh(&session).await.unwrap();
        assert_eq!(cart.get(active).unwrap().stock_snapshot, 2);
        assert_eq!(load_cart(&session).await, cart);

        service.clear(&session).await.unwrap();
        assert!(load_cart(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let (store, active, _) = store_with_products().await;
        let store = Arc::new(store);
        let locks = CartLocks::default();
        let session = session();
        session.save().await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let (store, locks, session) = (Arc::clone(&store), locks.clone(), session.clone());
            tasks.push(tokio::spawn(async move {
                CartService::new(store.as_ref(), &locks)
                    .add(&session, active, 1)
                    .await
                    .map(|_| ())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(load_cart(&session).await.get(active).unwrap().quantity, 10);
    }
}
