//! Integration tests for Loka.
//!
//! Scenario tests run the storefront services against the in-memory store
//! and a scripted payment gateway, so they need no database or network.
//!
//! ```bash
//! cargo test -p loka-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tower_sessions::Session;

use loka_core::cart::{Cart, ProductSnapshot};
use loka_core::catalog::{NewCategory, NewProduct, Product};
use loka_core::checkout::ShippingPolicy;
use loka_core::order::Customer;
use loka_core::{Email, Money};
use loka_storefront::db::{CatalogStore, MemoryStore, RepositoryError};
use loka_storefront::services::payment::{
    GatewayError, PaymentGateway, PaymentRequest, PaymentSession,
};

/// Payment gateway double that either accepts or times out, and records
/// what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    fail: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedGateway {
    /// A gateway that opens every session.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// A gateway that times out on every call.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// How many sessions were requested.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PaymentGateway for ScriptedGateway {
    async fn create_payment_session(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if self.fail {
            return Err(GatewayError::Timeout);
        }
        Ok(PaymentSession {
            token: format!("snap-token-{call}"),
            redirect_url: None,
        })
    }
}

/// Default shipping: flat 15 000.
#[must_use]
pub fn shipping() -> ShippingPolicy {
    ShippingPolicy::default()
}

/// A customer with the given email.
///
/// # Panics
///
/// Panics if `email` is not a valid address.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn customer(email: &str) -> Customer {
    let email = Email::parse(email).unwrap();
    let name = email.display_name();
    Customer { email, name }
}

/// A fresh session over an in-memory session store.
#[must_use]
pub fn session() -> Session {
    Session::new(None, Arc::new(tower_sessions::MemoryStore::default()), None)
}

/// Catalog fixture: one category with two products.
///
/// - A: 100 000, stock 5
/// - B: 50 000, stock 10
pub struct Fixture {
    pub store: MemoryStore,
    pub a: Product,
    pub b: Product,
}

impl Fixture {
    /// Build the fixture.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the seed data.
    pub async fn new() -> Result<Self, RepositoryError> {
        let store = MemoryStore::new();
        let category = store
            .create_category(&NewCategory {
                name: "Oleh-oleh".to_owned(),
                description: String::new(),
            })
            .await?;

        let product = |name: &str, price: i64, stock: i32| NewProduct {
            category_id: category.id,
            name: name.to_owned(),
            description: String::new(),
            price: Money::from_major(price),
            stock,
            image: Some(format!("/media/{}.jpg", name.to_lowercase())),
            is_active: true,
        };
        let a = store.create_product(&product("Sambal", 100_000, 5)).await?;
        let b = store.create_product(&product("Kerupuk", 50_000, 10)).await?;

        Ok(Self { store, a, b })
    }

    /// Cart with A × 2 and B × 1.
    #[must_use]
    pub fn cart(&self) -> Cart {
        let mut cart = Cart::new();
        cart.add(&ProductSnapshot::from(&self.a), 2);
        cart.add(&ProductSnapshot::from(&self.b), 1);
        cart
    }

    /// Current stock of a product, `None` if it is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn stock(&self, product: &Product) -> Result<Option<i32>, RepositoryError> {
        Ok(self.store.get_product(product.id).await?.map(|p| p.stock))
    }
}
