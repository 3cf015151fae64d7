//! Checkout: totals, gateway handoff and order creation.
//!
//! The gateway is called before anything is stored. A failed payment session
//! therefore never leaves a pending order behind; a successful one is
//! followed by an atomic order insert under the same order number.
//!
//! [`CheckoutService::start_payment`] runs the whole handoff under the
//! session's cart lock, and a repeated submit for an unchanged cart gets the
//! payment session already opened instead of a second order.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use loka_core::cart::Cart;
use loka_core::checkout::{CheckoutTotals, ShippingPolicy};
use loka_core::order::{Customer, Order};
use loka_core::{Money, OrderNumber, OrderStatus, ProductId};

use super::cart::{CartError, CartLocks, CartService};
use super::orders::{OrderError, OrderLifecycle};
use super::payment::{GatewayError, PaymentGateway, PaymentRequest, PaymentSession};
use crate::db::{CatalogStore, OrderStore, RepositoryError};
use crate::models::session::read_session_value;
use crate::models::session_keys;

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("order error: {0}")]
    Order(#[from] OrderError),

    #[error("cart error: {0}")]
    Cart(#[from] CartError),
}

impl From<RepositoryError> for CheckoutError {
    fn from(err: RepositoryError) -> Self {
        Self::Order(OrderError::Repository(err))
    }
}

impl From<tower_sessions::session::Error> for CheckoutError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Cart(CartError::Session(err))
    }
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub totals: CheckoutTotals,
    pub payment: PaymentSession,
}

/// Payment session opened for a session's cart, kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHandoff {
    pub order_number: OrderNumber,
    pub token: String,
    pub redirect_url: Option<String>,
    pub total: Money,
    /// Cart lines the order was created from.
    lines: Vec<(ProductId, u32)>,
}

impl PaymentHandoff {
    fn new(placed: &PlacedOrder, cart: &Cart) -> Self {
        Self {
            order_number: placed.order.order_number.clone(),
            token: placed.payment.token.clone(),
            redirect_url: placed.payment.redirect_url.clone(),
            total: placed.totals.total,
            lines: cart_lines(cart),
        }
    }

    fn covers(&self, cart: &Cart, total: Money) -> bool {
        self.total == total && self.lines == cart_lines(cart)
    }
}

fn cart_lines(cart: &Cart) -> Vec<(ProductId, u32)> {
    cart.items()
        .iter()
        .map(|item| (item.product_id, item.quantity))
        .collect()
}

/// Places orders through a payment gateway.
pub struct CheckoutService<'a, S, G> {
    store: &'a S,
    gateway: &'a G,
    shipping: ShippingPolicy,
}

impl<'a, S, G> CheckoutService<'a, S, G>
where
    S: CatalogStore + OrderStore,
    G: PaymentGateway,
{
    #[must_use]
    pub const fn new(store: &'a S, gateway: &'a G, shipping: ShippingPolicy) -> Self {
        Self {
            store,
            gateway,
            shipping,
        }
    }

    /// Totals for the cart under this service's shipping policy.
    #[must_use]
    pub fn totals(&self, cart: &Cart) -> CheckoutTotals {
        CheckoutTotals::compute(cart.items(), &self.shipping)
    }

    /// Open a payment session for the cart, then store the pending order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart`, `Gateway` (no order stored) or `Order` if the
    /// insert fails after the gateway accepted the session.
    #[instrument(skip_all, fields(customer = %customer.email, lines = cart.len()))]
    pub async fn place_order(
        &self,
        cart: &Cart,
        customer: &Customer,
    ) -> Result<PlacedOrder, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let totals = self.totals(cart);
        let order_number = OrderNumber::generate();
        let request = PaymentRequest {
            order_number: order_number.clone(),
            amount: totals.total,
            customer: customer.clone(),
        };

        let payment = match self.gateway.create_payment_session(&request).await {
            Ok(payment) => payment,
            Err(e) => {
                tracing::error!(order_id = %order_number, error = %e, "Payment session failed, no order created");
                return Err(e.into());
            }
        };

        let order = OrderLifecycle::new(self.store)
            .create_with_number(order_number, cart.items(), customer, totals.total)
            .await
            .inspect_err(|e| {
                tracing::error!(order_id = %request.order_number, error = %e, "Order insert failed after payment session opened");
            })?;

        Ok(PlacedOrder {
            order,
            totals,
            payment,
        })
    }

    /// Open a payment session for the session's cart and remember it.
    ///
    /// Holds the session's cart lock throughout. If the session already
    /// opened one for the same lines and total, and that order is still
    /// pending, it is returned instead of placing another order.
    ///
    /// # Errors
    ///
    /// Same as [`place_order`](Self::place_order), plus `Cart` if the
    /// session store fails.
    #[instrument(skip_all, fields(customer = %customer.email))]
    pub async fn start_payment(
        &self,
        session: &Session,
        locks: &CartLocks,
        customer: &Customer,
    ) -> Result<PaymentHandoff, CheckoutError> {
        let _guard = locks.acquire(session).await?;
        let cart = CartService::new(self.store, locks).refresh_held(session).await?;
        let total = self.totals(&cart).total;

        if let Some(open) =
            read_session_value::<PaymentHandoff>(session, session_keys::PAYMENT).await
            && open.covers(&cart, total)
            && self.is_pending(&open.order_number).await?
        {
            tracing::info!(order_id = %open.order_number, "Reusing open payment session");
            return Ok(open);
        }

        let placed = self.place_order(&cart, customer).await?;
        let handoff = PaymentHandoff::new(&placed, &cart);
        session
            .insert(session_keys::CURRENT_ORDER_ID, &handoff.order_number)
            .await?;
        session.insert(session_keys::PAYMENT, &handoff).await?;
        Ok(handoff)
    }

    async fn is_pending(&self, order_number: &OrderNumber) -> Result<bool, RepositoryError> {
        Ok(self
            .store
            .get_order(order_number)
            .await?
            .is_some_and(|order| order.status == OrderStatus::Pending))
    }
}
