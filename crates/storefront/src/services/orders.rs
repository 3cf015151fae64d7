//! Order lifecycle engine.
//!
//! Drives orders through `pending → paid → completed` and `→ cancelled`.
//! Every status change is a compare-and-swap on the stored status, so a
//! repeated confirmation or cancellation loses the race and is rejected
//! before any stock is touched. Stock follows the winning transition in the
//! same store commit: payment takes each item's quantity, cancellation
//! returns it. A failure part-way leaves both status and stock untouched.

use thiserror::Error;
use tracing::instrument;

use loka_core::cart::CartItem;
use loka_core::order::{Customer, NewOrder, Order, OrderItem, OrderWithItems};
use loka_core::{Email, Money, OrderEvent, OrderNumber, OrderStatus};

use crate::db::{OrderStore, RepositoryError, StockAdjustment};
use crate::error::add_breadcrumb;

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("order is {from} and cannot be {event}")]
    InvalidTransition { from: OrderStatus, event: OrderEvent },

    #[error("order belongs to another customer")]
    Unauthorized,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Order lifecycle operations over any store.
pub struct OrderLifecycle<'a, S> {
    store: &'a S,
}

impl<'a, S> OrderLifecycle<'a, S>
where
    S: OrderStore,
{
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Store a pending order for the cart lines under a fresh order number.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the order or any item fails to
    /// persist; nothing is stored in that case.
    pub async fn create_from_cart(
        &self,
        items: &[CartItem],
        customer: &Customer,
        total_amount: Money,
    ) -> Result<Order, OrderError> {
        self.create_with_number(OrderNumber::generate(), items, customer, total_amount)
            .await
    }

    /// Store a pending order under a number that was already handed to the
    /// payment gateway.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the order or any item fails to
    /// persist; nothing is stored in that case.
    #[instrument(skip(self, items, customer), fields(order_id = %order_number, lines = items.len()))]
    pub async fn create_with_number(
        &self,
        order_number: OrderNumber,
        items: &[CartItem],
        customer: &Customer,
        total_amount: Money,
    ) -> Result<Order, OrderError> {
        let new = NewOrder::from_cart(order_number, customer.clone(), items, total_amount);
        let order = self.store.create_order(&new).await?;

        tracing::info!(total = %order.total_amount, "Order created");
        add_breadcrumb("order", "Order created", Some(&[("order_id", order.order_number.as_str())]));
        Ok(order)
    }

    /// Order and items, if the order exists.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if a query fails.
    pub async fn find(&self, order_number: &OrderNumber) -> Result<Option<OrderWithItems>, OrderError> {
        let Some(order) = self.store.get_order(order_number).await? else {
            return Ok(None);
        };
        let items = self.store.order_items(order.id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// Order and items, only if `email` placed it.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for missing orders and for orders owned
    /// by someone else, so their existence is not revealed.
    pub async fn find_owned(
        &self,
        order_number: &OrderNumber,
        email: &Email,
    ) -> Result<OrderWithItems, OrderError> {
        self.find(order_number)
            .await?
            .filter(|found| found.order.is_owned_by(email))
            .ok_or_else(|| OrderError::NotFound(order_number.to_string()))
    }

    /// `pending → paid`, then take each item's quantity out of stock.
    ///
    /// Items whose product lacks stock or no longer exists are logged and
    /// skipped; they never fail the transition.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidTransition` (including when another
    /// request confirmed first).
    #[instrument(skip(self), fields(order_id = %order_number))]
    pub async fn confirm_payment(&self, order_number: &OrderNumber) -> Result<Order, OrderError> {
        let (_, order) = self
            .transition(order_number, OrderEvent::PaymentConfirmed, StockMove::Take)
            .await?;
        tracing::info!("Payment confirmed");
        Ok(order)
    }

    /// `paid → completed`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidTransition`.
    #[instrument(skip(self), fields(order_id = %order_number))]
    pub async fn complete(&self, order_number: &OrderNumber) -> Result<Order, OrderError> {
        let (_, order) = self
            .transition(order_number, OrderEvent::Fulfilled, StockMove::None)
            .await?;
        tracing::info!("Order completed");
        Ok(order)
    }

    /// Cancel on behalf of the customer who placed the order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Unauthorized` when `requester` is not the owner,
    /// or `InvalidTransition` once the order is completed or cancelled.
    #[instrument(skip(self, requester), fields(order_id = %order_number))]
    pub async fn cancel(
        &self,
        order_number: &OrderNumber,
        requester: &Email,
    ) -> Result<Order, OrderError> {
        self.cancel_inner(order_number, Some(requester)).await
    }

    /// Cancel from the operator tools, without an ownership check.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidTransition`.
    #[instrument(skip(self), fields(order_id = %order_number))]
    pub async fn cancel_by_staff(&self, order_number: &OrderNumber) -> Result<Order, OrderError> {
        self.cancel_inner(order_number, None).await
    }

    async fn cancel_inner(
        &self,
        order_number: &OrderNumber,
        requester: Option<&Email>,
    ) -> Result<Order, OrderError> {
        if let Some(requester) = requester {
            let current = self.load(order_number).await?;
            if !current.is_owned_by(requester) {
                tracing::warn!("Cancel requested by non-owner");
                return Err(OrderError::Unauthorized);
            }
        }

        let (previous, order) = self
            .transition(order_number, OrderEvent::Cancelled, StockMove::Return)
            .await?;
        tracing::info!(from = %previous, "Order cancelled");
        add_breadcrumb("order", "Order cancelled", Some(&[("order_id", order_number.as_str())]));
        Ok(order)
    }

    async fn load(&self, order_number: &OrderNumber) -> Result<Order, OrderError> {
        self.store
            .get_order(order_number)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_number.to_string()))
    }

    /// Apply `event` with a compare-and-swap on the current status, moving
    /// stock as `stock` says. Returns the status the order left and the
    /// updated order.
    async fn transition(
        &self,
        order_number: &OrderNumber,
        event: OrderEvent,
        stock: StockMove,
    ) -> Result<(OrderStatus, Order), OrderError> {
        let current = self.load(order_number).await?;
        let from = current.status;
        let to = from
            .transition(event)
            .ok_or(OrderError::InvalidTransition { from, event })?;

        let won = match stock.direction() {
            None => self.store.transition_status(order_number, from, to).await?,
            Some(direction) => {
                match self
                    .store
                    .transition_with_stock(order_number, from, to, direction)
                    .await?
                {
                    Some(outcomes) => {
                        log_stock_outcomes(&outcomes);
                        true
                    }
                    None => false,
                }
            }
        };

        if !won {
            // Someone else moved the order first; report what it is now.
            let now = self.load(order_number).await?.status;
            tracing::warn!(expected = %from, actual = %now, "Lost status race");
            return Err(OrderError::InvalidTransition { from: now, event });
        }

        Ok((from, self.load(order_number).await?))
    }
}

/// Stock effect of a transition.
#[derive(Debug, Clone, Copy)]
enum StockMove {
    None,
    Take,
    Return,
}

impl StockMove {
    const fn direction(self) -> Option<i32> {
        match self {
            Self::None => None,
            Self::Take => Some(-1),
            Self::Return => Some(1),
        }
    }
}

fn log_stock_outcomes(outcomes: &[(OrderItem, StockAdjustment)]) {
    for (item, outcome) in outcomes {
        match outcome {
            StockAdjustment::Applied { remaining } => {
                tracing::debug!(product_id = %item.product_id, remaining, "Stock adjusted");
            }
            StockAdjustment::Insufficient { available } => {
                tracing::warn!(
                    product_id = %item.product_id,
                    requested = item.quantity,
                    available,
                    "Insufficient stock, skipping decrement"
                );
            }
            StockAdjustment::Missing => {
                tracing::warn!(product_id = %item.product_id, "Product no longer exists, stock not adjusted");
            }
        }
    }
}
