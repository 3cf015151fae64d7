//! Cart route handlers.
//!
//! The cart lives in the session; every mutation goes through
//! [`CartService`], which serializes writes per session.

use axum::{
    Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use loka_core::ProductId;
use loka_core::cart::{Cart, CartItem};
use loka_core::checkout::CheckoutTotals;

use crate::error::Result;
use crate::services::cart::CartService;
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub totals: CheckoutTotals,
    pub item_count: u32,
}

impl CartView {
    fn new(cart: &Cart, state: &AppState) -> Self {
        Self {
            items: cart.items().to_vec(),
            totals: CheckoutTotals::compute(cart.items(), &state.config().shipping_policy()),
            item_count: cart.item_count(),
        }
    }
}

/// Response to a quantity change.
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    /// New quantity of the line, absent if the product is not in the cart.
    pub quantity: Option<u32>,
    pub item_subtotal: Option<loka_core::Money>,
    #[serde(flatten)]
    pub cart: CartView,
}

// =============================================================================
// Forms
// =============================================================================

/// Add-to-cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    /// Missing or zero counts as one.
    #[serde(default)]
    pub quantity: Option<u32>,
    /// Present when the customer pressed "buy now".
    #[serde(default)]
    pub buy_now: Option<String>,
}

impl AddToCartForm {
    fn buy_now(&self) -> bool {
        self.buy_now
            .as_deref()
            .is_some_and(|v| !matches!(v, "" | "false" | "0"))
    }
}

/// Quantity change request.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub change: i32,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart with stock snapshots refreshed.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = CartService::new(state.store(), state.cart_locks())
        .refresh(&session)
        .await?;
    Ok(Json(CartView::new(&cart, &state)))
}

/// Add a product to the cart.
///
/// Redirects to checkout for "buy now", otherwise back to the cart.
#[instrument(skip(state, session, form))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<i32>,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    CartService::new(state.store(), state.cart_locks())
        .add(&session, ProductId::new(product_id), form.quantity.unwrap_or(1))
        .await?;

    let target = if form.buy_now() { "/checkout" } else { "/cart" };
    Ok(Redirect::to(target).into_response())
}

/// Remove a product's line.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<i32>,
) -> Result<Redirect> {
    CartService::new(state.store(), state.cart_locks())
        .remove(&session, ProductId::new(product_id))
        .await?;
    Ok(Redirect::to("/cart"))
}

/// Change a line's quantity by `change`, never below one.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<i32>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>> {
    let product_id = ProductId::new(product_id);
    let cart = CartService::new(state.store(), state.cart_locks())
        .adjust(&session, product_id, request.change)
        .await?;

    let line = cart.get(product_id);
    Ok(Json(UpdateResponse {
        success: line.is_some(),
        quantity: line.map(|item| item.quantity),
        item_subtotal: line.map(CartItem::subtotal),
        cart: CartView::new(&cart, &state),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(buy_now: Option<&str>) -> AddToCartForm {
        AddToCartForm {
            quantity: None,
            buy_now: buy_now.map(String::from),
        }
    }

    #[test]
    fn test_buy_now_flag() {
        assert!(!form(None).buy_now());
        assert!(!form(Some("")).buy_now());
        assert!(!form(Some("false")).buy_now());
        assert!(form(Some("on")).buy_now());
        assert!(form(Some("true")).buy_now());
    }

    #[test]
    fn test_add_form_parses_without_quantity() {
        let parsed: AddToCartForm = serde_json::from_str(r#"{"buy_now":"1"}"#).unwrap();
        assert_eq!(parsed.quantity, None);
        assert!(parsed.buy_now());
    }
}
