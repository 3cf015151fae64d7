//! Checkout, payment and success route handlers.
//!
//! Flow: `GET /checkout` → `POST /checkout` (shipping details kept in the
//! session) → `POST /payment` (gateway session + pending order) →
//! `GET /success` (payment confirmed, cart cleared).

use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use loka_core::cart::CartItem;
use loka_core::checkout::CheckoutTotals;
use loka_core::order::{Customer, OrderWithItems};
use loka_core::{Money, OrderNumber, OrderStatus};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::session::read_session_value;
use crate::models::{CheckoutIntent, CurrentCustomer, ShippingInfo, session_keys};
use crate::services::cart::{CartService, load_cart};
use crate::services::checkout::CheckoutService;
use crate::services::orders::{OrderError, OrderLifecycle};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Checkout and payment summary page data.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub customer: CurrentCustomer,
    pub items: Vec<CartItem>,
    pub totals: CheckoutTotals,
    pub checkout: Option<CheckoutIntent>,
}

/// Data the browser needs to open the payment popup.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub token: String,
    pub client_key: String,
    pub redirect_url: Option<String>,
    pub order_id: OrderNumber,
    pub total: Money,
}

/// Success page data.
#[derive(Debug, Serialize)]
pub struct SuccessView {
    #[serde(flatten)]
    pub order: OrderWithItems,
    /// False on repeat visits, when the payment was already confirmed.
    pub newly_confirmed: bool,
}

// =============================================================================
// Forms
// =============================================================================

/// Shipping form data.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub shipping_method: String,
    #[serde(default)]
    pub notes: String,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub province: String,
}

impl CheckoutForm {
    /// Validate required fields and build the session value.
    fn into_intent(self) -> std::result::Result<CheckoutIntent, AppError> {
        let required = [
            ("shipping method", &self.shipping_method),
            ("full name", &self.full_name),
            ("phone", &self.phone),
            ("email", &self.email),
            ("address", &self.address),
            ("city", &self.city),
            ("postal code", &self.postal_code),
            ("province", &self.province),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AppError::BadRequest(format!("{field} is required")));
        }

        Ok(CheckoutIntent {
            shipping_method: self.shipping_method.trim().to_owned(),
            notes: self.notes.trim().to_owned(),
            shipping: ShippingInfo {
                full_name: self.full_name.trim().to_owned(),
                phone: self.phone.trim().to_owned(),
                email: self.email.trim().to_owned(),
                address: self.address.trim().to_owned(),
                city: self.city.trim().to_owned(),
                postal_code: self.postal_code.trim().to_owned(),
                province: self.province.trim().to_owned(),
            },
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn summary(
    state: &AppState,
    session: &Session,
    customer: CurrentCustomer,
) -> Result<Option<CheckoutView>> {
    let cart = CartService::new(state.store(), state.cart_locks())
        .refresh(session)
        .await?;
    if cart.is_empty() {
        return Ok(None);
    }

    Ok(Some(CheckoutView {
        customer,
        items: cart.items().to_vec(),
        totals: CheckoutTotals::compute(cart.items(), &state.config().shipping_policy()),
        checkout: read_session_value(session, session_keys::CHECKOUT).await,
    }))
}

/// Display the checkout page. An empty cart redirects to `/cart`.
#[instrument(skip_all, fields(customer = %customer.email))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
) -> Result<Response> {
    Ok(match summary(&state, &session, customer).await? {
        Some(view) => Json(view).into_response(),
        None => Redirect::to("/cart").into_response(),
    })
}

/// Store the shipping details and continue to payment.
#[instrument(skip_all, fields(customer = %customer.email))]
pub async fn submit(
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Redirect> {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart"));
    }

    let intent = form.into_intent()?;
    session.insert(session_keys::CHECKOUT, &intent).await?;
    tracing::info!(shipping_method = %intent.shipping_method, "Checkout details saved");
    add_breadcrumb("checkout", "Shipping details saved", None);
    Ok(Redirect::to("/payment"))
}

/// Display the payment summary. Nothing is created until `POST /payment`.
#[instrument(skip_all, fields(customer = %customer.email))]
pub async fn payment_page(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
) -> Result<Response> {
    let Some(view) = summary(&state, &session, customer).await? else {
        return Ok(Redirect::to("/cart").into_response());
    };
    if view.checkout.is_none() {
        return Ok(Redirect::to("/checkout").into_response());
    }
    Ok(Json(view).into_response())
}

/// Open a payment session and store the pending order. A repeated submit
/// for an unchanged cart returns the session already opened.
#[instrument(skip_all, fields(customer = %customer.email))]
pub async fn start_payment(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
) -> Result<Json<PaymentResponse>> {
    if read_session_value::<CheckoutIntent>(&session, session_keys::CHECKOUT)
        .await
        .is_none()
    {
        return Err(AppError::BadRequest("checkout details are missing".to_string()));
    }

    let handoff = CheckoutService::new(
        state.store(),
        state.gateway(),
        state.config().shipping_policy(),
    )
    .start_payment(&session, state.cart_locks(), &Customer::from(&customer))
    .await?;
    tracing::info!(order_id = %handoff.order_number, total = %handoff.total, "Payment session opened");

    Ok(Json(PaymentResponse {
        token: handoff.token,
        client_key: state.config().payment.client_key.clone(),
        redirect_url: handoff.redirect_url,
        order_id: handoff.order_number,
        total: handoff.total,
    }))
}

/// Confirm payment for the current order and clear the cart.
///
/// A repeat visit reports the order without touching stock again.
#[instrument(skip_all, fields(customer = %customer.email))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
) -> Result<Response> {
    let Some(order_number) =
        read_session_value::<OrderNumber>(&session, session_keys::CURRENT_ORDER_ID).await
    else {
        return Ok(Redirect::to("/dashboard").into_response());
    };

    let lifecycle = OrderLifecycle::new(state.store());
    let found = lifecycle.find_owned(&order_number, &customer.email).await?;

    let newly_confirmed = if found.order.status == OrderStatus::Pending {
        match lifecycle.confirm_payment(&order_number).await {
            Ok(_) => true,
            // Another request confirmed it first
            Err(OrderError::InvalidTransition { .. }) => false,
            Err(e) => return Err(e.into()),
        }
    } else {
        false
    };

    CartService::new(state.store(), state.cart_locks())
        .clear(&session)
        .await?;
    session.remove_value(session_keys::CHECKOUT).await?;
    session.remove_value(session_keys::PAYMENT).await?;

    let order = lifecycle.find_owned(&order_number, &customer.email).await?;
    Ok(Json(SuccessView {
        order,
        newly_confirmed,
    })
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> CheckoutForm {
        CheckoutForm {
            shipping_method: "regular".to_string(),
            notes: " leave at the door ".to_string(),
            full_name: "Ni Luh Putu".to_string(),
            phone: "08123456789".to_string(),
            email: "putu@loka.co".to_string(),
            address: "Jl. Raya Ubud 12".to_string(),
            city: "Gianyar".to_string(),
            postal_code: "80571".to_string(),
            province: "Bali".to_string(),
        }
    }

    #[test]
    fn test_form_builds_trimmed_intent() {
        let intent = form().into_intent().unwrap();
        assert_eq!(intent.notes, "leave at the door");
        assert_eq!(intent.shipping.city, "Gianyar");
    }

    #[test]
    fn test_form_rejects_blank_required_field() {
        let mut blank = form();
        blank.city = "  ".to_string();
        let err = blank.into_intent().unwrap_err();
        assert_eq!(err.to_string(), "Bad request: city is required");
    }
}
