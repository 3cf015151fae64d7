//! Customer order dashboard and order actions.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use loka_core::OrderNumber;
use loka_core::order::{CustomerOrderStats, Order, OrderWithItems};

use crate::db::OrderStore;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::CurrentCustomer;
use crate::services::orders::OrderLifecycle;
use crate::state::AppState;

/// Customer dashboard data.
#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub customer: CurrentCustomer,
    /// Newest first.
    pub orders: Vec<Order>,
    pub stats: CustomerOrderStats,
}

/// Outcome of a customer action on an order.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

/// Parse an order number from the path. Malformed numbers are simply not found.
fn parse_order_number(raw: &str) -> Result<OrderNumber> {
    OrderNumber::parse(raw).map_err(|_| AppError::NotFound("Order not found".to_string()))
}

/// Display the customer's orders with per-status counts.
#[instrument(skip_all, fields(customer = %customer.email))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
) -> Result<Json<DashboardView>> {
    let orders = state.store().orders_for_customer(&customer.email).await?;
    let stats = CustomerOrderStats::from_orders(&orders);

    Ok(Json(DashboardView {
        customer,
        orders,
        stats,
    }))
}

/// Display one of the customer's orders.
///
/// Orders placed by someone else are reported as not found.
#[instrument(skip(state, customer), fields(customer = %customer.email))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Path(order_id): Path<String>,
) -> Result<Json<OrderWithItems>> {
    let order_number = parse_order_number(&order_id)?;
    let order = OrderLifecycle::new(state.store())
        .find_owned(&order_number, &customer.email)
        .await?;
    Ok(Json(order))
}

/// Cancel one of the customer's orders.
#[instrument(skip(state, customer), fields(customer = %customer.email))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Path(order_id): Path<String>,
) -> Response {
    let result = async {
        let order_number = parse_order_number(&order_id)?;
        OrderLifecycle::new(state.store())
            .cancel(&order_number, &customer.email)
            .await
            .map_err(AppError::from)
    }
    .await;

    match result {
        Ok(order) => Json(ActionResponse {
            success: true,
            message: format!("Order {} has been cancelled", order.order_number),
        })
        .into_response(),
        Err(err) => action_failure(err),
    }
}

/// JSON failure body with the error's status.
fn action_failure(err: AppError) -> Response {
    let status = err.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        // Logged and captured like any other server error
        return err.into_response();
    }
    (
        status,
        Json(ActionResponse {
            success: false,
            message: err.public_message(),
        }),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loka_core::{OrderEvent, OrderStatus};

    use super::*;
    use crate::services::orders::OrderError;

    #[test]
    fn test_malformed_order_number_is_not_found() {
        let err = parse_order_number("12345").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_action_failure_keeps_status() {
        let err = AppError::Order(OrderError::InvalidTransition {
            from: OrderStatus::Completed,
            event: OrderEvent::Cancelled,
        });
        assert_eq!(action_failure(err).status(), StatusCode::CONFLICT);
    }
}
