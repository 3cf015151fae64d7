//! Order administration through the lifecycle engine.
//!
//! # Usage
//!
//! ```bash
//! loka orders list --status pending --limit 20
//! loka orders show LOKA-<uuid>
//! loka orders mark-paid LOKA-<uuid>
//! loka orders complete LOKA-<uuid>
//! loka orders cancel LOKA-<uuid>
//! ```
//!
//! Staff actions follow the same state machine and stock rules as the
//! storefront: marking paid takes stock, cancelling returns it.

use tracing::info;

use loka_core::order::Order;
use loka_core::{OrderNumber, OrderStatus};
use loka_storefront::db::OrderStore;
use loka_storefront::services::orders::OrderLifecycle;

use super::{CommandError, connect};

/// Staff actions on a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    MarkPaid,
    Complete,
    Cancel,
}

fn log_order(order: &Order) {
    info!(
        "{}  {:<9}  {:>14}  {} <{}>  {}",
        order.order_number,
        order.status,
        order.total_amount.display_idr(),
        order.customer_name,
        order.customer_email,
        order.created_at.format("%Y-%m-%d %H:%M"),
    );
}

/// Parse an optional status filter.
///
/// # Errors
///
/// Returns `InvalidInput` for an unknown status name.
pub fn parse_status(status: Option<&str>) -> Result<Option<OrderStatus>, CommandError> {
    status
        .map(|s| {
            s.parse::<OrderStatus>()
                .map_err(|_| CommandError::InvalidInput(format!("unknown status '{s}'")))
        })
        .transpose()
}

/// List orders, newest first.
///
/// # Errors
///
/// Returns an error for an unknown status or a database failure.
pub async fn list(status: Option<&str>, limit: i64) -> Result<(), CommandError> {
    let status = parse_status(status)?;
    let store = connect().await?;
    let orders = store.list_orders(status, Some(limit)).await?;

    info!("{} orders", orders.len());
    for order in &orders {
        log_order(order);
    }
    Ok(())
}

/// Show an order and its items.
///
/// # Errors
///
/// Returns an error for a malformed or unknown order number.
pub async fn show(order_number: &str) -> Result<(), CommandError> {
    let order_number = OrderNumber::parse(order_number)?;
    let store = connect().await?;
    let found = OrderLifecycle::new(&store)
        .find(&order_number)
        .await?
        .ok_or_else(|| CommandError::InvalidInput(format!("order {order_number} not found")))?;

    log_order(&found.order);
    for item in &found.items {
        info!(
            "    {} x {} @ {} = {}",
            item.quantity,
            item.product_name,
            item.unit_price.display_idr(),
            item.subtotal().display_idr(),
        );
    }
    Ok(())
}

/// Apply a staff action to an order.
///
/// # Errors
///
/// Returns an error for a malformed order number, an unknown order, or a
/// transition the order's status does not allow.
pub async fn apply(order_number: &str, action: OrderAction) -> Result<(), CommandError> {
    let order_number = OrderNumber::parse(order_number)?;
    let store = connect().await?;
    let lifecycle = OrderLifecycle::new(&store);

    let order = match action {
        OrderAction::MarkPaid => lifecycle.confirm_payment(&order_number).await?,
        OrderAction::Complete => lifecycle.complete(&order_number).await?,
        OrderAction::Cancel => lifecycle.cancel_by_staff(&order_number).await?,
    };

    info!(order_id = %order.order_number, status = %order.status, "Order updated");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("paid")).unwrap(), Some(OrderStatus::Paid));
        assert!(parse_status(Some("shipped")).is_err());
    }
}
