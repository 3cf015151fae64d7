//! Orders and the customers who place them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::types::{Email, Money, OrderId, OrderItemId, OrderNumber, OrderStatus, ProductId};

/// The person placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Customer {
    pub email: Email,
    pub name: String,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub customer_email: Email,
    pub customer_name: String,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `email` placed this order.
    #[must_use]
    pub fn is_owned_by(&self, email: &Email) -> bool {
        &self.customer_email == email
    }
}

/// A line of a persisted order.
///
/// Product fields are copies taken when the order was placed; editing or
/// deleting the product later does not change them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderItem {
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Line of an order that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl From<&CartItem> for NewOrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

/// Everything needed to store an order and its lines in one go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer: Customer,
    pub total_amount: Money,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Build a pending order from cart lines.
    #[must_use]
    pub fn from_cart(
        order_number: OrderNumber,
        customer: Customer,
        items: &[CartItem],
        total_amount: Money,
    ) -> Self {
        Self {
            order_number,
            customer,
            total_amount,
            items: items.iter().map(NewOrderItem::from).collect(),
        }
    }
}

/// Per-customer summary shown on the order dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrderStats {
    pub total_orders: usize,
    pub pending: usize,
    pub paid: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Sum of every order total, whatever its status.
    pub total_spending: Money,
}

impl CustomerOrderStats {
    #[must_use]
    pub fn from_orders(orders: &[Order]) -> Self {
        orders.iter().fold(Self::default(), |mut stats, order| {
            stats.total_orders += 1;
            match order.status {
                OrderStatus::Pending => stats.pending += 1,
                OrderStatus::Paid => stats.paid += 1,
                OrderStatus::Completed => stats.completed += 1,
                OrderStatus::Cancelled => stats.cancelled += 1,
            }
            stats.total_spending += order.total_amount;
            stats
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(status: OrderStatus, total: i64) -> Order {
        Order {
            id: OrderId::new(1),
            order_number: OrderNumber::generate(),
            customer_email: Email::parse("dewi@loka.co").unwrap(),
            customer_name: "Dewi".to_owned(),
            total_amount: Money::from_major(total),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ownership_is_exact_email_match() {
        let o = order(OrderStatus::Pending, 1);
        assert!(o.is_owned_by(&Email::parse("dewi@loka.co").unwrap()));
        assert!(!o.is_owned_by(&Email::parse("Dewi@loka.co").unwrap()));
    }

    #[test]
    fn test_item_subtotal_is_derived() {
        let item = OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(1),
            product_id: ProductId::new(3),
            product_name: "Sambal".to_owned(),
            unit_price: Money::from_major(25_000),
            quantity: 4,
        };
        assert_eq!(item.subtotal(), Money::from_major(100_000));
    }

    #[test]
    fn test_stats() {
        let orders = [
            order(OrderStatus::Pending, 100),
            order(OrderStatus::Paid, 200),
            order(OrderStatus::Cancelled, 300),
        ];
        let stats = CustomerOrderStats::from_orders(&orders);
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.paid, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total_spending, Money::from_major(600));
    }
}
