//! Order status and its transition rules.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a customer order.
///
/// ```text
/// pending --(payment confirmed)--> paid --(fulfilled)--> completed
/// pending --(cancelled)----------> cancelled
/// paid    --(cancelled)----------> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Completed,
    Cancelled,
}

/// Something that happens to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    /// The payment gateway reported a successful payment.
    PaymentConfirmed,
    /// The order was shipped or handed over.
    Fulfilled,
    /// The customer or staff cancelled the order.
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Paid, Self::Completed, Self::Cancelled];

    /// Status reached by applying `event`, or `None` if the transition is
    /// not allowed.
    #[must_use]
    pub const fn transition(self, event: OrderEvent) -> Option<Self> {
        match (self, event) {
            (Self::Pending, OrderEvent::PaymentConfirmed) => Some(Self::Paid),
            (Self::Paid, OrderEvent::Fulfilled) => Some(Self::Completed),
            (Self::Pending | Self::Paid, OrderEvent::Cancelled) => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled orders accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether a customer may still cancel an order in this status.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }

    /// Whether the order counts towards revenue.
    #[must_use]
    pub const fn counts_as_revenue(self) -> bool {
        matches!(self, Self::Paid | Self::Completed)
    }

    /// Lowercase name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

impl std::fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaymentConfirmed => write!(f, "payment confirmed"),
            Self::Fulfilled => write!(f, "fulfilled"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert_eq!(
            OrderStatus::Pending.transition(OrderEvent::PaymentConfirmed),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            OrderStatus::Paid.transition(OrderEvent::Fulfilled),
            Some(OrderStatus::Completed)
        );
        assert_eq!(
            OrderStatus::Paid.transition(OrderEvent::Cancelled),
            Some(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn test_terminal_statuses_reject_every_event() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(status.is_terminal());
            for event in [
                OrderEvent::PaymentConfirmed,
                OrderEvent::Fulfilled,
                OrderEvent::Cancelled,
            ] {
                assert_eq!(status.transition(event), None);
            }
        }
    }

    #[test]
    fn test_no_skipping_payment() {
        assert_eq!(OrderStatus::Pending.transition(OrderEvent::Fulfilled), None);
        assert_eq!(OrderStatus::Paid.transition(OrderEvent::PaymentConfirmed), None);
    }

    #[test]
    fn test_string_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
