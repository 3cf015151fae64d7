//! Session-related types.
//!
//! Every value stored in the session has a typed shape. A payload that no
//! longer deserializes is treated as absent and logged, see
//! [`read_session_value`].

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tower_sessions::Session;

use loka_core::Email;
use loka_core::order::Customer;

/// Session-stored customer identity.
///
/// Authentication is a session flag: the presence of this value means the
/// visitor is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub email: Email,
    pub name: String,
}

impl From<&CurrentCustomer> for Customer {
    fn from(current: &CurrentCustomer) -> Self {
        Self {
            email: current.email.clone(),
            name: current.name.clone(),
        }
    }
}

/// Shipping details entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub province: String,
}

/// What the customer submitted on the checkout page, kept until payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutIntent {
    pub shipping_method: String,
    #[serde(default)]
    pub notes: String,
    pub shipping: ShippingInfo,
}

/// Session keys.
pub mod keys {
    /// The logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// The cart.
    pub const CART: &str = "cart";

    /// Checkout form submitted but not yet paid.
    pub const CHECKOUT: &str = "checkout";

    /// Order number of the last payment session started.
    pub const CURRENT_ORDER_ID: &str = "current_order_id";

    /// Payment session handed to the browser for the current order.
    pub const PAYMENT: &str = "payment";
}

/// Read a typed value from the session.
///
/// Store failures and payloads that fail to deserialize both yield `None`;
/// the latter are removed so the next write starts clean.
pub async fn read_session_value<T>(session: &Session, key: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    match session.get::<T>(key).await {
        Ok(value) => value,
        Err(tower_sessions::session::Error::SerdeJson(e)) => {
            tracing::warn!(key, error = %e, "Discarding unreadable session value");
            if let Err(e) = session.remove_value(key).await {
                tracing::warn!(key, error = %e, "Failed to remove unreadable session value");
            }
            None
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read session value");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_unreadable_value_is_absent() {
        let session = session();
        session.insert(keys::CURRENT_CUSTOMER, "not a customer").await.unwrap();

        let customer: Option<CurrentCustomer> =
            read_session_value(&session, keys::CURRENT_CUSTOMER).await;
        assert!(customer.is_none());
        assert!(session.get_value(keys::CURRENT_CUSTOMER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let session = session();
        let customer = CurrentCustomer {
            email: Email::parse("wayan@loka.co").unwrap(),
            name: "Wayan".to_owned(),
        };
        session.insert(keys::CURRENT_CUSTOMER, &customer).await.unwrap();
        assert_eq!(
            read_session_value::<CurrentCustomer>(&session, keys::CURRENT_CUSTOMER).await,
            Some(customer)
        );
    }
}
