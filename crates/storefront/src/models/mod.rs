//! Values the storefront keeps in the customer's session.

pub mod session;

pub use session::{CheckoutIntent, CurrentCustomer, ShippingInfo, keys as session_keys};
