//! Business logic for the storefront.
//!
//! # Services
//!
//! - `cart` - session cart mutations under a per-session lock
//! - `orders` - order lifecycle engine (status machine + stock adjustments)
//! - `payment` - payment gateway adapter (Midtrans Snap)
//! - `checkout` - totals, gateway handoff and order creation
//! - `audit` - login/logout history
//! - `reports` - operator dashboard metrics
//!
//! Services borrow a store and are generic over the store traits, so the
//! same code runs against `PostgreSQL` and the in-memory store.

pub mod audit;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod payment;
pub mod reports;
