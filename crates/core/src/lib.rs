//! Loka Core - domain types for the Loka storefront.
//!
//! This crate is shared by the components of the workspace:
//! - `storefront` - HTTP server for customers
//! - `cli` - operator tooling (migrations, catalog, orders, audit)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Cart mutation, checkout totals and
//! the order status machine all live here so they can be tested without a
//! runtime.
//!
//! # Modules
//!
//! - [`types`] - ids, money, emails, slugs and statuses
//! - [`catalog`] - category and product records
//! - [`cart`] - session cart and its invariants
//! - [`checkout`] - totals calculation
//! - [`order`] - orders, order items and customers
//! - [`audit`] - login history and user-agent classification

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod audit;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod order;
pub mod types;

pub use types::*;
