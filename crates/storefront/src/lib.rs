//! Loka Storefront library.
//!
//! Catalog browsing, session cart, checkout through Midtrans Snap and the
//! order lifecycle, served with axum over `PostgreSQL`. Exposed as a library
//! so the CLI and integration tests share the same stores and services.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
