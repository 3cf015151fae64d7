//! HTTP route handlers for storefront.
//!
//! Pages answer with JSON view data; form submissions redirect.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET  /                          - Active products with images, all categories
//! GET  /categories                - Category listing
//! GET  /products/{id}             - Product detail with related products
//!
//! # Cart
//! GET  /cart                      - Cart with refreshed stock and totals
//! POST /cart/add/{product_id}     - Add to cart (buy_now redirects to checkout)
//! POST /cart/remove/{product_id}  - Remove line
//! POST /cart/update/{product_id}  - Change quantity (JSON {"change": n})
//!
//! # Checkout (requires auth)
//! GET  /checkout                  - Checkout summary
//! POST /checkout                  - Save shipping details, continue to payment
//! GET  /payment                   - Payment summary
//! POST /payment                   - Open payment session, create pending order
//! GET  /success                   - Confirm payment, clear cart
//!
//! # Orders (requires auth)
//! GET  /dashboard                 - Customer orders and stats
//! GET  /orders/{order_id}         - Order detail (owner only)
//! POST /orders/{order_id}/cancel  - Cancel order (JSON {success, message})
//!
//! # Contact
//! GET  /contact                   - Contact page (flash message via query)
//! POST /contact/send              - Send a message
//!
//! # Auth
//! GET  /auth/login                - Login page
//! POST /auth/login                - Login action
//! GET  /auth/register             - Register page
//! POST /auth/register             - Register action
//! POST /auth/logout               - Logout action
//! ```

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod contact;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add/{product_id}", post(cart::add))
        .route("/remove/{product_id}", post(cart::remove))
        .route("/update/{product_id}", post(cart::update))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/{order_id}", get(orders::show))
        .route("/{order_id}/cancel", post(orders::cancel))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::home))
        .route("/categories", get(catalog::categories))
        .route("/products/{id}", get(catalog::product))
        .nest("/cart", cart_routes())
        .route("/checkout", get(checkout::show).post(checkout::submit))
        .route(
            "/payment",
            get(checkout::payment_page).post(checkout::start_payment),
        )
        .route("/success", get(checkout::success))
        .route("/dashboard", get(orders::dashboard))
        .nest("/orders", order_routes())
        .route("/contact", get(contact::page))
        .route("/contact/send", post(contact::send))
        .nest("/auth", auth_routes())
}
