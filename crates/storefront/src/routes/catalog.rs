//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use loka_core::ProductId;
use loka_core::catalog::{Category, Product};

use crate::db::{CatalogStore, ProductFilter};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::CurrentCustomer;
use crate::state::AppState;

/// How many related products a product page shows.
const RELATED_PRODUCTS: i64 = 4;

/// Home page data.
#[derive(Debug, Serialize)]
pub struct HomeView {
    pub customer: Option<CurrentCustomer>,
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
}

/// Product page data.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub product: Product,
    pub related: Vec<Product>,
}

/// Display the home page: active products with an image, and all categories.
#[instrument(skip(state, customer))]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
) -> Result<Json<HomeView>> {
    let filter = ProductFilter {
        with_image_only: true,
        ..ProductFilter::storefront()
    };
    let products = state.store().list_products(&filter).await?;
    let categories = state.store().list_categories().await?;

    Ok(Json(HomeView {
        customer,
        categories,
        products,
    }))
}

/// List all categories.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.store().list_categories().await?))
}

/// Display an active product and others from its category.
#[instrument(skip(state))]
pub async fn product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProductView>> {
    let id = ProductId::new(id);
    let product = state
        .store()
        .get_product(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let filter = ProductFilter {
        category: Some(product.category_id),
        exclude: Some(product.id),
        limit: Some(RELATED_PRODUCTS),
        ..ProductFilter::storefront()
    };
    let related = state.store().list_products(&filter).await?;

    Ok(Json(ProductView { product, related }))
}
