//! Catalog edits.
//!
//! # Usage
//!
//! ```bash
//! loka catalog add-category -n Kopi -d "Single-origin coffee"
//! loka catalog add-product -c 1 -n "Kopi Toraja 250g" -p 95000 -s 40
//! loka catalog set-stock -p 3 -s 25
//! loka catalog delete-category -i 2
//! loka catalog list
//! ```

use tracing::{info, warn};

use loka_core::catalog::{NewCategory, NewProduct};
use loka_core::{CategoryId, Money, ProductId};
use loka_storefront::db::{CatalogStore, ProductFilter};

use super::{CommandError, connect};

/// Create a category; its slug is derived from the name.
///
/// # Errors
///
/// Returns an error for a blank name, a duplicate, or a database failure.
pub async fn add_category(name: &str, description: &str) -> Result<(), CommandError> {
    let new = NewCategory {
        name: name.trim().to_owned(),
        description: description.to_owned(),
    };
    new.validate()?;

    let store = connect().await?;
    let category = store.create_category(&new).await?;
    info!(id = %category.id, slug = %category.slug, "Category created: {}", category.name);
    Ok(())
}

/// Arguments for a new product.
#[derive(Debug)]
pub struct ProductArgs {
    pub category_id: i32,
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: i32,
    pub image: Option<String>,
    pub inactive: bool,
}

impl ProductArgs {
    fn into_new_product(self) -> Result<NewProduct, CommandError> {
        let price = Money::parse_non_negative(&self.price)
            .map_err(|e| CommandError::InvalidInput(format!("price: {e}")))?;
        let new = NewProduct {
            category_id: CategoryId::new(self.category_id),
            name: self.name.trim().to_owned(),
            description: self.description,
            price,
            stock: self.stock,
            image: self.image.filter(|i| !i.trim().is_empty()),
            is_active: !self.inactive,
        };
        new.validate()?;
        Ok(new)
    }
}

/// Create a product; a slug collision gets a numeric suffix.
///
/// # Errors
///
/// Returns an error for invalid input or a database failure.
pub async fn add_product(args: ProductArgs) -> Result<(), CommandError> {
    let new = args.into_new_product()?;

    let store = connect().await?;
    let product = store.create_product(&new).await?;
    info!(
        id = %product.id,
        slug = %product.slug,
        price = %product.price.display_idr(),
        stock = product.stock,
        "Product created: {}",
        product.name
    );
    Ok(())
}

/// Set a product's stock level.
///
/// # Errors
///
/// Returns an error for negative stock, an unknown product, or a database
/// failure.
pub async fn set_stock(product_id: i32, stock: i32) -> Result<(), CommandError> {
    if stock < 0 {
        return Err(CommandError::InvalidInput("stock cannot be negative".to_string()));
    }

    let store = connect().await?;
    let product_id = ProductId::new(product_id);
    if store.set_stock(product_id, stock).await? {
        info!(%product_id, stock, "Stock updated");
        Ok(())
    } else {
        Err(CommandError::InvalidInput(format!("product {product_id} not found")))
    }
}

/// Delete a category and, with it, its products.
///
/// # Errors
///
/// Returns an error for an unknown category or a database failure.
pub async fn delete_category(category_id: i32) -> Result<(), CommandError> {
    let store = connect().await?;
    let category_id = CategoryId::new(category_id);
    if store.delete_category(category_id).await? {
        warn!(%category_id, "Category and its products deleted");
        Ok(())
    } else {
        Err(CommandError::InvalidInput(format!("category {category_id} not found")))
    }
}

/// List categories and every product, active or not.
///
/// # Errors
///
/// Returns an error if a query fails.
pub async fn list() -> Result<(), CommandError> {
    let store = connect().await?;
    let categories = store.list_categories().await?;
    let products = store.list_products(&ProductFilter::default()).await?;

    for category in &categories {
        info!("[{}] {} ({})", category.id, category.name, category.slug);
        for product in products.iter().filter(|p| p.category_id == category.id) {
            info!(
                "    [{}] {} - {} - stock {}{}{}",
                product.id,
                product.name,
                product.price.display_idr(),
                product.stock,
                if product.is_low_stock() { " (low)" } else { "" },
                if product.is_active { "" } else { " (inactive)" },
            );
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(price: &str, stock: i32) -> ProductArgs {
        ProductArgs {
            category_id: 1,
            name: " Teh Melati ".to_string(),
            description: String::new(),
            price: price.to_string(),
            stock,
            image: Some(String::new()),
            inactive: false,
        }
    }

    #[test]
    fn test_product_args_build_new_product() {
        let new = args("35000", 60).into_new_product().unwrap();
        assert_eq!(new.name, "Teh Melati");
        assert_eq!(new.price, Money::from_major(35_000));
        assert_eq!(new.image, None);
        assert!(new.is_active);
    }

    #[test]
    fn test_product_args_reject_bad_values() {
        assert!(matches!(
            args("-5", 1).into_new_product(),
            Err(CommandError::InvalidInput(_))
        ));
        assert!(matches!(
            args("1000", -1).into_new_product(),
            Err(CommandError::Catalog(_))
        ));
    }
}
