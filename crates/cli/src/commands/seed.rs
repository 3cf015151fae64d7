//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! categories:
//!   - name: Kopi
//!     description: Single-origin coffee
//!     products:
//!       - name: Kopi Toraja 250g
//!         price: "95000"
//!         stock: 40
//!         image: /media/products/toraja.jpg
//! ```
//!
//! Categories that already exist (by name) are reused, so a file can be
//! applied more than once to add products.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use loka_core::catalog::{NewCategory, NewProduct};
use loka_core::{CategoryId, Money};
use loka_storefront::db::CatalogStore;

use super::{CommandError, connect};

/// Top-level seed document.
#[derive(Debug, Deserialize)]
pub struct SeedCatalog {
    pub categories: Vec<SeedCategory>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl SeedCategory {
    fn new_category(&self) -> NewCategory {
        NewCategory {
            name: self.name.trim().to_owned(),
            description: self.description.clone(),
        }
    }
}

impl SeedProduct {
    fn new_product(&self, category_id: CategoryId) -> NewProduct {
        NewProduct {
            category_id,
            name: self.name.trim().to_owned(),
            description: self.description.clone(),
            price: self.price,
            stock: self.stock,
            image: self.image.clone(),
            is_active: self.is_active,
        }
    }
}

/// Parse a seed document and validate every entry.
///
/// # Errors
///
/// Returns the YAML error, or an `InvalidInput` listing every invalid entry.
pub fn parse_catalog(content: &str) -> Result<SeedCatalog, CommandError> {
    let catalog: SeedCatalog = serde_yaml::from_str(content)?;

    let mut errors = Vec::new();
    for category in &catalog.categories {
        if let Err(e) = category.new_category().validate() {
            errors.push(format!("category '{}': {e}", category.name));
        }
        for product in &category.products {
            if let Err(e) = product.new_product(CategoryId::new(0)).validate() {
                errors.push(format!("product '{}' in '{}': {e}", product.name, category.name));
            }
        }
    }

    if errors.is_empty() {
        Ok(catalog)
    } else {
        for err in &errors {
            error!("  - {err}");
        }
        Err(CommandError::InvalidInput(format!(
            "{} validation errors found",
            errors.len()
        )))
    }
}

/// Seed categories and products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, or if a
/// database operation fails.
pub async fn catalog(file_path: &str) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog = parse_catalog(&content)?;
    info!(categories = catalog.categories.len(), "Catalog validated");

    let store = connect().await?;
    let existing = store.list_categories().await?;

    let mut categories_created = 0_usize;
    let mut products_created = 0_usize;
    for seed in &catalog.categories {
        let category = match existing.iter().find(|c| c.name == seed.name.trim()) {
            Some(category) => category.clone(),
            None => {
                categories_created += 1;
                store.create_category(&seed.new_category()).await?
            }
        };

        for product in &seed.products {
            let created = store.create_product(&product.new_product(category.id)).await?;
            info!(product = %created.name, slug = %created.slug, "Product created");
            products_created += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Categories created: {categories_created}");
    info!("  Products created: {products_created}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let yaml = r#"
categories:
  - name: Kopi
    description: Single-origin coffee
    products:
      - name: Kopi Toraja 250g
        price: "95000"
        stock: 40
      - name: Kopi Kintamani 250g
        price: "85000"
        stock: 12
        is_active: false
  - name: Teh
"#;
        let catalog = parse_catalog(yaml).unwrap();
        assert_eq!(catalog.categories.len(), 2);
        let kopi = &catalog.categories[0];
        assert_eq!(kopi.products[0].price, Money::from_major(95_000));
        assert!(kopi.products[0].is_active);
        assert!(!kopi.products[1].is_active);
        assert!(catalog.categories[1].products.is_empty());
    }

    #[test]
    fn test_parse_catalog_rejects_invalid_entries() {
        let yaml = r#"
categories:
  - name: Kopi
    products:
      - name: ""
        price: "1000"
      - name: Broken stock
        price: "1000"
        stock: -3
"#;
        let err = parse_catalog(yaml).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: 2 validation errors found");
    }
}
