//! Catalog records.
//!
//! Categories and products are read-mostly. Stock is the only product field
//! that changes during normal trading, and only through the order lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, Money, ProductId, Slug};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Derived from the name on creation and never changed afterwards.
    pub slug: Slug,
    pub description: String,
}

/// A product offered in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: Money,
    /// Units on hand. Never negative.
    pub stock: i32,
    /// Asset reference for the product photo.
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether customers can see and buy this product.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_active
    }

    /// Whether the product has a photo; the home page only lists these.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|i| !i.trim().is_empty())
    }

    /// Whether stock has fallen below the reorder threshold.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock < LOW_STOCK_THRESHOLD
    }
}

/// Products with fewer units than this are flagged on the dashboard.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

/// Input for creating a category. The slug is derived by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Input for creating a product. The slug is derived by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub category_id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock: i32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Errors from validating catalog input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("stock cannot be negative")]
    NegativeStock,
}

impl NewCategory {
    /// Check the input before it reaches the store.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyName`] for a blank name.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        Ok(())
    }
}

impl NewProduct {
    /// Check the input before it reaches the store.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank name, negative price or negative stock.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if self.price < Money::ZERO {
            return Err(CatalogError::NegativePrice);
        }
        if self.stock < 0 {
            return Err(CatalogError::NegativeStock);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            category_id: CategoryId::new(1),
            name: "Kain Songket".to_owned(),
            description: String::new(),
            price: Money::from_major(450_000),
            stock: 3,
            image: None,
            is_active: true,
        }
    }

    #[test]
    fn test_validate_new_product() {
        assert_eq!(new_product().validate(), Ok(()));

        let blank = NewProduct {
            name: "  ".to_owned(),
            ..new_product()
        };
        assert_eq!(blank.validate(), Err(CatalogError::EmptyName));

        let negative = NewProduct {
            price: Money::new(Decimal::new(-1, 0)),
            ..new_product()
        };
        assert_eq!(negative.validate(), Err(CatalogError::NegativePrice));

        let oversold = NewProduct {
            stock: -1,
            ..new_product()
        };
        assert_eq!(oversold.validate(), Err(CatalogError::NegativeStock));
    }

    #[test]
    fn test_new_category_requires_name() {
        let category = NewCategory {
            name: String::new(),
            description: String::new(),
        };
        assert_eq!(category.validate(), Err(CatalogError::EmptyName));
    }
}
