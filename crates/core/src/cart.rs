//! The session cart.
//!
//! A cart is an ordered list of lines, one per product. It lives in the
//! customer's session, never in the catalog, and holds snapshots of the
//! product as it was when added. Two invariants hold for every value of
//! [`Cart`], including ones deserialized from a session:
//!
//! - no two lines share a product id
//! - every line has a quantity of at least 1

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::types::{Money, ProductId};

/// The catalog facts a cart line copies at add time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i32,
    pub image: Option<String>,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            stock: product.stock,
            image: product.image.clone(),
        }
    }
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    /// Price when the line was first added.
    pub unit_price: Money,
    pub quantity: u32,
    /// Stock at the last add or refresh. Informational only.
    pub stock_snapshot: i32,
    pub image: Option<String>,
}

impl CartItem {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Rejected session payloads.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("cart has more than one line for product {0}")]
    DuplicateProduct(ProductId),
    #[error("cart line for product {0} has zero quantity")]
    ZeroQuantity(ProductId),
}

/// A customer's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add `quantity` units of a product.
    ///
    /// Re-adding a product already in the cart increments its line; the
    /// original price snapshot is kept and the stock snapshot refreshed.
    /// A quantity of 0 is treated as 1. Returns the line's new quantity.
    pub fn add(&mut self, product: &ProductSnapshot, quantity: u32) -> u32 {
        let quantity = quantity.max(1);
        if let Some(line) = self.line_mut(product.product_id) {
            line.quantity = line.quantity.saturating_add(quantity);
            line.stock_snapshot = product.stock;
            return line.quantity;
        }
        self.items.push(CartItem {
            product_id: product.product_id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            stock_snapshot: product.stock,
            image: product.image.clone(),
        });
        quantity
    }

    /// Remove a product's line. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| line.product_id != product_id);
        self.items.len() != before
    }

    /// Change a line's quantity by `delta`, never going below 1.
    ///
    /// Returns the new quantity, or `None` if the product is not in the cart.
    pub fn adjust_quantity(&mut self, product_id: ProductId, delta: i32) -> Option<u32> {
        let line = self.line_mut(product_id)?;
        let adjusted = i64::from(line.quantity) + i64::from(delta);
        line.quantity = u32::try_from(adjusted.max(1)).unwrap_or(u32::MAX);
        Some(line.quantity)
    }

    /// Replace stock snapshots with current values.
    ///
    /// Products missing from `stock` keep their previous snapshot.
    pub fn refresh_stock(&mut self, stock: &HashMap<ProductId, i32>) {
        for line in &mut self.items {
            if let Some(current) = stock.get(&line.product_id) {
                line.stock_snapshot = *current;
            }
        }
    }

    /// Product ids in line order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|line| line.product_id).collect()
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|line| line.product_id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Σ line subtotals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }
}

impl TryFrom<Vec<CartItem>> for Cart {
    type Error = CartError;

    fn try_from(items: Vec<CartItem>) -> Result<Self, Self::Error> {
        let mut seen = std::collections::HashSet::with_capacity(items.len());
        for line in &items {
            if line.quantity == 0 {
                return Err(CartError::ZeroQuantity(line.product_id));
            }
            if !seen.insert(line.product_id) {
                return Err(CartError::DuplicateProduct(line.product_id));
            }
        }
        Ok(Self { items })
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(id: i32, price: i64, stock: i32) -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::new(id),
            name: format!("Produk {id}"),
            price: Money::from_major(price),
            stock,
            image: None,
        }
    }

    #[test]
    fn test_add_merges_lines() {
        let mut cart = Cart::new();
        cart.add(&snapshot(1, 100_000, 5), 1);
        cart.add(&snapshot(2, 50_000, 9), 1);
        let qty = cart.add(&snapshot(1, 120_000, 4), 2);

        assert_eq!(qty, 3);
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.item_count(), 4);
        let line = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(line.unit_price, Money::from_major(100_000));
        assert_eq!(line.stock_snapshot, 4);
    }

    #[test]
    fn test_add_zero_quantity_counts_as_one() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(&snapshot(1, 10, 1), 0), 1);
    }

    #[test]
    fn test_adjust_quantity_clamps_at_one() {
        let mut cart = Cart::new();
        cart.add(&snapshot(1, 10, 1), 2);
        assert_eq!(cart.adjust_quantity(ProductId::new(1), -5), Some(1));
        assert_eq!(cart.adjust_quantity(ProductId::new(1), 3), Some(4));
        assert_eq!(cart.adjust_quantity(ProductId::new(9), 1), None);
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cart = Cart::new();
        cart.add(&snapshot(1, 10, 1), 1);
        assert!(!cart.remove(ProductId::new(2)));
        assert!(cart.remove(ProductId::new(1)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_refresh_stock_keeps_stale_snapshot_for_missing() {
        let mut cart = Cart::new();
        cart.add(&snapshot(1, 10, 5), 1);
        cart.add(&snapshot(2, 10, 7), 1);
        let stock = HashMap::from([(ProductId::new(1), 2)]);
        cart.refresh_stock(&stock);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().stock_snapshot, 2);
        assert_eq!(cart.get(ProductId::new(2)).unwrap().stock_snapshot, 7);
    }

    #[test]
    fn test_subtotal() {
        let mut cart = Cart::new();
        cart.add(&snapshot(1, 100_000, 5), 2);
        cart.add(&snapshot(2, 50_000, 5), 1);
        assert_eq!(cart.subtotal(), Money::from_major(250_000));
    }

    #[test]
    fn test_deserialize_rejects_broken_invariants() {
        let mut cart = Cart::new();
        cart.add(&snapshot(1, 10, 1), 1);
        let json = serde_json::to_value(&cart).unwrap();
        let line = json[0].clone();

        let duplicated = serde_json::Value::Array(vec![line.clone(), line.clone()]);
        assert!(serde_json::from_value::<Cart>(duplicated).is_err());

        let mut zero = line;
        zero["quantity"] = 0.into();
        assert!(serde_json::from_value::<Cart>(serde_json::Value::Array(vec![zero])).is_err());

        assert_eq!(serde_json::from_value::<Cart>(json).unwrap(), cart);
    }
}
