//! Checkout totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::types::Money;

/// Value added tax applied to the subtotal (10%).
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Default flat shipping fee in rupiah.
pub const DEFAULT_SHIPPING_FEE: i64 = 15_000;

/// How shipping is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Charged once per order whenever the subtotal is above zero.
    pub flat_fee: Money,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Money::from_major(DEFAULT_SHIPPING_FEE),
        }
    }
}

/// Amounts shown at checkout and charged through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl CheckoutTotals {
    /// Compute totals for a set of cart lines.
    ///
    /// ```
    /// use loka_core::checkout::{CheckoutTotals, ShippingPolicy};
    /// use loka_core::Money;
    ///
    /// let totals = CheckoutTotals::compute(&[], &ShippingPolicy::default());
    /// assert_eq!(totals.total, Money::ZERO);
    /// ```
    #[must_use]
    pub fn compute(items: &[CartItem], policy: &ShippingPolicy) -> Self {
        let subtotal: Money = items.iter().map(CartItem::subtotal).sum();
        let shipping = if subtotal.is_positive() {
            policy.flat_fee
        } else {
            Money::ZERO
        };
        let tax = subtotal.apply_rate(TAX_RATE);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{Cart, ProductSnapshot};
    use crate::types::ProductId;

    fn product(id: i32, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::new(id),
            name: format!("P{id}"),
            price: Money::from_major(price),
            stock: 10,
            image: None,
        }
    }

    #[test]
    fn test_two_line_cart() {
        let mut cart = Cart::new();
        cart.add(&product(1, 100_000), 2);
        cart.add(&product(2, 50_000), 1);

        let totals = CheckoutTotals::compute(cart.items(), &ShippingPolicy::default());
        assert_eq!(totals.subtotal, Money::from_major(250_000));
        assert_eq!(totals.shipping, Money::from_major(15_000));
        assert_eq!(totals.tax, Money::from_major(25_000));
        assert_eq!(totals.total, Money::from_major(290_000));
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let totals = CheckoutTotals::compute(&[], &ShippingPolicy::default());
        assert_eq!(totals.shipping, Money::ZERO);
        assert_eq!(totals.total, Money::ZERO);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let mut cart = Cart::new();
        cart.add(&product(1, 33_333), 3);
        let policy = ShippingPolicy {
            flat_fee: Money::from_major(9_000),
        };
        let totals = CheckoutTotals::compute(cart.items(), &policy);
        assert_eq!(totals.total, totals.subtotal + totals.shipping + totals.tax);
        assert_eq!(totals, CheckoutTotals::compute(cart.items(), &policy));
    }
}
