//! # Pricing Engine
//!
//! Pure functions turning a cart into what the customer owes.
//!
//! ## Calculation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► line_total (price/kg × kg, rounded) ──► subtotal            │
//! │                                                       │                 │
//! │  loyalty % + coupon %  ──► discount_percent           │                 │
//! │                                  │                    │                 │
//! │                                  ▼                    ▼                 │
//! │                        discount = subtotal × percent (rounded)         │
//! │                        after_discount = subtotal - discount            │
//! │                        vat = after_discount × 18% (rounded)            │
//! │                        total = after_discount + vat (exact)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discounts stack additively on the percentage; they are never compounded.
//! Each rounded component is rounded exactly once, so the stored figures
//! always satisfy `subtotal - discount + vat == total`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::CartLine;
use crate::money::Money;
use crate::types::{Product, Rate};
use crate::VAT_RATE;

// =============================================================================
// Applied Discounts
// =============================================================================

/// A coupon as it was applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedCoupon {
    pub coupon_id: String,
    pub code: String,
    pub percent: Rate,
}

/// Discounts applied to one order: loyalty, at most one coupon, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedDiscounts {
    pub loyalty: Option<Rate>,
    pub coupon: Option<AppliedCoupon>,
}

impl AppliedDiscounts {
    pub fn none() -> Self {
        AppliedDiscounts::default()
    }

    /// Sum of the applied percentages, capped at 100%.
    pub fn total_percent(&self) -> Rate {
        let loyalty = self.loyalty.unwrap_or_default();
        let coupon = self
            .coupon
            .as_ref()
            .map(|c| c.percent)
            .unwrap_or_default();
        (loyalty + coupon).min(Rate::FULL)
    }

    pub fn is_empty(&self) -> bool {
        self.loyalty.is_none() && self.coupon.is_none()
    }

    #[inline]
    pub fn uses_loyalty(&self) -> bool {
        self.loyalty.is_some()
    }
}

// =============================================================================
// Price Breakdown
// =============================================================================

/// Frozen amounts of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub discount_percent: Rate,
    pub discount: Money,
    pub after_discount: Money,
    pub vat: Money,
    pub total: Money,
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Returns `price_per_kg × 2` when the product is at or below its
/// low-stock threshold, else `price_per_kg`.
pub fn effective_price(product: &Product) -> Money {
    if product.is_low_stock() {
        product.price_per_kg.doubled()
    } else {
        product.price_per_kg
    }
}

/// Stateless calculator parameterised by the VAT rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingEngine {
    vat_rate: Rate,
}

impl Default for PricingEngine {
    fn default() -> Self {
        PricingEngine::new(VAT_RATE)
    }
}

impl PricingEngine {
    pub const fn new(vat_rate: Rate) -> Self {
        PricingEngine { vat_rate }
    }

    #[inline]
    pub fn vat_rate(&self) -> Rate {
        self.vat_rate
    }

    /// `quantity × unit_price_at_add`.
    #[inline]
    pub fn line_total(&self, line: &CartLine) -> Money {
        line.line_total()
    }

    pub fn subtotal<'a>(&self, lines: impl IntoIterator<Item = &'a CartLine>) -> Money {
        lines.into_iter().map(|line| self.line_total(line)).sum()
    }

    /// `subtotal × percent`. Percentages above 100% are treated as 100%.
    pub fn discount_amount(&self, subtotal: Money, percent: Rate) -> Money {
        subtotal.apply_rate(percent.min(Rate::FULL))
    }

    pub fn vat(&self, after_discount: Money) -> Money {
        after_discount.apply_rate(self.vat_rate)
    }

    /// `(subtotal - discount) + vat`, where `discount_percent` is the sum
    /// of every applied discount.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    /// use grocer_core::pricing::PricingEngine;
    /// use grocer_core::types::Rate;
    ///
    /// let engine = PricingEngine::default();
    /// let total = engine.grand_total(Money::from_cents(10_000), Rate::from_percent(15));
    /// assert_eq!(total.cents(), 10_030); // 85.00 + 15.30
    /// ```
    pub fn grand_total(&self, subtotal: Money, discount_percent: Rate) -> Money {
        self.breakdown(subtotal, discount_percent).total
    }

    /// Computes every frozen amount for a given subtotal and percent.
    pub fn breakdown(&self, subtotal: Money, discount_percent: Rate) -> PriceBreakdown {
        let discount_percent = discount_percent.min(Rate::FULL);
        let discount = self.discount_amount(subtotal, discount_percent);
        let after_discount = subtotal - discount;
        let vat = self.vat(after_discount);

        PriceBreakdown {
            subtotal,
            discount_percent,
            discount,
            after_discount,
            vat,
            total: after_discount + vat,
        }
    }

    /// Prices a set of cart lines under the given discounts.
    pub fn quote<'a>(
        &self,
        lines: impl IntoIterator<Item = &'a CartLine>,
        discounts: &AppliedDiscounts,
    ) -> PriceBreakdown {
        self.breakdown(self.subtotal(lines), discounts.total_percent())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;
    use crate::types::Category;

    fn product(stock_g: i64, threshold_g: i64) -> Product {
        Product {
            id: "p-1".to_string(),
            name: "Carrot".to_string(),
            category: Category::Vegetable,
            price_per_kg: Money::from_cents(250),
            stock: Quantity::from_grams(stock_g),
            threshold: Quantity::from_grams(threshold_g),
        }
    }

    fn line(product_id: &str, grams: i64, cents: i64) -> CartLine {
        CartLine {
            product_id: product_id.to_string(),
            product_name: product_id.to_string(),
            quantity: Quantity::from_grams(grams),
            unit_price: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_effective_price_doubles_at_threshold() {
        assert_eq!(effective_price(&product(5000, 5000)).cents(), 500);
        assert_eq!(effective_price(&product(4999, 5000)).cents(), 500);
        assert_eq!(effective_price(&product(5001, 5000)).cents(), 250);
        assert_eq!(effective_price(&product(0, 0)).cents(), 500);
    }

    #[test]
    fn test_subtotal_sums_rounded_lines() {
        let engine = PricingEngine::default();
        let lines = vec![line("a", 1500, 450), line("b", 250, 299)];
        // 6.75 + 0.75 (74.75 rounded)
        assert_eq!(engine.subtotal(&lines).cents(), 750);
    }

    #[test]
    fn test_stacked_discount_example() {
        let engine = PricingEngine::default();
        let discounts = AppliedDiscounts {
            loyalty: Some(Rate::from_percent(10)),
            coupon: Some(AppliedCoupon {
                coupon_id: "c-1".to_string(),
                code: "FIVE".to_string(),
                percent: Rate::from_percent(5),
            }),
        };
        let b = engine.breakdown(Money::from_cents(10_000), discounts.total_percent());

        assert_eq!(b.discount_percent, Rate::from_percent(15));
        assert_eq!(b.discount.cents(), 1500);
        assert_eq!(b.after_discount.cents(), 8500);
        assert_eq!(b.vat.cents(), 1530);
        assert_eq!(b.total.cents(), 10_030);
    }

    #[test]
    fn test_grand_total_without_discount_adds_vat() {
        let engine = PricingEngine::default();
        for cents in [0, 1, 999, 1000, 12_345, 10_000_000] {
            let s = Money::from_cents(cents);
            assert_eq!(engine.grand_total(s, Rate::zero()), s + s.apply_rate(VAT_RATE));
        }
        assert_eq!(engine.grand_total(Money::from_cents(1000), Rate::zero()).cents(), 1180);
    }

    #[test]
    fn test_components_never_drift_from_total() {
        let engine = PricingEngine::default();
        for cents in [1, 7, 333, 1001, 4567, 99_999] {
            for pct in [0, 3, 5, 10, 15, 33, 100] {
                let b = engine.breakdown(Money::from_cents(cents), Rate::from_percent(pct));
                assert_eq!(b.subtotal - b.discount + b.vat, b.total);
            }
        }
    }

    #[test]
    fn test_discount_capped_at_full() {
        let engine = PricingEngine::default();
        let b = engine.breakdown(Money::from_cents(5000), Rate::from_percent(120));
        assert_eq!(b.discount_percent, Rate::FULL);
        assert_eq!(b.total, Money::zero());
    }

    #[test]
    fn test_quote_uses_all_lines() {
        let engine = PricingEngine::new(Rate::from_percent(10));
        let lines = vec![line("a", 2000, 500), line("b", 1000, 1000)];
        let quote = engine.quote(&lines, &AppliedDiscounts::none());
        assert_eq!(quote.subtotal.cents(), 2000);
        assert_eq!(quote.vat.cents(), 200);
        assert_eq!(quote.total.cents(), 2200);
    }
}
