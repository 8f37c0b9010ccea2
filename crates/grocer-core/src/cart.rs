//! # Cart
//!
//! In-memory shopping cart for one session.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Customer Action        Cart Method              Change                 │
//! │  ───────────────        ───────────              ──────                 │
//! │  Add 1.5 kg tomato ───► add()          ───► new line (price frozen)     │
//! │  Add 0.5 kg tomato ───► add()          ───► same line, 2.0 kg,          │
//! │                                             first price kept            │
//! │  Edit quantity ───────► set_quantity() ───► line.quantity = n           │
//! │  Remove ──────────────► remove()       ───► line dropped                │
//! │  Checkout / logout ───► clear()        ───► empty                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart never looks at live stock. Callers run [`Cart::ensure_can_add`]
//! against a fresh product before adding; the ledger re-checks at checkout.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::Product;
use crate::validation::{validate_cart_size, validate_price, validate_quantity};
use crate::MAX_CART_LINES;

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,

    /// Product name when first added (frozen).
    pub product_name: String,

    pub quantity: Quantity,

    /// Effective per-kilogram price when first added (frozen).
    pub unit_price: Money,
}

impl CartLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.times_quantity(self.quantity)
    }
}

/// A shopping cart. At most one line per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds a quantity of a product.
    ///
    /// If the product is already in the cart the quantities merge and the
    /// price captured by the first add is kept.
    pub fn add(
        &mut self,
        product_id: &str,
        product_name: &str,
        quantity: Quantity,
        unit_price: Money,
    ) -> Result<(), ValidationError> {
        validate_quantity(quantity)?;

        match self.line_mut(product_id) {
            Some(line) => {
                let merged = line.quantity + quantity;
                validate_quantity(merged)?;
                line.quantity = merged;
            }
            None => {
                validate_cart_size(self.lines.len())?;
                self.lines.push(CartLine {
                    product_id: product_id.to_string(),
                    product_name: product_name.to_string(),
                    quantity,
                    unit_price,
                })
            }
        }
        Ok(())
    }

    /// Checks stock against a fresh product, then adds it at its current
    /// effective price.
    pub fn add_product(&mut self, product: &Product, quantity: Quantity) -> CoreResult<()> {
        self.ensure_can_add(product, quantity)?;
        self.add(&product.id, &product.name, quantity, product.effective_price())?;
        Ok(())
    }

    /// Rejects an add that would take the line past available stock.
    pub fn ensure_can_add(&self, product: &Product, quantity: Quantity) -> CoreResult<()> {
        validate_quantity(quantity)?;

        let in_cart = self.quantity_of(&product.id);
        let requested = in_cart + quantity;
        if requested > product.stock {
            return Err(CoreError::InsufficientStock {
                product: product.name.clone(),
                available: product.stock.saturating_sub(in_cart),
                requested: quantity,
            });
        }
        Ok(())
    }

    /// Removes the product's line. No-op if absent.
    pub fn remove(&mut self, product_id: &str) {
        self.lines.retain(|line| line.product_id != product_id);
    }

    /// Replaces a line's quantity. Stock is not re-checked here.
    pub fn set_quantity(&mut self, product_id: &str, quantity: Quantity) -> Result<(), ValidationError> {
        validate_quantity(quantity)?;

        let line = self
            .line_mut(product_id)
            .ok_or_else(|| ValidationError::NotInCart {
                product_id: product_id.to_string(),
            })?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Takes out what an order was placed from.
    ///
    /// Lines untouched since `placed` was snapshotted are dropped. A line
    /// that grew in the meantime keeps only the extra quantity, and products
    /// added after the snapshot stay as they are.
    pub fn remove_placed(&mut self, placed: &Cart) {
        for placed_line in placed.lines() {
            let Some(line) = self.line_mut(&placed_line.product_id) else {
                continue;
            };
            if line.quantity > placed_line.quantity {
                line.quantity -= placed_line.quantity;
            } else {
                self.remove(&placed_line.product_id);
            }
        }
    }

    /// Re-checks every line.
    ///
    /// A cart built through [`Cart::add`] always passes. One that arrived
    /// deserialized may not, so checkout runs this before touching stock.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lines.len() > MAX_CART_LINES {
            return Err(ValidationError::OutOfRange {
                field: "cart lines".to_string(),
                min: 0,
                max: MAX_CART_LINES as i64,
            });
        }

        let mut seen = HashSet::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.product_id.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "product_id".to_string(),
                });
            }
            validate_quantity(line.quantity)?;
            validate_price(line.unit_price)?;
            if !seen.insert(line.product_id.as_str()) {
                return Err(ValidationError::InvalidFormat {
                    field: "product_id".to_string(),
                    reason: format!("{} appears more than once", line.product_id),
                });
            }
        }
        Ok(())
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: &str) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.product_id == product_id)
    }

    /// Quantity of a product already in the cart (zero if absent).
    pub fn quantity_of(&self, product_id: &str) -> Quantity {
        self.line(product_id)
            .map(|line| line.quantity)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// `subtotal >= minimum`.
    pub fn meets_minimum(&self, minimum: Money) -> bool {
        self.subtotal() >= minimum
    }

    /// How much more the customer has to add to reach the minimum.
    pub fn amount_to_minimum(&self, minimum: Money) -> Money {
        let subtotal = self.subtotal();
        if subtotal >= minimum {
            Money::zero()
        } else {
            minimum - subtotal
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use crate::MAX_LINE_QUANTITY;

    fn tomato(stock_kg: i64) -> Product {
        Product {
            id: "p-tomato".to_string(),
            name: "Tomato".to_string(),
            category: Category::Vegetable,
            price_per_kg: Money::from_cents(400),
            stock: Quantity::from_kilograms(stock_kg),
            threshold: Quantity::from_kilograms(2),
        }
    }

    #[test]
    fn test_merge_keeps_first_price() {
        let mut cart = Cart::new();
        cart.add("p-1", "Apple", Quantity::from_grams(1500), Money::from_cents(300))
            .unwrap();
        cart.add("p-1", "Apple", Quantity::from_grams(500), Money::from_cents(600))
            .unwrap();

        assert_eq!(cart.len(), 1);
        let line = cart.line("p-1").unwrap();
        assert_eq!(line.quantity, Quantity::from_grams(2000));
        assert_eq!(line.unit_price, Money::from_cents(300));
        assert_eq!(cart.subtotal(), Money::from_cents(600));
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add("p-1", "Apple", Quantity::zero(), Money::from_cents(300)),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(cart.is_empty());

        cart.add("p-1", "Apple", Quantity::from_grams(100), Money::from_cents(300))
            .unwrap();
        assert!(cart.set_quantity("p-1", Quantity::from_grams(-1)).is_err());
        assert_eq!(cart.quantity_of("p-1"), Quantity::from_grams(100));
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add("p-1", "Apple", Quantity::from_kilograms(1), Money::from_cents(300))
            .unwrap();

        cart.set_quantity("p-1", Quantity::from_kilograms(4)).unwrap();
        assert_eq!(cart.quantity_of("p-1"), Quantity::from_kilograms(4));

        assert!(matches!(
            cart.set_quantity("p-2", Quantity::from_kilograms(1)),
            Err(ValidationError::NotInCart { .. })
        ));

        cart.remove("p-2");
        assert_eq!(cart.len(), 1);
        cart.remove("p-1");
        assert!(cart.is_empty());
    }

    #[test]
    fn test_minimum_gating() {
        let minimum = Money::from_cents(1000);
        let mut cart = Cart::new();
        cart.add("p-1", "Apple", Quantity::from_kilograms(3), Money::from_cents(300))
            .unwrap();

        assert!(!cart.meets_minimum(minimum));
        assert_eq!(cart.amount_to_minimum(minimum), Money::from_cents(100));

        cart.add("p-1", "Apple", Quantity::from_grams(334), Money::from_cents(300))
            .unwrap();
        assert!(cart.meets_minimum(minimum));
        assert_eq!(cart.amount_to_minimum(minimum), Money::zero());
    }

    #[test]
    fn test_add_product_checks_stock_including_cart() {
        let mut cart = Cart::new();
        let product = tomato(3);

        cart.add_product(&product, Quantity::from_kilograms(2)).unwrap();
        let err = cart
            .add_product(&product, Quantity::from_kilograms(2))
            .unwrap_err();
        match err {
            CoreError::InsufficientStock { available, requested, .. } => {
                assert_eq!(available, Quantity::from_kilograms(1));
                assert_eq!(requested, Quantity::from_kilograms(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(cart.quantity_of("p-tomato"), Quantity::from_kilograms(2));

        cart.add_product(&product, Quantity::from_kilograms(1)).unwrap();
        assert_eq!(cart.quantity_of("p-tomato"), Quantity::from_kilograms(3));
    }

    #[test]
    fn test_add_product_freezes_effective_price() {
        let mut cart = Cart::new();
        let low = tomato(2);
        cart.add_product(&low, Quantity::from_kilograms(1)).unwrap();
        assert_eq!(cart.line("p-tomato").unwrap().unit_price, Money::from_cents(800));
    }

    #[test]
    fn test_merge_cannot_pass_line_limit() {
        let mut cart = Cart::new();
        cart.add("p-1", "Apple", MAX_LINE_QUANTITY, Money::from_cents(300))
            .unwrap();

        assert!(matches!(
            cart.add("p-1", "Apple", MAX_LINE_QUANTITY, Money::from_cents(300)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(cart.quantity_of("p-1"), MAX_LINE_QUANTITY);

        cart.set_quantity("p-1", Quantity::from_kilograms(999)).unwrap();
        cart.add("p-1", "Apple", Quantity::from_kilograms(1), Money::from_cents(300))
            .unwrap();
        assert_eq!(cart.quantity_of("p-1"), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_validate_deserialized_cart() {
        let good: Cart = serde_json::from_str(
            r#"{"lines":[
                {"product_id":"p-1","product_name":"Apple","quantity":1500,"unit_price":300},
                {"product_id":"p-2","product_name":"Pear","quantity":500,"unit_price":700}
            ]}"#,
        )
        .unwrap();
        assert!(good.validate().is_ok());

        let negative: Cart = serde_json::from_str(
            r#"{"lines":[
                {"product_id":"p-1","product_name":"Apple","quantity":1500,"unit_price":300},
                {"product_id":"p-2","product_name":"Pear","quantity":-5000,"unit_price":700}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            negative.validate(),
            Err(ValidationError::MustBePositive { .. })
        ));

        let duplicated: Cart = serde_json::from_str(
            r#"{"lines":[
                {"product_id":"p-1","product_name":"Apple","quantity":1500,"unit_price":300},
                {"product_id":"p-1","product_name":"Apple","quantity":500,"unit_price":300}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            duplicated.validate(),
            Err(ValidationError::InvalidFormat { .. })
        ));

        let free: Cart = serde_json::from_str(
            r#"{"lines":[{"product_id":"p-1","product_name":"Apple","quantity":1500,"unit_price":0}]}"#,
        )
        .unwrap();
        assert!(free.validate().is_err());
    }

    #[test]
    fn test_remove_placed_keeps_later_additions() {
        let mut cart = Cart::new();
        cart.add("p-1", "Apple", Quantity::from_kilograms(2), Money::from_cents(300))
            .unwrap();
        cart.add("p-2", "Pear", Quantity::from_kilograms(1), Money::from_cents(700))
            .unwrap();
        let placed = cart.clone();

        cart.add("p-2", "Pear", Quantity::from_kilograms(3), Money::from_cents(700))
            .unwrap();
        cart.add("p-3", "Kiwi", Quantity::from_grams(500), Money::from_cents(1300))
            .unwrap();

        cart.remove_placed(&placed);

        assert_eq!(cart.len(), 2);
        assert!(cart.line("p-1").is_none());
        assert_eq!(cart.quantity_of("p-2"), Quantity::from_kilograms(3));
        assert_eq!(cart.quantity_of("p-3"), Quantity::from_grams(500));

        let mut same = placed.clone();
        same.remove_placed(&placed);
        assert!(same.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.add("p-1", "Apple", Quantity::from_kilograms(1), Money::from_cents(300))
            .unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Money::zero());
    }
}
