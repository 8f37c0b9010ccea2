//! # Domain Types
//!
//! Core domain types used throughout GreenGrocer.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │   OrderLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id (UUID)      │   │  product_id     │       │
//! │  │  name           │   │  customer_id    │   │  product_name   │       │
//! │  │  category       │   │  carrier_id?    │   │  quantity       │       │
//! │  │  price_per_kg   │   │  status         │   │  unit_price     │       │
//! │  │  stock          │   │  pricing        │   │  (frozen)       │       │
//! │  │  threshold      │   │  lines          │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Rate       │   │  OrderStatus    │   │    Category     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  Pending        │   │  Vegetable      │       │
//! │  │  1800 = 18%     │   │  Selected       │   │  Fruit          │       │
//! │  └─────────────────┘   │  Delivered      │   └─────────────────┘       │
//! │                        │  Cancelled      │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use ts_rs::TS;

use crate::money::Money;
use crate::pricing::{AppliedDiscounts, PriceBreakdown};
use crate::quantity::Quantity;

// =============================================================================
// Rate
// =============================================================================

/// A percentage in basis points (1 bps = 0.01%).
///
/// Used for VAT, coupon and loyalty discounts. Rates add when discounts
/// stack: 10% loyalty + 5% coupon = 15%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100%.
    pub const FULL: Rate = Rate(10_000);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a whole percentage.
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        Rate(percent * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// True for a discount percentage in (0%, 100%].
    #[inline]
    pub const fn is_valid_discount(&self) -> bool {
        self.0 > 0 && self.0 <= Rate::FULL.0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl Add for Rate {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Rate(self.0 + other.0)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
        }
    }
}

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Vegetable,
    Fruit,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Vegetable => f.write_str("VEGETABLE"),
            Category::Fruit => f.write_str("FRUIT"),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product on the shelf, priced per kilogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Display name, snapshotted into cart and order lines.
    pub name: String,

    pub category: Category,

    /// Regular price per kilogram.
    pub price_per_kg: Money,

    /// Current stock. Never negative.
    pub stock: Quantity,

    /// At or below this level the product sells at double price.
    pub threshold: Quantity,
}

impl Product {
    /// True when stock has fallen to the threshold or below.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.threshold
    }

    /// Price a customer pays per kilogram right now.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::{Category, Money, Product, Quantity};
    ///
    /// let mut apple = Product {
    ///     id: "p-apple".into(),
    ///     name: "Apple".into(),
    ///     category: Category::Fruit,
    ///     price_per_kg: Money::from_cents(300),
    ///     stock: Quantity::from_kilograms(5),
    ///     threshold: Quantity::from_kilograms(5),
    /// };
    /// assert_eq!(apple.effective_price().cents(), 600); // at threshold: doubled
    ///
    /// apple.stock = Quantity::from_grams(5001);
    /// assert_eq!(apple.effective_price().cents(), 300);
    /// ```
    #[inline]
    pub fn effective_price(&self) -> Money {
        crate::pricing::effective_price(self)
    }

    #[inline]
    pub fn is_out_of_stock(&self) -> bool {
        !self.stock.is_positive()
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle state of an order.
///
/// ```text
/// PENDING --claim--> SELECTED --complete--> DELIVERED
///    │
///    └──cancel (within window)--> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, waiting for a carrier.
    Pending,
    /// Claimed by exactly one carrier.
    Selected,
    /// Delivered. Terminal.
    Delivered,
    /// Cancelled by the customer. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Legal edges of the state machine.
    pub const fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Selected)
                | (OrderStatus::Selected, OrderStatus::Delivered)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Lowercase name, as stored.
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Selected => "selected",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A line of a placed order.
///
/// ## Snapshot Pattern
/// Name and unit price are copied from the cart at checkout and never
/// change afterwards, even if the product is renamed or repriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: Quantity,
    /// Per-kilogram price frozen when the line was first added to the cart.
    pub unit_price: Money,
    pub line_total: Money,
}

/// A customer order.
///
/// Lines, pricing and discounts are frozen at checkout. Only `status`,
/// `carrier_id` and `delivery_time` move afterwards, and only through the
/// lifecycle's claim / complete / cancel operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub customer_id: String,

    /// Set when a carrier claims the order.
    pub carrier_id: Option<String>,

    pub status: OrderStatus,

    #[ts(as = "String")]
    pub order_time: DateTime<Utc>,

    /// Delivery slot the customer asked for.
    #[ts(as = "String")]
    pub requested_delivery: DateTime<Utc>,

    /// Set on completion.
    #[ts(as = "Option<String>")]
    pub delivery_time: Option<DateTime<Utc>>,

    pub pricing: PriceBreakdown,

    pub discounts: AppliedDiscounts,

    pub lines: Vec<OrderLine>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        self.pricing.subtotal
    }

    #[inline]
    pub fn discount(&self) -> Money {
        self.pricing.discount
    }

    #[inline]
    pub fn vat(&self) -> Money {
        self.pricing.vat
    }

    #[inline]
    pub fn total(&self) -> Money {
        self.pricing.total
    }

    /// Total weight across all lines.
    pub fn total_quantity(&self) -> Quantity {
        self.lines
            .iter()
            .fold(Quantity::zero(), |acc, line| acc + line.quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
