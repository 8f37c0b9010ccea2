//! # grocer-core: Order Lifecycle and Pricing for GreenGrocer
//!
//! This crate is the **heart** of GreenGrocer. It holds the pricing rules,
//! the cart, stock reservation and the order state machine. Storage and
//! notifications sit behind the traits in [`ports`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       GreenGrocer Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Customer / Carrier / Owner front ends              │   │
//! │  │     browse ──► cart ──► checkout      claim ──► deliver         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ grocer-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  pricing  │  │   cart    │  │   stock   │  │ lifecycle │  │   │
//! │  │   │ VAT, disc │  │ CartStore │  │ reserve   │  │ place     │  │   │
//! │  │   │ threshold │  │  session  │  │ alerts    │  │ claim ... │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │          ports: Catalog · Ledger · Notifier · Clock             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 grocer-db (SQLite Ledger)                       │   │
//! │  │         guarded UPDATEs, migrations, message inbox              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, OrderStatus, Rate)
//! - [`money`] / [`quantity`] - Integer cents and integer grams
//! - [`pricing`] - Threshold price, discounts, VAT
//! - [`cart`] / [`session`] - Per-session carts
//! - [`coupon`] / [`loyalty`] - Discount eligibility
//! - [`stock`] - Atomic reservation and owner alerts
//! - [`lifecycle`] - Checkout and the order state machine
//! - [`rating`] - Carrier ratings after delivery
//! - [`report`] - Sales totals over delivered orders
//! - [`ports`] - Storage and notification traits
//! - [`memory`] - In-process ledger
//! - [`error`] - Domain error types
//! - [`validation`] - Input checks
//!
//! ## Design Principles
//!
//! 1. **Integer Units**: money in cents, weight in grams, rates in basis points
//! 2. **Atomic Guards**: every contested change is one conditional update in the ledger
//! 3. **No Globals**: sessions, carts and the clock are passed in
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use grocer_core::{Money, Quantity, Rate};
//!
//! // 2.5 kg at $3.99/kg
//! let line = Money::from_cents(399).times_quantity(Quantity::from_grams(2500));
//! assert_eq!(line.cents(), 998);
//!
//! // 18% VAT with banker's rounding
//! let vat = line.apply_rate(Rate::from_percent(18));
//! assert_eq!(vat.cents(), 180);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cancellation;
pub mod cart;
pub mod clock;
pub mod config;
pub mod coupon;
pub mod error;
pub mod lifecycle;
pub mod loyalty;
pub mod memory;
pub mod money;
pub mod ports;
pub mod pricing;
pub mod quantity;
pub mod rating;
pub mod report;
pub mod session;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use grocer_core::Money` instead of
// `use grocer_core::money::Money`

pub use cart::{Cart, CartLine};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BusinessRules;
pub use coupon::Coupon;
pub use error::{ConflictError, CoreError, CoreResult, ErrorKind, RuleViolation, ValidationError};
pub use lifecycle::{CheckoutRequest, ClaimReport, OrderLifecycle};
pub use loyalty::LoyaltySettings;
pub use money::Money;
pub use ports::{Catalog, Ledger, LedgerError, Notice, NoticeKind, Notifier, Recipient};
pub use pricing::{AppliedCoupon, AppliedDiscounts, PriceBreakdown, PricingEngine};
pub use quantity::Quantity;
pub use rating::{CarrierRating, Rating};
pub use report::{ProductSales, SalesReport};
pub use session::{CartStore, Role, Session};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// VAT charged on the discounted subtotal.
///
/// ## Business Reason
/// Fixed national rate for fresh produce. Overridable through
/// [`BusinessRules`] for deployments elsewhere.
pub const VAT_RATE: Rate = Rate::from_percent(18);

/// Smallest subtotal (before discounts) that can be checked out.
///
/// ## Business Reason
/// Deliveries below $10.00 cost more to run than they earn.
pub const MINIMUM_CART_VALUE: Money = Money::from_cents(1000);

/// Latest delivery slot a customer may request, in hours from checkout.
pub const MAX_DELIVERY_LEAD_HOURS: i64 = 48;

/// How long after placing an order the customer may still cancel it.
///
/// ## Business Reason
/// Carriers plan their rounds a day ahead; after that a cancellation
/// wastes a trip.
pub const CANCELLATION_WINDOW_HOURS: i64 = 24;

/// Maximum distinct products in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single product per order.
///
/// ## Business Reason
/// Prevents accidental over-ordering (typing 5000 kg instead of 5 kg).
pub const MAX_LINE_QUANTITY: Quantity = Quantity::from_kilograms(1000);
