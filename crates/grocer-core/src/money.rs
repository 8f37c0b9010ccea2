//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With doubles, subtotal - discount + vat can drift from the stored      │
//! │  total by a cent once each figure is rounded separately for display.   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents, rounded once per component               │
//! │    line total, discount and VAT are each rounded half-to-even          │
//! │    total is the exact integer sum of the rounded parts                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use grocer_core::money::Money;
//! use grocer_core::quantity::Quantity;
//!
//! let per_kg = Money::from_cents(450);            // $4.50/kg
//! let line = per_kg.times_quantity(Quantity::from_grams(1500));
//! assert_eq!(line.cents(), 675);                  // $6.75
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::quantity::{Quantity, GRAMS_PER_KG};
use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// ## Where Money is Used
/// ```text
/// Product.price_per_kg ──► effective price ──► CartLine.unit_price
///                                                   │
///                          CartLine.line_total ◄────┘
///                                 │
///        subtotal ──► discount ──► VAT ──► Order.total
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from dollars and cents.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns `self × 2`. Used for the low-stock price.
    #[inline]
    pub const fn doubled(&self) -> Self {
        Money(self.0 * 2)
    }

    /// Returns this amount scaled by a rate, rounded half-to-even to the cent.
    ///
    /// ## Bankers Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  Round half to even: 0.5 → 0, 1.5 → 2, 2.5 → 2, 3.5 → 4            │
    /// │  Ties alternate direction so repeated rounding has no bias.        │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    /// use grocer_core::types::Rate;
    ///
    /// let after_discount = Money::from_cents(8500);      // $85.00
    /// let vat = after_discount.apply_rate(Rate::from_percent(18));
    /// assert_eq!(vat.cents(), 1530);                      // $15.30
    ///
    /// // 12.5 cents is a tie and goes to the even neighbour
    /// assert_eq!(Money::from_cents(125).apply_rate(Rate::from_percent(10)).cents(), 12);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let scaled = self.0 as i128 * rate.bps() as i128;
        Money(div_round_half_even(scaled, 10_000) as i64)
    }

    /// Prices a weighed quantity at this per-kilogram price.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    /// use grocer_core::quantity::Quantity;
    ///
    /// let per_kg = Money::from_cents(299);
    /// let total = per_kg.times_quantity(Quantity::from_grams(250));
    /// assert_eq!(total.cents(), 75); // 74.75 rounds to 75
    /// ```
    pub fn times_quantity(&self, quantity: Quantity) -> Money {
        let scaled = self.0 as i128 * quantity.grams() as i128;
        Money(div_round_half_even(scaled, GRAMS_PER_KG as i128) as i64)
    }
}

/// Integer division rounding to the nearest integer, ties to even.
///
/// `den` must be positive.
pub(crate) fn div_round_half_even(num: i128, den: i128) -> i128 {
    let quotient = num.div_euclid(den);
    let twice_remainder = 2 * num.rem_euclid(den);

    if twice_remainder > den || (twice_remainder == den && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, factor: i64) -> Self {
        Money(self.0 * factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
