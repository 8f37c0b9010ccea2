//! # Quantity Module
//!
//! Weighed quantities for stock, thresholds, cart lines and order lines.
//!
//! Produce is sold by the kilogram. Storing grams as an integer keeps the
//! low-stock comparison (`stock <= threshold`) exact at the boundary and
//! lets the ledger decrement stock with a single integer update.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

/// Grams in one kilogram.
pub const GRAMS_PER_KG: i64 = 1000;

/// A weight in grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    #[inline]
    pub const fn from_grams(grams: i64) -> Self {
        Quantity(grams)
    }

    #[inline]
    pub const fn from_kilograms(kg: i64) -> Self {
        Quantity(kg * GRAMS_PER_KG)
    }

    /// Converts a kilogram figure typed by a user, rounded to the gram.
    ///
    /// Only meant for input boundaries; all arithmetic stays in grams.
    pub fn from_kg_f64(kg: f64) -> Self {
        Quantity((kg * GRAMS_PER_KG as f64).round() as i64)
    }

    #[inline]
    pub const fn grams(&self) -> i64 {
        self.0
    }

    /// Returns the weight in kilograms (for display only).
    #[inline]
    pub fn kilograms(&self) -> f64 {
        self.0 as f64 / GRAMS_PER_KG as f64
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Subtraction that floors at zero.
    #[inline]
    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        Quantity((self.0 - other.0).max(0))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(
            f,
            "{}{}.{:03} kg",
            sign,
            abs / GRAMS_PER_KG,
            abs % GRAMS_PER_KG
        )
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::zero()
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Quantity::from_kilograms(3).grams(), 3000);
        assert_eq!(Quantity::from_kg_f64(1.25).grams(), 1250);
        assert_eq!(Quantity::from_kg_f64(0.1 + 0.2).grams(), 300);
        assert!((Quantity::from_grams(2500).kilograms() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::from_grams(2500).to_string(), "2.500 kg");
        assert_eq!(Quantity::from_grams(5).to_string(), "0.005 kg");
        assert_eq!(Quantity::zero().to_string(), "0.000 kg");
    }

    #[test]
    fn test_saturating_sub() {
        let five = Quantity::from_kilograms(5);
        let two = Quantity::from_kilograms(2);
        assert_eq!(five.saturating_sub(two), Quantity::from_kilograms(3));
        assert_eq!(two.saturating_sub(five), Quantity::zero());
    }
}
