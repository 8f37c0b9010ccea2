//! # Loyalty Policy
//!
//! A customer who has completed enough delivered orders may take a
//! percentage off one order. Using it resets their completed-order count
//! to zero, so the discount has to be earned again.
//!
//! ```text
//!   delivered ──► completed_orders + 1
//!   checkout with loyalty ──► completed_orders = 0
//!   checkout without loyalty ──► unchanged
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{RuleViolation, ValidationError};
use crate::types::Rate;

/// Store-wide loyalty policy (a singleton).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct LoyaltySettings {
    pub min_orders_for_discount: u32,
    pub discount_percent: Rate,
}

impl Default for LoyaltySettings {
    /// Five completed orders earn 10% off.
    fn default() -> Self {
        LoyaltySettings {
            min_orders_for_discount: 5,
            discount_percent: Rate::from_percent(10),
        }
    }
}

impl LoyaltySettings {
    pub fn is_eligible(&self, completed_orders: u32) -> bool {
        completed_orders >= self.min_orders_for_discount
    }

    /// Completed orders still missing before the discount unlocks.
    pub fn orders_needed(&self, completed_orders: u32) -> u32 {
        self.min_orders_for_discount.saturating_sub(completed_orders)
    }

    /// Returns the discount to apply, or the reason it cannot be.
    pub fn check_eligible(&self, completed_orders: u32) -> Result<Rate, RuleViolation> {
        if self.is_eligible(completed_orders) {
            Ok(self.discount_percent)
        } else {
            Err(RuleViolation::LoyaltyNotEligible {
                completed: completed_orders,
                required: self.min_orders_for_discount,
            })
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min_orders_for_discount == 0 {
            return Err(ValidationError::MustBePositive {
                field: "min_orders_for_discount".to_string(),
            });
        }
        if !self.discount_percent.is_valid_discount() {
            return Err(ValidationError::OutOfRange {
                field: "discount_percent".to_string(),
                min: 1,
                max: 100,
            });
        }
        Ok(())
    }
}
