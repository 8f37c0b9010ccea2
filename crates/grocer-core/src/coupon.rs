//! # Coupon Policy
//!
//! Validity and applicability rules for discount coupons.
//!
//! ```text
//! is_valid(today) = active
//!                 ∧ (no expiry ∨ expiry >= today)
//!                 ∧ (max_usage = 0 ∨ usage_count < max_usage)
//!
//! applicable      = is_valid ∧ subtotal >= min_order_value
//! ```
//!
//! An invalid coupon and a coupon under its minimum are separate errors so
//! the storefront can tell the customer which one it was.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{RuleViolation, ValidationError};
use crate::money::Money;
use crate::pricing::AppliedCoupon;
use crate::types::Rate;

/// A discount coupon issued by the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Coupon {
    pub id: String,

    /// Unique code the customer types at checkout.
    pub code: String,

    pub discount_percent: Rate,

    /// Smallest subtotal the coupon may be applied to.
    pub min_order_value: Money,

    /// Last day the coupon can be used. `None` never expires.
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,

    pub active: bool,

    /// 0 means unlimited.
    pub max_usage: u32,

    pub usage_count: u32,
}

impl Coupon {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.map_or(false, |expiry| expiry < today)
    }

    pub fn is_usage_limit_reached(&self) -> bool {
        self.max_usage > 0 && self.usage_count >= self.max_usage
    }

    pub fn is_valid(&self, today: NaiveDate) -> bool {
        self.active && !self.is_expired(today) && !self.is_usage_limit_reached()
    }

    pub fn meets_minimum(&self, subtotal: Money) -> bool {
        subtotal >= self.min_order_value
    }

    /// Both rules, with the specific reason on failure.
    pub fn check_applicable(&self, subtotal: Money, today: NaiveDate) -> Result<(), RuleViolation> {
        if !self.is_valid(today) {
            return Err(RuleViolation::CouponInvalid {
                code: self.code.clone(),
            });
        }
        if !self.meets_minimum(subtotal) {
            return Err(RuleViolation::CouponBelowMinimum {
                code: self.code.clone(),
                minimum: self.min_order_value,
            });
        }
        Ok(())
    }

    /// Frozen view stored on the order.
    pub fn applied(&self) -> AppliedCoupon {
        AppliedCoupon {
            coupon_id: self.id.clone(),
            code: self.code.clone(),
            percent: self.discount_percent,
        }
    }

    /// Field checks for a coupon about to be created.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "code".to_string(),
            });
        }
        if self.code.len() > 32 {
            return Err(ValidationError::TooLong {
                field: "code".to_string(),
                max: 32,
            });
        }
        if !self.discount_percent.is_valid_discount() {
            return Err(ValidationError::OutOfRange {
                field: "discount_percent".to_string(),
                min: 1,
                max: 100,
            });
        }
        if self.min_order_value.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "min_order_value".to_string(),
            });
        }
        Ok(())
    }
}
