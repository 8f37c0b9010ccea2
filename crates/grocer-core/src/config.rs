//! # Business Rules
//!
//! The configurable constants behind pricing and the order lifecycle.
//!
//! ## Defaults
//! ```text
//! ┌──────────────────────────────┬──────────────────────────┐
//! │ vat_rate                     │ 18%                      │
//! │ minimum_cart_value           │ $10.00                   │
//! │ max_delivery_lead_hours      │ 48                       │
//! │ cancellation_window_hours    │ 24                       │
//! │ loyalty                      │ 5 orders → 10% off       │
//! └──────────────────────────────┴──────────────────────────┘
//! ```
//!
//! Loaded from a TOML file and environment variables by `grocer-db`'s
//! settings loader; any field left out keeps its default.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationWindow;
use crate::error::{RuleViolation, ValidationError};
use crate::loyalty::LoyaltySettings;
use crate::money::Money;
use crate::pricing::PricingEngine;
use crate::types::Rate;
use crate::{CANCELLATION_WINDOW_HOURS, MAX_DELIVERY_LEAD_HOURS, MINIMUM_CART_VALUE, VAT_RATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessRules {
    pub vat_rate: Rate,
    pub minimum_cart_value: Money,
    pub max_delivery_lead_hours: i64,
    pub cancellation_window_hours: i64,
    /// Used when the ledger has no stored loyalty settings yet.
    pub loyalty: LoyaltySettings,
}

impl Default for BusinessRules {
    fn default() -> Self {
        BusinessRules {
            vat_rate: VAT_RATE,
            minimum_cart_value: MINIMUM_CART_VALUE,
            max_delivery_lead_hours: MAX_DELIVERY_LEAD_HOURS,
            cancellation_window_hours: CANCELLATION_WINDOW_HOURS,
            loyalty: LoyaltySettings::default(),
        }
    }
}

impl BusinessRules {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.vat_rate > Rate::FULL {
            return Err(ValidationError::OutOfRange {
                field: "vat_rate".to_string(),
                min: 0,
                max: Rate::FULL.bps() as i64,
            });
        }
        if self.minimum_cart_value.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "minimum_cart_value".to_string(),
            });
        }
        if self.max_delivery_lead_hours <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "max_delivery_lead_hours".to_string(),
            });
        }
        if self.cancellation_window_hours <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "cancellation_window_hours".to_string(),
            });
        }
        self.loyalty.validate()
    }

    pub fn pricing(&self) -> PricingEngine {
        PricingEngine::new(self.vat_rate)
    }

    pub fn cancellation_window(&self) -> CancellationWindow {
        CancellationWindow::new(self.cancellation_window_hours)
    }

    /// Earliest and latest acceptable delivery slot for an order placed now.
    pub fn delivery_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now, now + Duration::hours(self.max_delivery_lead_hours))
    }

    /// Requested delivery must not be in the past and not beyond the lead window.
    pub fn check_requested_delivery(
        &self,
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RuleViolation> {
        let (earliest, latest) = self.delivery_window(now);
        if requested < earliest || requested > latest {
            return Err(RuleViolation::DeliveryWindow {
                requested,
                earliest,
                latest,
            });
        }
        Ok(())
    }
}
