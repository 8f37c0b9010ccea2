//! # Carrier Ratings
//!
//! After a delivery the customer may rate the carrier once, 1 to 5 stars,
//! with an optional comment. Owners and carriers see the average.
//!
//! ```text
//! rate(order, customer) allowed iff
//!     order.customer_id = customer
//!   ∧ order.status      = DELIVERED
//!   ∧ no rating stored for the order yet
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;
pub const MAX_COMMENT_LENGTH: usize = 500;

/// One customer's rating of the carrier who delivered an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rating {
    pub id: String,

    /// At most one rating per order.
    pub order_id: String,

    pub customer_id: String,

    /// Carrier recorded on the order when it was delivered.
    pub carrier_id: String,

    /// Stars, 1 to 5.
    pub score: u8,

    pub comment: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_score(self.score)?;
        if let Some(comment) = &self.comment {
            if comment.chars().count() > MAX_COMMENT_LENGTH {
                return Err(ValidationError::TooLong {
                    field: "comment".to_string(),
                    max: MAX_COMMENT_LENGTH,
                });
            }
        }
        Ok(())
    }
}

pub fn validate_score(score: u8) -> Result<(), ValidationError> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(ValidationError::OutOfRange {
            field: "score".to_string(),
            min: MIN_SCORE.into(),
            max: MAX_SCORE.into(),
        });
    }
    Ok(())
}

/// Blank comments are stored as no comment.
pub fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// A carrier's average score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CarrierRating {
    pub carrier_id: String,
    /// 0.0 when the carrier has no ratings yet.
    pub average: f64,
    pub count: u32,
}

impl CarrierRating {
    pub fn unrated(carrier_id: &str) -> Self {
        CarrierRating {
            carrier_id: carrier_id.to_string(),
            average: 0.0,
            count: 0,
        }
    }

    /// Averages the given ratings. Callers pass one carrier's ratings.
    pub fn from_ratings(carrier_id: &str, ratings: &[Rating]) -> Self {
        if ratings.is_empty() {
            return Self::unrated(carrier_id);
        }
        let sum: u32 = ratings.iter().map(|r| u32::from(r.score)).sum();
        CarrierRating {
            carrier_id: carrier_id.to_string(),
            average: f64::from(sum) / ratings.len() as f64,
            count: ratings.len() as u32,
        }
    }

    pub fn is_rated(&self) -> bool {
        self.count > 0
    }
}
