//! # Error Types
//!
//! Domain-specific error types for grocer-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  grocer-core errors (this file)                                        │
//! │  ├── CoreError          - Everything an operation can return           │
//! │  │   ├── ValidationError   - Bad input (quantity, empty cart, role)    │
//! │  │   ├── RuleViolation     - Business rule refused the request         │
//! │  │   ├── ConflictError     - Order not in the state the caller expects │
//! │  │   ├── InsufficientStock - Not enough product on the shelf           │
//! │  │   ├── NotFound          - Unknown order / product / coupon          │
//! │  │   └── Unavailable       - Collaborator failed (only retryable kind) │
//! │  └── LedgerError (ports) - What storage reports back                   │
//! │                                                                         │
//! │  grocer-db errors (separate crate)                                     │
//! │  └── DbError            - SQLite failures, mapped into LedgerError     │
//! │                                                                         │
//! │  Flow: DbError → LedgerError → CoreError → caller's message            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product, order id, status)
//! 3. Errors are enum variants, never String
//! 4. Each variant carries enough detail to render a specific user message

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::OrderStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a [`CoreError`].
///
/// Callers branch on this to decide between "show the message" and
/// "try again later".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    BusinessRule,
    Conflict,
    ResourceExhausted,
    NotFound,
    Unavailable,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input validation failed before any rule ran.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A business rule refused the request.
    #[error("{0}")]
    Rule(#[from] RuleViolation),

    /// The order is not in the state the requested transition needs.
    #[error("{0}")]
    Conflict(#[from] ConflictError),

    /// Not enough stock to reserve a line.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (Tomato 3.000 kg)
    ///      │
    ///      ▼
    /// reserve: stock 2.500 kg
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Tomato", available: 2.500 kg, requested: 3.000 kg }
    ///      │
    ///      ▼
    /// UI shows: "Only 2.500 kg of Tomato left"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: Quantity,
        requested: Quantity,
    },

    /// Entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A collaborator (storage, transport) failed or timed out.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Rule(_) => ErrorKind::BusinessRule,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::InsufficientStock { .. } => ErrorKind::ResourceExhausted,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Only collaborator failures are worth retrying; every rule and
    /// conflict outcome is final for that attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// True when a carrier lost the race for an order.
    pub fn is_already_claimed(&self) -> bool {
        matches!(self, CoreError::Conflict(ConflictError::AlreadyClaimed { .. }))
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet basic requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The product has no line in the cart.
    #[error("Product {product_id} is not in the cart")]
    NotInCart { product_id: String },

    /// The session's role may not perform this operation.
    #[error("Operation requires the {required} role")]
    WrongRole { required: String },
}

// =============================================================================
// Business Rule Violation
// =============================================================================

/// A request that is well-formed but refused by a business rule.
#[derive(Debug, Error)]
pub enum RuleViolation {
    /// Cart subtotal is under the minimum order value.
    #[error("Minimum order value is {minimum}, cart subtotal is {subtotal}")]
    BelowMinimum { minimum: Money, subtotal: Money },

    /// Coupon is inactive, expired, or used up.
    #[error("Coupon {code} is not valid")]
    CouponInvalid { code: String },

    /// Coupon requires a larger subtotal.
    #[error("Coupon {code} requires a minimum order of {minimum}")]
    CouponBelowMinimum { code: String, minimum: Money },

    /// This customer already redeemed the coupon.
    #[error("Coupon {code} has already been used")]
    CouponAlreadyUsed { code: String },

    /// Loyalty discount requested by a customer who has not earned it.
    #[error("Loyalty discount needs {required} completed orders, customer has {completed}")]
    LoyaltyNotEligible { completed: u32, required: u32 },

    /// Requested delivery is in the past or beyond the lead window.
    #[error("Requested delivery {requested} must be between {earliest} and {latest}")]
    DeliveryWindow {
        requested: DateTime<Utc>,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    /// Delivery time recorded on completion is before the order or in the future.
    #[error("Delivery time {delivered} must be between {order_time} and {now}")]
    DeliveryTimeInvalid {
        delivered: DateTime<Utc>,
        order_time: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// The order is older than the cancellation window.
    #[error("Order {order_id} can no longer be cancelled ({window_hours}h window has passed)")]
    CancellationWindowExpired { order_id: String, window_hours: i64 },
}

// =============================================================================
// Conflict Error
// =============================================================================

/// The order is not in the state the requested transition needs.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Another carrier claimed the order first.
    #[error("Order {order_id} was already taken by another carrier")]
    AlreadyClaimed { order_id: String },

    /// Cancellation needs a PENDING order.
    #[error("Order {order_id} is {status} and can no longer be cancelled")]
    NotPending { order_id: String, status: OrderStatus },

    /// Any other illegal edge of the state machine.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Completion by a carrier that does not hold the order.
    #[error("Order {order_id} is not assigned to carrier {carrier_id}")]
    NotAssignedCarrier { order_id: String, carrier_id: String },

    /// Cancellation or rating by someone other than the customer who placed
    /// the order.
    #[error("Order {order_id} does not belong to customer {customer_id}")]
    NotOrderOwner { order_id: String, customer_id: String },

    /// Only delivered orders can be rated.
    #[error("Order {order_id} is {status} and cannot be rated")]
    NotDelivered { order_id: String, status: OrderStatus },

    /// The order's carrier was already rated.
    #[error("Order {order_id} has already been rated")]
    AlreadyRated { order_id: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Tomato".to_string(),
            available: Quantity::from_grams(2500),
            requested: Quantity::from_grams(3000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Tomato: available 2.500 kg, requested 3.000 kg"
        );

        let err = CoreError::from(ConflictError::AlreadyClaimed {
            order_id: "o-1".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Order o-1 was already taken by another carrier"
        );
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            CoreError::from(ValidationError::EmptyCart).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            CoreError::from(RuleViolation::CouponInvalid {
                code: "X".to_string()
            })
            .kind(),
            ErrorKind::BusinessRule
        );
        assert_eq!(
            CoreError::not_found("Order", "o-1").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(CoreError::Unavailable("pool timed out".to_string()).is_retryable());
        assert!(!CoreError::from(ConflictError::AlreadyClaimed {
            order_id: "o-1".to_string()
        })
        .is_retryable());
        assert!(!CoreError::InsufficientStock {
            product: "Apple".to_string(),
            available: Quantity::zero(),
            requested: Quantity::from_grams(1),
        }
        .is_retryable());
    }

    #[test]
    fn test_already_claimed_is_distinct_from_other_conflicts() {
        let claimed = CoreError::from(ConflictError::AlreadyClaimed {
            order_id: "o-1".to_string(),
        });
        let not_pending = CoreError::from(ConflictError::NotPending {
            order_id: "o-1".to_string(),
            status: OrderStatus::Delivered,
        });
        assert!(claimed.is_already_claimed());
        assert!(!not_pending.is_already_claimed());
    }
}
