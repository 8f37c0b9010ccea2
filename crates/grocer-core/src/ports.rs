//! # Collaborator Ports
//!
//! The narrow interfaces the order lifecycle calls into.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     OrderLifecycle / StockLedger                        │
//! │                │                  │                    │                │
//! │                ▼                  ▼                    ▼                │
//! │          ┌──────────┐      ┌────────────┐       ┌────────────┐          │
//! │          │ Catalog  │◄─────│   Ledger   │       │  Notifier  │          │
//! │          │ product  │      │ reserve    │       │  notify    │          │
//! │          └──────────┘      │ claim      │       │ (fire and  │          │
//! │                            │ cancel     │       │  forget)   │          │
//! │                            │ complete   │       └────────────┘          │
//! │                            └────────────┘                               │
//! │                                  │                                      │
//! │             InMemoryLedger (memory.rs) · SqliteLedger (grocer-db)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Atomicity Contract
//! `reserve_stock`, `claim_order`, `cancel_order` and `complete_order` are
//! each one atomic conditional mutation in storage. They must hold across
//! processes sharing the store, so an in-process lock alone does not satisfy
//! them. `claim_order` and `cancel_order` guard on the same PENDING status:
//! at most one of them ever succeeds for an order. `insert_rating` stores at
//! most one rating per order the same way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;

use crate::coupon::Coupon;
use crate::error::{CoreError, ValidationError};
use crate::loyalty::LoyaltySettings;
use crate::quantity::Quantity;
use crate::rating::{CarrierRating, Rating};
use crate::report::SalesReport;
use crate::types::{Order, OrderStatus, Product};

// =============================================================================
// Ledger Error
// =============================================================================

/// What storage reports back.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Refused before anything was written.
    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),

    /// Storage failed, timed out, or is closed.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            LedgerError::Invalid(err) => CoreError::Validation(err),
            LedgerError::Unavailable(msg) => CoreError::Unavailable(msg),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Conditional Update Outcomes
// =============================================================================

/// A successful stock decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    /// The product as it is after the decrement.
    pub product: Product,
    /// Stock before the decrement.
    pub before: Quantity,
}

impl StockChange {
    #[inline]
    pub fn after(&self) -> Quantity {
        self.product.stock
    }
}

/// Result of `reserve_stock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockUpdate {
    Reserved(StockChange),
    /// Nothing changed; this much was on the shelf.
    Insufficient { available: Quantity },
}

/// Result of a status transition primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The guard held; the order as it is now.
    Applied(Order),
    /// The guard failed; nothing changed.
    Rejected {
        current: OrderStatus,
        carrier_id: Option<String>,
    },
}

/// Result of `insert_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted,
    /// This customer already redeemed the order's coupon. Nothing was written.
    CouponAlreadyRedeemed,
    /// The coupon hit its usage limit. Nothing was written.
    CouponExhausted,
}

// =============================================================================
// Catalog & Ledger
// =============================================================================

/// Read access to products.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// `NotFound` when the id is unknown.
    async fn product(&self, id: &str) -> LedgerResult<Product>;

    async fn products(&self) -> LedgerResult<Vec<Product>>;
}

/// Durable orders, stock, coupons and loyalty counters.
#[async_trait]
pub trait Ledger: Catalog {
    /// Decrements stock iff `stock >= quantity`, in one atomic step.
    ///
    /// `Invalid` for a quantity that is not positive.
    async fn reserve_stock(&self, product_id: &str, quantity: Quantity) -> LedgerResult<StockUpdate>;

    /// Compensating increment for a reservation that will not be used.
    ///
    /// `Invalid` for a quantity that is not positive.
    async fn release_stock(&self, product_id: &str, quantity: Quantity) -> LedgerResult<()>;

    /// Persists a PENDING order and its lines.
    ///
    /// In the same atomic step: when the order applied a coupon, records the
    /// customer's redemption and bumps the coupon's usage count; when it
    /// applied the loyalty discount, resets the customer's completed orders
    /// to zero.
    async fn insert_order(&self, order: &Order) -> LedgerResult<Insertion>;

    async fn order(&self, id: &str) -> LedgerResult<Order>;

    /// Oldest first.
    async fn orders_by_status(&self, status: OrderStatus) -> LedgerResult<Vec<Order>>;

    /// Newest first.
    async fn orders_for_customer(&self, customer_id: &str) -> LedgerResult<Vec<Order>>;

    /// Newest first, optionally filtered by status.
    async fn orders_for_carrier(
        &self,
        carrier_id: &str,
        status: Option<OrderStatus>,
    ) -> LedgerResult<Vec<Order>>;

    /// PENDING → SELECTED with the carrier recorded.
    async fn claim_order(&self, order_id: &str, carrier_id: &str) -> LedgerResult<Transition>;

    /// PENDING → CANCELLED. Returns every line's quantity to stock in the
    /// same atomic step.
    async fn cancel_order(&self, order_id: &str) -> LedgerResult<Transition>;

    /// SELECTED (held by `carrier_id`) → DELIVERED with the delivery time,
    /// incrementing the customer's completed orders in the same atomic step.
    async fn complete_order(
        &self,
        order_id: &str,
        carrier_id: &str,
        delivered_at: DateTime<Utc>,
    ) -> LedgerResult<Transition>;

    /// Coupon by its unique code, if any.
    async fn coupon_by_code(&self, code: &str) -> LedgerResult<Option<Coupon>>;

    async fn has_redeemed_coupon(&self, customer_id: &str, coupon_id: &str) -> LedgerResult<bool>;

    /// 0 for a customer with no record.
    async fn completed_orders(&self, customer_id: &str) -> LedgerResult<u32>;

    /// Stored settings, or `None` if the owner never saved any.
    async fn loyalty_settings(&self) -> LedgerResult<Option<LoyaltySettings>>;

    /// Stores a rating unless its order already has one, in one atomic
    /// step. `false` when the order was already rated; nothing is written.
    async fn insert_rating(&self, rating: &Rating) -> LedgerResult<bool>;

    async fn has_rated(&self, order_id: &str, customer_id: &str) -> LedgerResult<bool>;

    /// Newest first.
    async fn ratings_for_carrier(&self, carrier_id: &str) -> LedgerResult<Vec<Rating>>;

    async fn carrier_rating(&self, carrier_id: &str) -> LedgerResult<CarrierRating> {
        let ratings = self.ratings_for_carrier(carrier_id).await?;
        Ok(CarrierRating::from_ratings(carrier_id, &ratings))
    }

    /// Totals over DELIVERED orders.
    async fn sales_report(&self) -> LedgerResult<SalesReport> {
        let delivered = self.orders_by_status(OrderStatus::Delivered).await?;
        Ok(SalesReport::from_orders(&delivered))
    }
}

// =============================================================================
// Notifier
// =============================================================================

/// Who a notice is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Owner,
    Customer(String),
    Carrier(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    PriceDoubled,
    StockOut,
    OrderDelivered,
    OrderCancelled,
}

impl NoticeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            NoticeKind::PriceDoubled => "price_doubled",
            NoticeKind::StockOut => "stock_out",
            NoticeKind::OrderDelivered => "order_delivered",
            NoticeKind::OrderCancelled => "order_cancelled",
        }
    }
}

/// A message for the owner, a customer, or a carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notice {
    pub recipient: Recipient,
    pub kind: NoticeKind,
    pub subject: String,
    pub body: String,
    /// Product or order the notice is about.
    pub reference: Option<String>,
}

#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget alerts.
///
/// Callers log a failed `notify` and carry on; it never undoes the order
/// operation that produced the notice.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: Notice) -> Result<(), NotifyError>;
}

/// Notifier that only writes the notice to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        info!(
            recipient = ?notice.recipient,
            kind = notice.kind.as_str(),
            subject = %notice.subject,
            "Notice"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_ledger_error_mapping() {
        let err: CoreError = LedgerError::not_found("Order", "o-9").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Order not found: o-9");

        let err: CoreError = LedgerError::Unavailable("database is locked".to_string()).into();
        assert!(err.is_retryable());

        let err: CoreError = LedgerError::from(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        })
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_recipient_serialization() {
        let json = serde_json::to_string(&Recipient::Customer("u-1".to_string())).unwrap();
        assert_eq!(json, r#"{"role":"customer","id":"u-1"}"#);
        let json = serde_json::to_string(&Recipient::Owner).unwrap();
        assert_eq!(json, r#"{"role":"owner"}"#);
    }

    #[tokio::test]
    async fn test_tracing_notifier_never_fails() {
        let notice = Notice {
            recipient: Recipient::Owner,
            kind: NoticeKind::StockOut,
            subject: "Stock Alert".to_string(),
            body: String::new(),
            reference: None,
        };
        assert!(TracingNotifier.notify(notice).await.is_ok());
    }
}
