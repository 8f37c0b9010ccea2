//! # Stock Ledger
//!
//! Atomic stock reservation at checkout, plus the owner alerts it drives.
//!
//! ## Alert Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Decided on the PRE-reservation stock, so repeated small orders below  │
//! │  the threshold do not alert again.                                      │
//! │                                                                         │
//! │  after == 0                          ──► StockOut                       │
//! │  before > threshold ≥ after (> 0)    ──► PriceDoubled                   │
//! │  otherwise                           ──► nothing                        │
//! │                                                                         │
//! │  stock 10 kg, threshold 5 kg, reserve 6 kg                              │
//! │    before 10 > 5, after 4 ≤ 5  ──► one PriceDoubled                     │
//! │  then reserve 1 kg                                                      │
//! │    before 4 ≤ 5                ──► nothing                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Multi-line Reservation
//! [`StockLedger::reserve_all`] reserves line by line. If any line fails,
//! every line already reserved for the same order is released before the
//! error is returned.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{CoreError, CoreResult};
use crate::ports::{Ledger, Notice, NoticeKind, Notifier, Recipient, StockChange, StockUpdate};
use crate::quantity::Quantity;
use crate::types::Product;

/// Alert raised by a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAlert {
    PriceDoubled,
    StockOut,
}

/// Alert for a move from `before` to `after` against `threshold`.
pub fn stock_alert(before: Quantity, after: Quantity, threshold: Quantity) -> Option<StockAlert> {
    if !after.is_positive() {
        Some(StockAlert::StockOut)
    } else if before > threshold && after <= threshold {
        Some(StockAlert::PriceDoubled)
    } else {
        None
    }
}

/// A stock decrement made on behalf of an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub change: StockChange,
    pub quantity: Quantity,
}

impl Reservation {
    #[inline]
    pub fn product(&self) -> &Product {
        &self.change.product
    }

    #[inline]
    pub fn before(&self) -> Quantity {
        self.change.before
    }

    #[inline]
    pub fn after(&self) -> Quantity {
        self.change.after()
    }

    pub fn alert(&self) -> Option<StockAlert> {
        stock_alert(self.before(), self.after(), self.product().threshold)
    }

    /// Owner notice for this reservation's alert, if any.
    pub fn notice(&self) -> Option<Notice> {
        let product = self.product();
        let alert = self.alert()?;

        let notice = match alert {
            StockAlert::StockOut => Notice {
                recipient: Recipient::Owner,
                kind: NoticeKind::StockOut,
                subject: format!("Stock Alert: {} is OUT OF STOCK", product.name),
                body: format!(
                    "STOCK ALERT\n\n\
                     Product: {}\n\
                     Type: {}\n\
                     Current Stock: {}\n\
                     Status: OUT OF STOCK\n\n\
                     Please restock this product as soon as possible.",
                    product.name, product.category, product.stock
                ),
                reference: Some(product.id.clone()),
            },
            StockAlert::PriceDoubled => Notice {
                recipient: Recipient::Owner,
                kind: NoticeKind::PriceDoubled,
                subject: format!("Price Alert: {} - PRICE DOUBLED", product.name),
                body: format!(
                    "PRICE ALERT\n\n\
                     Product: {}\n\
                     Type: {}\n\
                     Current Stock: {}\n\
                     Threshold: {}\n\
                     Original Price: {}/kg\n\
                     Current Price: {}/kg\n\n\
                     Stock fell to the threshold; the price has doubled until it is restocked.",
                    product.name,
                    product.category,
                    product.stock,
                    product.threshold,
                    product.price_per_kg,
                    product.effective_price()
                ),
                reference: Some(product.id.clone()),
            },
        };
        Some(notice)
    }
}

/// A line to reserve: product id, display name, quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRequest<'a> {
    pub product_id: &'a str,
    pub product_name: &'a str,
    pub quantity: Quantity,
}

/// Stock reservation on top of a [`Ledger`].
#[derive(Clone)]
pub struct StockLedger {
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
}

impl StockLedger {
    pub fn new(ledger: Arc<dyn Ledger>, notifier: Arc<dyn Notifier>) -> Self {
        StockLedger { ledger, notifier }
    }

    /// Reserves one line. Stock never goes negative.
    pub async fn reserve(&self, request: &StockRequest<'_>) -> CoreResult<Reservation> {
        match self
            .ledger
            .reserve_stock(request.product_id, request.quantity)
            .await?
        {
            StockUpdate::Reserved(change) => {
                debug!(
                    product_id = %request.product_id,
                    before = change.before.grams(),
                    after = change.after().grams(),
                    "Stock reserved"
                );
                Ok(Reservation {
                    change,
                    quantity: request.quantity,
                })
            }
            StockUpdate::Insufficient { available } => Err(CoreError::InsufficientStock {
                product: request.product_name.to_string(),
                available,
                requested: request.quantity,
            }),
        }
    }

    /// Returns a quantity to the shelf.
    pub async fn release(&self, product_id: &str, quantity: Quantity) -> CoreResult<()> {
        self.ledger.release_stock(product_id, quantity).await?;
        debug!(product_id = %product_id, grams = quantity.grams(), "Stock released");
        Ok(())
    }

    /// Reserves every line or none.
    pub async fn reserve_all(&self, requests: &[StockRequest<'_>]) -> CoreResult<Vec<Reservation>> {
        let mut reserved = Vec::with_capacity(requests.len());

        for request in requests {
            match self.reserve(request).await {
                Ok(reservation) => reserved.push(reservation),
                Err(err) => {
                    warn!(
                        product_id = %request.product_id,
                        rollback = reserved.len(),
                        error = %err,
                        "Reservation failed, releasing earlier lines"
                    );
                    self.release_all(&reserved).await;
                    return Err(err);
                }
            }
        }

        Ok(reserved)
    }

    /// Compensates a set of reservations. A release that fails is logged;
    /// the remaining ones are still attempted.
    pub async fn release_all(&self, reservations: &[Reservation]) {
        for reservation in reservations {
            let product_id = &reservation.product().id;
            if let Err(err) = self.release(product_id, reservation.quantity).await {
                error!(
                    product_id = %product_id,
                    grams = reservation.quantity.grams(),
                    error = %err,
                    "Failed to release reserved stock"
                );
            }
        }
    }

    /// Sends the owner alerts for committed reservations.
    pub async fn publish(&self, reservations: &[Reservation]) {
        for notice in reservations.iter().filter_map(Reservation::notice) {
            if let Err(err) = self.notifier.notify(notice).await {
                warn!(error = %err, "Stock notice not delivered");
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
