//! # Order Lifecycle
//!
//! Places orders and moves them through the state machine against a
//! [`Ledger`].
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   place() ──► PENDING ──claim()──► SELECTED ──complete()──► DELIVERED   │
//! │                  │   ╲                                                  │
//! │                  │    ╲ claim() race loser: AlreadyClaimed, unchanged   │
//! │                  │                                                      │
//! │                  └──cancel() within window──► CANCELLED                 │
//! │                                                                         │
//! │   claim() and cancel() race on the same PENDING guard in the ledger:   │
//! │   at most one of them succeeds.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Placement
//! ```text
//! cart ─► non-empty, lines valid? ─► ≥ minimum? ─► delivery slot in window?
//!      ─► coupon / loyalty resolved ─► amounts frozen
//!      ─► every line reserved (all or nothing)
//!      ─► order inserted (releases reservations if refused)
//!      ─► stock alerts sent
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cart::Cart;
use crate::clock::Clock;
use crate::config::BusinessRules;
use crate::error::{ConflictError, CoreError, CoreResult, RuleViolation, ValidationError};
use crate::loyalty::LoyaltySettings;
use crate::money::Money;
use crate::ports::{Insertion, Ledger, Notice, NoticeKind, Notifier, Recipient, Transition};
use crate::pricing::{AppliedDiscounts, PriceBreakdown};
use crate::rating::{normalize_comment, CarrierRating, Rating};
use crate::report::SalesReport;
use crate::session::{CartStore, Role, Session};
use crate::stock::{StockLedger, StockRequest};
use crate::types::{Order, OrderLine, OrderStatus};

/// What the customer asks for at checkout, besides the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub requested_delivery: DateTime<Utc>,
    pub coupon_code: Option<String>,
    pub use_loyalty: bool,
}

/// Outcome of a batch claim.
#[derive(Debug, Default)]
pub struct ClaimReport {
    pub claimed: Vec<Order>,
    /// Orders another carrier got first.
    pub already_taken: Vec<String>,
    /// Orders that could not be claimed for any other reason.
    pub failed: Vec<(String, CoreError)>,
}

impl ClaimReport {
    pub fn all_claimed(&self) -> bool {
        self.already_taken.is_empty() && self.failed.is_empty()
    }
}

/// The order state machine and checkout.
#[derive(Clone)]
pub struct OrderLifecycle {
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    rules: BusinessRules,
    stock: StockLedger,
}

impl OrderLifecycle {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        rules: BusinessRules,
    ) -> Self {
        let stock = StockLedger::new(ledger.clone(), notifier.clone());
        OrderLifecycle {
            ledger,
            notifier,
            clock,
            rules,
            stock,
        }
    }

    pub fn rules(&self) -> &BusinessRules {
        &self.rules
    }

    pub fn stock(&self) -> &StockLedger {
        &self.stock
    }

    /// Stored loyalty settings, or the configured default.
    pub async fn loyalty_settings(&self) -> CoreResult<LoyaltySettings> {
        Ok(self
            .ledger
            .loyalty_settings()
            .await?
            .unwrap_or(self.rules.loyalty))
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Prices a cart the way checkout would, without reserving anything.
    pub async fn quote(
        &self,
        cart: &Cart,
        customer_id: &str,
        coupon_code: Option<&str>,
        use_loyalty: bool,
    ) -> CoreResult<PriceBreakdown> {
        let discounts = self
            .resolve_discounts(customer_id, cart.subtotal(), coupon_code, use_loyalty)
            .await?;
        Ok(self.rules.pricing().quote(cart.lines(), &discounts))
    }

    /// Places an order for the cart.
    ///
    /// ## Errors
    /// - `Validation(EmptyCart)`, or any line failing [`Cart::validate`]
    /// - `Rule(BelowMinimum | DeliveryWindow | Coupon* | LoyaltyNotEligible)`
    /// - `InsufficientStock` for the first line that could not be reserved
    /// - `Unavailable` when the ledger fails
    ///
    /// On any error no stock stays reserved.
    pub async fn place(&self, cart: &Cart, request: &CheckoutRequest) -> CoreResult<Order> {
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        cart.validate()?;

        let subtotal = cart.subtotal();
        if !cart.meets_minimum(self.rules.minimum_cart_value) {
            return Err(RuleViolation::BelowMinimum {
                minimum: self.rules.minimum_cart_value,
                subtotal,
            }
            .into());
        }

        let now = self.clock.now();
        self.rules
            .check_requested_delivery(request.requested_delivery, now)?;

        let discounts = self
            .resolve_discounts(
                &request.customer_id,
                subtotal,
                request.coupon_code.as_deref(),
                request.use_loyalty,
            )
            .await?;
        let pricing = self.rules.pricing().quote(cart.lines(), &discounts);

        let lines: Vec<OrderLine> = cart
            .lines()
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total(),
            })
            .collect();

        let requests: Vec<StockRequest<'_>> = lines
            .iter()
            .map(|line| StockRequest {
                product_id: &line.product_id,
                product_name: &line.product_name,
                quantity: line.quantity,
            })
            .collect();
        let reservations = self.stock.reserve_all(&requests).await?;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: request.customer_id.clone(),
            carrier_id: None,
            status: OrderStatus::Pending,
            order_time: now,
            requested_delivery: request.requested_delivery,
            delivery_time: None,
            pricing,
            discounts,
            lines,
        };

        let refused = match self.ledger.insert_order(&order).await {
            Ok(Insertion::Inserted) => None,
            Ok(Insertion::CouponAlreadyRedeemed) => Some(CoreError::from(
                RuleViolation::CouponAlreadyUsed {
                    code: coupon_code_of(&order),
                },
            )),
            Ok(Insertion::CouponExhausted) => Some(CoreError::from(RuleViolation::CouponInvalid {
                code: coupon_code_of(&order),
            })),
            Err(err) => Some(CoreError::from(err)),
        };
        if let Some(err) = refused {
            warn!(order_id = %order.id, error = %err, "Order not persisted, releasing stock");
            self.stock.release_all(&reservations).await;
            return Err(err);
        }

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            lines = order.lines.len(),
            total = %order.total(),
            "Order placed"
        );

        self.stock.publish(&reservations).await;
        Ok(order)
    }

    /// Places the session's cart and, on success, takes the placed lines
    /// out of it. Anything added to the cart while the order was being
    /// placed stays for the next checkout.
    pub async fn checkout(
        &self,
        carts: &CartStore,
        session: &Session,
        request: &CheckoutRequest,
    ) -> CoreResult<Order> {
        session.require_role(Role::Customer)?;
        if session.user_id != request.customer_id {
            return Err(ValidationError::InvalidFormat {
                field: "customer_id".to_string(),
                reason: "does not match the signed-in customer".to_string(),
            }
            .into());
        }

        let cart = carts.snapshot(&session.session_id);
        let order = self.place(&cart, request).await?;
        carts.with_cart_mut(&session.session_id, |current| current.remove_placed(&cart));
        Ok(order)
    }

    async fn resolve_discounts(
        &self,
        customer_id: &str,
        subtotal: Money,
        coupon_code: Option<&str>,
        use_loyalty: bool,
    ) -> CoreResult<AppliedDiscounts> {
        let mut discounts = AppliedDiscounts::none();

        if let Some(code) = coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            let coupon = self
                .ledger
                .coupon_by_code(code)
                .await?
                .ok_or_else(|| RuleViolation::CouponInvalid {
                    code: code.to_string(),
                })?;
            coupon.check_applicable(subtotal, self.clock.today())?;

            if self.ledger.has_redeemed_coupon(customer_id, &coupon.id).await? {
                return Err(RuleViolation::CouponAlreadyUsed {
                    code: coupon.code.clone(),
                }
                .into());
            }
            discounts.coupon = Some(coupon.applied());
        }

        if use_loyalty {
            let settings = self.loyalty_settings().await?;
            let completed = self.ledger.completed_orders(customer_id).await?;
            discounts.loyalty = Some(settings.check_eligible(completed)?);
        }

        debug!(
            customer_id = %customer_id,
            percent = %discounts.total_percent(),
            "Discounts resolved"
        );
        Ok(discounts)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// PENDING → SELECTED for this carrier.
    ///
    /// A carrier that loses the race gets `ConflictError::AlreadyClaimed`.
    pub async fn claim(&self, order_id: &str, carrier_id: &str) -> CoreResult<Order> {
        match self.ledger.claim_order(order_id, carrier_id).await? {
            Transition::Applied(order) => {
                info!(order_id = %order_id, carrier_id = %carrier_id, "Order claimed");
                Ok(order)
            }
            Transition::Rejected { current, .. } => {
                debug!(order_id = %order_id, status = %current, "Claim rejected");
                Err(match current {
                    OrderStatus::Selected | OrderStatus::Delivered => {
                        ConflictError::AlreadyClaimed {
                            order_id: order_id.to_string(),
                        }
                    }
                    _ => ConflictError::InvalidTransition {
                        order_id: order_id.to_string(),
                        from: current,
                        to: OrderStatus::Selected,
                    },
                }
                .into())
            }
        }
    }

    /// Claims several orders independently.
    pub async fn claim_many(&self, order_ids: &[String], carrier_id: &str) -> ClaimReport {
        let mut report = ClaimReport::default();

        for order_id in order_ids {
            match self.claim(order_id, carrier_id).await {
                Ok(order) => report.claimed.push(order),
                Err(err) if err.is_already_claimed() => report.already_taken.push(order_id.clone()),
                Err(err) => report.failed.push((order_id.clone(), err)),
            }
        }

        info!(
            carrier_id = %carrier_id,
            claimed = report.claimed.len(),
            already_taken = report.already_taken.len(),
            failed = report.failed.len(),
            "Batch claim finished"
        );
        report
    }

    /// SELECTED → DELIVERED by the carrier holding the order.
    ///
    /// `delivery_time` must be no earlier than the order time and no later
    /// than now.
    pub async fn complete(
        &self,
        order_id: &str,
        carrier_id: &str,
        delivery_time: DateTime<Utc>,
    ) -> CoreResult<Order> {
        let order = self.ledger.order(order_id).await?;

        let now = self.clock.now();
        if delivery_time < order.order_time || delivery_time > now {
            return Err(RuleViolation::DeliveryTimeInvalid {
                delivered: delivery_time,
                order_time: order.order_time,
                now,
            }
            .into());
        }

        let delivered = match self
            .ledger
            .complete_order(order_id, carrier_id, delivery_time)
            .await?
        {
            Transition::Applied(order) => order,
            Transition::Rejected {
                current: OrderStatus::Selected,
                ..
            } => {
                return Err(ConflictError::NotAssignedCarrier {
                    order_id: order_id.to_string(),
                    carrier_id: carrier_id.to_string(),
                }
                .into())
            }
            Transition::Rejected { current, .. } => {
                return Err(ConflictError::InvalidTransition {
                    order_id: order_id.to_string(),
                    from: current,
                    to: OrderStatus::Delivered,
                }
                .into())
            }
        };

        info!(order_id = %order_id, carrier_id = %carrier_id, "Order delivered");

        self.send(Notice {
            recipient: Recipient::Customer(delivered.customer_id.clone()),
            kind: NoticeKind::OrderDelivered,
            subject: "Your order has been delivered".to_string(),
            body: format!(
                "Your order {} was delivered at {}.\nTotal: {} (incl. VAT)\n\nThank you for shopping with us!",
                delivered.id,
                delivery_time.format("%Y-%m-%d %H:%M"),
                delivered.total()
            ),
            reference: Some(delivered.id.clone()),
        })
        .await;

        Ok(delivered)
    }

    /// PENDING → CANCELLED by the customer who placed the order, while the
    /// cancellation window is open. Reserved stock goes back on the shelf.
    pub async fn cancel(&self, order_id: &str, customer_id: &str) -> CoreResult<Order> {
        let order = self.ledger.order(order_id).await?;

        if order.customer_id != customer_id {
            return Err(ConflictError::NotOrderOwner {
                order_id: order_id.to_string(),
                customer_id: customer_id.to_string(),
            }
            .into());
        }
        if order.status != OrderStatus::Pending {
            return Err(ConflictError::NotPending {
                order_id: order_id.to_string(),
                status: order.status,
            }
            .into());
        }

        let window = self.rules.cancellation_window();
        if !window.can_cancel(order.order_time, self.clock.now()) {
            return Err(RuleViolation::CancellationWindowExpired {
                order_id: order_id.to_string(),
                window_hours: window.hours(),
            }
            .into());
        }

        let cancelled = match self.ledger.cancel_order(order_id).await? {
            Transition::Applied(order) => order,
            Transition::Rejected { current, .. } => {
                return Err(ConflictError::NotPending {
                    order_id: order_id.to_string(),
                    status: current,
                }
                .into())
            }
        };

        info!(order_id = %order_id, customer_id = %customer_id, "Order cancelled");

        self.send(Notice {
            recipient: Recipient::Owner,
            kind: NoticeKind::OrderCancelled,
            subject: format!("Order {} cancelled", cancelled.id),
            body: format!(
                "Customer {} cancelled order {} ({}). Its stock is back on the shelf.",
                cancelled.customer_id,
                cancelled.id,
                cancelled.total()
            ),
            reference: Some(cancelled.id.clone()),
        })
        .await;

        Ok(cancelled)
    }

    /// Whole hours left to cancel (0 once the window has closed).
    pub fn cancellation_hours_left(&self, order: &Order) -> i64 {
        if order.status != OrderStatus::Pending {
            return 0;
        }
        self.rules
            .cancellation_window()
            .remaining_hours(order.order_time, self.clock.now())
    }

    // =========================================================================
    // Ratings
    // =========================================================================

    /// The customer of a DELIVERED order rates its carrier, once.
    ///
    /// ## Errors
    /// - `Validation` for a score outside 1..=5 or an overlong comment
    /// - `Conflict(NotOrderOwner | NotDelivered | AlreadyRated)`
    pub async fn rate_carrier(
        &self,
        order_id: &str,
        customer_id: &str,
        score: u8,
        comment: Option<String>,
    ) -> CoreResult<Rating> {
        let order = self.ledger.order(order_id).await?;

        if order.customer_id != customer_id {
            return Err(ConflictError::NotOrderOwner {
                order_id: order_id.to_string(),
                customer_id: customer_id.to_string(),
            }
            .into());
        }
        let carrier_id = match (order.status, order.carrier_id) {
            (OrderStatus::Delivered, Some(carrier_id)) => carrier_id,
            (status, _) => {
                return Err(ConflictError::NotDelivered {
                    order_id: order_id.to_string(),
                    status,
                }
                .into())
            }
        };

        let rating = Rating {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            customer_id: customer_id.to_string(),
            carrier_id,
            score,
            comment: normalize_comment(comment),
            created_at: self.clock.now(),
        };
        rating.validate()?;

        if !self.ledger.insert_rating(&rating).await? {
            return Err(ConflictError::AlreadyRated {
                order_id: order_id.to_string(),
            }
            .into());
        }

        info!(
            order_id = %order_id,
            carrier_id = %rating.carrier_id,
            score = rating.score,
            "Carrier rated"
        );
        Ok(rating)
    }

    /// Whether the customer may still rate the order's carrier.
    pub async fn can_rate(&self, order: &Order, customer_id: &str) -> CoreResult<bool> {
        if order.customer_id != customer_id
            || order.status != OrderStatus::Delivered
            || order.carrier_id.is_none()
        {
            return Ok(false);
        }
        Ok(!self.ledger.has_rated(&order.id, customer_id).await?)
    }

    pub async fn carrier_rating(&self, carrier_id: &str) -> CoreResult<CarrierRating> {
        Ok(self.ledger.carrier_rating(carrier_id).await?)
    }

    /// Newest first.
    pub async fn carrier_ratings(&self, carrier_id: &str) -> CoreResult<Vec<Rating>> {
        Ok(self.ledger.ratings_for_carrier(carrier_id).await?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Owner totals over delivered orders.
    pub async fn sales_report(&self) -> CoreResult<SalesReport> {
        Ok(self.ledger.sales_report().await?)
    }

    pub async fn order(&self, order_id: &str) -> CoreResult<Order> {
        Ok(self.ledger.order(order_id).await?)
    }

    /// Orders waiting for a carrier, oldest first.
    pub async fn pending_orders(&self) -> CoreResult<Vec<Order>> {
        Ok(self.ledger.orders_by_status(OrderStatus::Pending).await?)
    }

    pub async fn orders_for_customer(&self, customer_id: &str) -> CoreResult<Vec<Order>> {
        Ok(self.ledger.orders_for_customer(customer_id).await?)
    }

    pub async fn carrier_orders(
        &self,
        carrier_id: &str,
        status: Option<OrderStatus>,
    ) -> CoreResult<Vec<Order>> {
        Ok(self.ledger.orders_for_carrier(carrier_id, status).await?)
    }

    async fn send(&self, notice: Notice) {
        let kind = notice.kind;
        if let Err(err) = self.notifier.notify(notice).await {
            warn!(kind = kind.as_str(), error = %err, "Notice not delivered");
        }
    }
}

fn coupon_code_of(order: &Order) -> String {
    order
        .discounts
        .coupon
        .as_ref()
        .map(|c| c.code.clone())
        .unwrap_or_default()
}

// =============================================================================
// Unit Tests
// =============================================================================
