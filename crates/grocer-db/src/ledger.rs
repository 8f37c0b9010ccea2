//! # SQLite Ledger
//!
//! [`Catalog`] and [`Ledger`] over the repositories, so the order lifecycle
//! runs against the database.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderLifecycle ──► Arc<dyn Ledger> ──► SqliteLedger                    │
//! │                                            │                            │
//! │                 reserve_stock   ──────────►│ products().reserve         │
//! │                 insert_order    ──────────►│ orders().insert  (tx)      │
//! │                 claim_order     ──────────►│ orders().claim   (guarded) │
//! │                 cancel_order    ──────────►│ orders().cancel  (tx)      │
//! │                 complete_order  ──────────►│ orders().complete (tx)     │
//! │                 coupon_by_code  ──────────►│ coupons().get_by_code      │
//! │                 completed_orders ─────────►│ customers()...             │
//! │                 insert_rating   ──────────►│ ratings().insert           │
//! │                 sales_report    ──────────►│ orders().sales_report      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every conditional update is a single guarded statement or one
//! transaction, so the guarantees hold across processes sharing the file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::pool::Database;
use grocer_core::ports::{Insertion, LedgerResult, StockUpdate, Transition};
use grocer_core::{
    CarrierRating, Catalog, Coupon, Ledger, LedgerError, LoyaltySettings, Order, OrderStatus,
    Product, Quantity, Rating, SalesReport,
};

/// The database as a [`Ledger`].
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    db: Database,
}

impl SqliteLedger {
    pub fn new(db: Database) -> Self {
        SqliteLedger { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl Catalog for SqliteLedger {
    async fn product(&self, id: &str) -> LedgerResult<Product> {
        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Product", id))
    }

    async fn products(&self) -> LedgerResult<Vec<Product>> {
        Ok(self.db.products().list().await?)
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn reserve_stock(&self, product_id: &str, quantity: Quantity) -> LedgerResult<StockUpdate> {
        Ok(self.db.products().reserve(product_id, quantity).await?)
    }

    async fn release_stock(&self, product_id: &str, quantity: Quantity) -> LedgerResult<()> {
        Ok(self.db.products().release(product_id, quantity).await?)
    }

    async fn insert_order(&self, order: &Order) -> LedgerResult<Insertion> {
        Ok(self.db.orders().insert(order).await?)
    }

    async fn order(&self, id: &str) -> LedgerResult<Order> {
        self.db
            .orders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Order", id))
    }

    async fn orders_by_status(&self, status: OrderStatus) -> LedgerResult<Vec<Order>> {
        Ok(self.db.orders().list_by_status(status).await?)
    }

    async fn orders_for_customer(&self, customer_id: &str) -> LedgerResult<Vec<Order>> {
        Ok(self.db.orders().list_for_customer(customer_id).await?)
    }

    async fn orders_for_carrier(
        &self,
        carrier_id: &str,
        status: Option<OrderStatus>,
    ) -> LedgerResult<Vec<Order>> {
        Ok(self.db.orders().list_for_carrier(carrier_id, status).await?)
    }

    async fn claim_order(&self, order_id: &str, carrier_id: &str) -> LedgerResult<Transition> {
        Ok(self.db.orders().claim(order_id, carrier_id).await?)
    }

    async fn cancel_order(&self, order_id: &str) -> LedgerResult<Transition> {
        Ok(self.db.orders().cancel(order_id).await?)
    }

    async fn complete_order(
        &self,
        order_id: &str,
        carrier_id: &str,
        delivered_at: DateTime<Utc>,
    ) -> LedgerResult<Transition> {
        Ok(self
            .db
            .orders()
            .complete(order_id, carrier_id, delivered_at)
            .await?)
    }

    async fn coupon_by_code(&self, code: &str) -> LedgerResult<Option<Coupon>> {
        Ok(self.db.coupons().get_by_code(code).await?)
    }

    async fn has_redeemed_coupon(&self, customer_id: &str, coupon_id: &str) -> LedgerResult<bool> {
        Ok(self.db.coupons().has_redeemed(customer_id, coupon_id).await?)
    }

    async fn completed_orders(&self, customer_id: &str) -> LedgerResult<u32> {
        Ok(self.db.customers().completed_orders(customer_id).await?)
    }

    async fn loyalty_settings(&self) -> LedgerResult<Option<LoyaltySettings>> {
        Ok(self.db.customers().loyalty_settings().await?)
    }

    async fn insert_rating(&self, rating: &Rating) -> LedgerResult<bool> {
        Ok(self.db.ratings().insert(rating).await?)
    }

    async fn has_rated(&self, order_id: &str, customer_id: &str) -> LedgerResult<bool> {
        Ok(self.db.ratings().has_rated(order_id, customer_id).await?)
    }

    async fn ratings_for_carrier(&self, carrier_id: &str) -> LedgerResult<Vec<Rating>> {
        Ok(self.db.ratings().list_for_carrier(carrier_id).await?)
    }

    async fn carrier_rating(&self, carrier_id: &str) -> LedgerResult<CarrierRating> {
        Ok(self.db.ratings().carrier_summary(carrier_id).await?)
    }

    async fn sales_report(&self) -> LedgerResult<SalesReport> {
        Ok(self.db.orders().sales_report().await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::MessageNotifier;
    use crate::{DbConfig, DbError};
    use chrono::{Duration, TimeZone};
    use grocer_core::{
        BusinessRules, Cart, Category, CheckoutRequest, Clock, ConflictError, CoreError, ManualClock,
        Money, NoticeKind, OrderLifecycle, Rate, Recipient, RuleViolation,
    };
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    fn kg(n: i64) -> Quantity {
        Quantity::from_kilograms(n)
    }

    fn product(id: &str, cents: i64, stock: i64, threshold: i64) -> Product {
        Product {
            id: id.to_string(),
            name: id.to_string(),
            category: Category::Vegetable,
            price_per_kg: Money::from_cents(cents),
            stock: kg(stock),
            threshold: kg(threshold),
        }
    }

    fn request(customer: &str) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: customer.to_string(),
            requested_delivery: start() + Duration::hours(6),
            coupon_code: None,
            use_loyalty: false,
        }
    }

    fn cart_of(items: &[(&str, i64, i64)]) -> Cart {
        let mut cart = Cart::new();
        for (id, kilos, cents) in items {
            cart.add(id, id, kg(*kilos), Money::from_cents(*cents)).unwrap();
        }
        cart
    }

    struct Fixture {
        db: Database,
        clock: Arc<ManualClock>,
        lifecycle: OrderLifecycle,
    }

    async fn fixture_on(db: Database) -> Fixture {
        let clock = Arc::new(ManualClock::new(start()));
        let lifecycle = OrderLifecycle::new(
            Arc::new(db.ledger()),
            Arc::new(MessageNotifier::new(db.messages())),
            clock.clone(),
            BusinessRules::default(),
        );
        Fixture { db, clock, lifecycle }
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&product("potato", 500, 100, 10)).await.unwrap();
        db.products().insert(&product("onion", 250, 10, 5)).await.unwrap();
        fixture_on(db).await
    }

    async fn stock_of(db: &Database, id: &str) -> Quantity {
        db.products().get_by_id(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_sqlite() {
        let f = fixture().await;
        let cart = cart_of(&[("potato", 4, 500), ("onion", 2, 250)]);

        let order = f.lifecycle.place(&cart, &request("alice")).await.unwrap();
        assert_eq!(order.total(), Money::from_cents(2950));
        assert_eq!(stock_of(&f.db, "potato").await, kg(96));

        let stored = f.lifecycle.order(&order.id).await.unwrap();
        assert_eq!(stored, order);

        let claimed = f.lifecycle.claim(&order.id, "carrier-a").await.unwrap();
        assert_eq!(claimed.status, OrderStatus::Selected);

        f.clock.advance(Duration::hours(3));
        let delivered = f
            .lifecycle
            .complete(&order.id, "carrier-a", start() + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(f.db.customers().completed_orders("alice").await.unwrap(), 1);

        let inbox = f
            .db
            .messages()
            .inbox(&Recipient::Customer("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NoticeKind::OrderDelivered.as_str());
    }

    #[tokio::test]
    async fn test_cancel_returns_stock_and_notifies_owner() {
        let f = fixture().await;
        let order = f
            .lifecycle
            .place(&cart_of(&[("potato", 4, 500)]), &request("alice"))
            .await
            .unwrap();

        let err = f.lifecycle.cancel(&order.id, "bob").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Conflict(ConflictError::NotOrderOwner { .. })
        ));

        let cancelled = f.lifecycle.cancel(&order.id, "alice").await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&f.db, "potato").await, kg(100));

        let owner = f.db.messages().inbox(&Recipient::Owner).await.unwrap();
        assert!(owner
            .iter()
            .any(|m| m.kind == NoticeKind::OrderCancelled.as_str()));

        let err = f.lifecycle.claim(&order.id, "carrier-a").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Conflict(ConflictError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_stock_out_alert_lands_in_owner_inbox() {
        let f = fixture().await;
        f.lifecycle
            .place(&cart_of(&[("onion", 10, 250)]), &request("alice"))
            .await
            .unwrap();

        assert_eq!(stock_of(&f.db, "onion").await, Quantity::zero());
        let alerts = f.db.messages().list_by_kind(NoticeKind::StockOut).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].reference.as_deref(), Some("onion"));
    }

    #[tokio::test]
    async fn test_coupon_redeemed_once_per_customer() {
        let f = fixture().await;
        let coupon = Coupon {
            id: "c-1".to_string(),
            code: "FRESH10".to_string(),
            discount_percent: Rate::from_percent(10),
            min_order_value: Money::from_cents(1000),
            expiry_date: None,
            active: true,
            max_usage: 0,
            usage_count: 0,
        };
        f.db.coupons().insert(&coupon).await.unwrap();

        let mut req = request("alice");
        req.coupon_code = Some("FRESH10".to_string());
        let cart = cart_of(&[("potato", 4, 500)]);

        let order = f.lifecycle.place(&cart, &req).await.unwrap();
        assert_eq!(order.discount(), Money::from_cents(200));
        assert!(f.db.coupons().has_redeemed("alice", "c-1").await.unwrap());

        let err = f.lifecycle.place(&cart, &req).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Rule(RuleViolation::CouponAlreadyUsed { .. })
        ));
        assert_eq!(stock_of(&f.db, "potato").await, kg(96));
        let stored = f.db.coupons().get_by_id("c-1").await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 1);
    }

    #[tokio::test]
    async fn test_loyalty_resets_counter_at_checkout() {
        let f = fixture().await;
        f.db.customers().set_completed_orders("alice", 5).await.unwrap();

        let mut req = request("alice");
        req.use_loyalty = true;
        let order = f
            .lifecycle
            .place(&cart_of(&[("potato", 4, 500)]), &req)
            .await
            .unwrap();

        assert_eq!(order.discounts.loyalty, Some(Rate::from_percent(10)));
        assert_eq!(f.db.customers().completed_orders("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_product_maps_to_not_found() {
        let f = fixture().await;
        let ledger = f.db.ledger();
        let err = ledger.product("ghost").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let err: LedgerError = DbError::ConnectionFailed("closed".to_string()).into();
        assert!(matches!(err, LedgerError::Unavailable(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_across_pools_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grocer.db");

        let first = Database::new(DbConfig::new(&path)).await.unwrap();
        first.products().insert(&product("potato", 500, 100, 10)).await.unwrap();
        let second = Database::new(DbConfig::new(&path).run_migrations(false))
            .await
            .unwrap();

        let f = fixture_on(first.clone()).await;
        let order = f
            .lifecycle
            .place(&cart_of(&[("potato", 4, 500)]), &request("alice"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for (i, db) in [first.clone(), second.clone(), first, second].into_iter().enumerate() {
            let order_id = order.id.clone();
            handles.push(tokio::spawn(async move {
                db.ledger()
                    .claim_order(&order_id, &format!("carrier-{i}"))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Transition::Applied(_)) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grocer.db");

        let first = Database::new(DbConfig::new(&path)).await.unwrap();
        first.products().insert(&product("garlic", 1000, 5, 0)).await.unwrap();
        let second = Database::new(DbConfig::new(&path).run_migrations(false))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = if i % 2 == 0 { first.clone() } else { second.clone() };
            handles.push(tokio::spawn(async move {
                db.ledger().reserve_stock("garlic", kg(1)).await.unwrap()
            }));
        }

        let mut reserved = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), StockUpdate::Reserved(_)) {
                reserved += 1;
            }
        }
        assert_eq!(reserved, 5);
        assert_eq!(stock_of(&first, "garlic").await, Quantity::zero());
    }

    #[tokio::test]
    async fn test_deserialized_cart_with_negative_line_moves_no_stock() {
        let f = fixture().await;
        let cart: Cart = serde_json::from_str(
            r#"{"lines":[
                {"product_id":"potato","product_name":"potato","quantity":10000,"unit_price":500},
                {"product_id":"onion","product_name":"onion","quantity":-5000,"unit_price":250}
            ]}"#,
        )
        .unwrap();

        let err = f.lifecycle.place(&cart, &request("alice")).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(stock_of(&f.db, "potato").await, kg(100));
        assert_eq!(stock_of(&f.db, "onion").await, kg(10));

        let err = f.db.ledger().reserve_stock("onion", kg(-5)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Invalid(_)));
        assert_eq!(stock_of(&f.db, "onion").await, kg(10));
    }

    #[tokio::test]
    async fn test_rating_and_sales_over_sqlite() {
        let f = fixture().await;
        let order = f
            .lifecycle
            .place(&cart_of(&[("potato", 4, 500), ("onion", 2, 250)]), &request("alice"))
            .await
            .unwrap();
        let open = f
            .lifecycle
            .place(&cart_of(&[("potato", 2, 500)]), &request("bob"))
            .await
            .unwrap();
        f.lifecycle.claim(&order.id, "carrier-a").await.unwrap();
        f.clock.advance(Duration::hours(2));
        f.lifecycle
            .complete(&order.id, "carrier-a", f.clock.now())
            .await
            .unwrap();

        let err = f
            .lifecycle
            .rate_carrier(&open.id, "bob", 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictError::NotDelivered { .. })));

        f.lifecycle
            .rate_carrier(&order.id, "alice", 4, Some("Fresh and on time".to_string()))
            .await
            .unwrap();
        let err = f
            .lifecycle
            .rate_carrier(&order.id, "alice", 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictError::AlreadyRated { .. })));

        let summary = f.lifecycle.carrier_rating("carrier-a").await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, 4.0);

        let report = f.lifecycle.sales_report().await.unwrap();
        assert_eq!(report.delivered_orders, 1);
        assert_eq!(report.total, order.total());
        let delivered = f.lifecycle.order(&order.id).await.unwrap();
        assert_eq!(report, SalesReport::from_orders([&delivered]));
    }
}
