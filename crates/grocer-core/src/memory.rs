//! # In-Memory Ledger
//!
//! A [`Ledger`] and a [`Notifier`] that live in process memory.
//!
//! Every conditional update runs as a compare-and-swap under one lock, so the
//! ledger gives the same guarantees as the SQLite ledger to callers inside a
//! single process. Used by the core's tests and for embedding the lifecycle
//! where durability is not needed.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::coupon::Coupon;
use crate::error::ValidationError;
use crate::loyalty::LoyaltySettings;
use crate::ports::{
    Catalog, Insertion, Ledger, LedgerError, LedgerResult, Notice, Notifier, NotifyError,
    StockChange, StockUpdate, Transition,
};
use crate::quantity::Quantity;
use crate::rating::Rating;
use crate::types::{Order, OrderStatus, Product};

#[derive(Debug, Default)]
struct State {
    products: HashMap<String, Product>,
    orders: HashMap<String, Order>,
    /// Insertion order of `orders`.
    order_ids: Vec<String>,
    coupons: HashMap<String, Coupon>,
    /// (customer_id, coupon_id)
    redemptions: HashSet<(String, String)>,
    completed_orders: HashMap<String, u32>,
    loyalty: Option<LoyaltySettings>,
    /// Oldest first.
    ratings: Vec<Rating>,
}

impl State {
    fn order_mut(&mut self, id: &str) -> LedgerResult<&mut Order> {
        self.orders
            .get_mut(id)
            .ok_or_else(|| LedgerError::not_found("Order", id))
    }

    fn orders_where(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        self.order_ids
            .iter()
            .filter_map(|id| self.orders.get(id))
            .filter(|order| keep(order))
            .cloned()
            .collect()
    }
}

fn require_positive(quantity: Quantity) -> LedgerResult<()> {
    if !quantity.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Process-local ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        InMemoryLedger::default()
    }

    /// Inserts or replaces a product (catalog management).
    pub fn upsert_product(&self, product: Product) {
        self.state.lock().products.insert(product.id.clone(), product);
    }

    pub fn upsert_coupon(&self, coupon: Coupon) {
        self.state.lock().coupons.insert(coupon.id.clone(), coupon);
    }

    pub fn set_loyalty_settings(&self, settings: LoyaltySettings) {
        self.state.lock().loyalty = Some(settings);
    }

    pub fn set_completed_orders(&self, customer_id: &str, count: u32) {
        self.state
            .lock()
            .completed_orders
            .insert(customer_id.to_string(), count);
    }

    pub fn stock_of(&self, product_id: &str) -> Option<Quantity> {
        self.state.lock().products.get(product_id).map(|p| p.stock)
    }

    pub fn coupon(&self, coupon_id: &str) -> Option<Coupon> {
        self.state.lock().coupons.get(coupon_id).cloned()
    }
}

#[async_trait]
impl Catalog for InMemoryLedger {
    async fn product(&self, id: &str) -> LedgerResult<Product> {
        self.state
            .lock()
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("Product", id))
    }

    async fn products(&self) -> LedgerResult<Vec<Product>> {
        let state = self.state.lock();
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn reserve_stock(&self, product_id: &str, quantity: Quantity) -> LedgerResult<StockUpdate> {
        require_positive(quantity)?;
        let mut state = self.state.lock();
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| LedgerError::not_found("Product", product_id))?;

        if product.stock < quantity {
            return Ok(StockUpdate::Insufficient {
                available: product.stock,
            });
        }

        let before = product.stock;
        product.stock -= quantity;
        Ok(StockUpdate::Reserved(StockChange {
            product: product.clone(),
            before,
        }))
    }

    async fn release_stock(&self, product_id: &str, quantity: Quantity) -> LedgerResult<()> {
        require_positive(quantity)?;
        let mut state = self.state.lock();
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| LedgerError::not_found("Product", product_id))?;
        product.stock += quantity;
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> LedgerResult<Insertion> {
        let mut state = self.state.lock();

        if let Some(applied) = &order.discounts.coupon {
            let key = (order.customer_id.clone(), applied.coupon_id.clone());
            if state.redemptions.contains(&key) {
                return Ok(Insertion::CouponAlreadyRedeemed);
            }
            let coupon = state
                .coupons
                .get_mut(&applied.coupon_id)
                .ok_or_else(|| LedgerError::not_found("Coupon", &applied.coupon_id))?;
            if coupon.is_usage_limit_reached() {
                return Ok(Insertion::CouponExhausted);
            }
            coupon.usage_count += 1;
            state.redemptions.insert(key);
        }

        if order.discounts.uses_loyalty() {
            state
                .completed_orders
                .insert(order.customer_id.clone(), 0);
        }

        state.order_ids.push(order.id.clone());
        state.orders.insert(order.id.clone(), order.clone());
        Ok(Insertion::Inserted)
    }

    async fn order(&self, id: &str) -> LedgerResult<Order> {
        self.state
            .lock()
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("Order", id))
    }

    async fn orders_by_status(&self, status: OrderStatus) -> LedgerResult<Vec<Order>> {
        Ok(self.state.lock().orders_where(|o| o.status == status))
    }

    async fn orders_for_customer(&self, customer_id: &str) -> LedgerResult<Vec<Order>> {
        let mut orders = self
            .state
            .lock()
            .orders_where(|o| o.customer_id == customer_id);
        orders.reverse();
        Ok(orders)
    }

    async fn orders_for_carrier(
        &self,
        carrier_id: &str,
        status: Option<OrderStatus>,
    ) -> LedgerResult<Vec<Order>> {
        let mut orders = self.state.lock().orders_where(|o| {
            o.carrier_id.as_deref() == Some(carrier_id) && status.map_or(true, |s| o.status == s)
        });
        orders.reverse();
        Ok(orders)
    }

    async fn claim_order(&self, order_id: &str, carrier_id: &str) -> LedgerResult<Transition> {
        let mut state = self.state.lock();
        let order = state.order_mut(order_id)?;

        if order.status != OrderStatus::Pending {
            return Ok(Transition::Rejected {
                current: order.status,
                carrier_id: order.carrier_id.clone(),
            });
        }

        order.status = OrderStatus::Selected;
        order.carrier_id = Some(carrier_id.to_string());
        Ok(Transition::Applied(order.clone()))
    }

    async fn cancel_order(&self, order_id: &str) -> LedgerResult<Transition> {
        let mut state = self.state.lock();
        let order = state.order_mut(order_id)?;

        if order.status != OrderStatus::Pending {
            return Ok(Transition::Rejected {
                current: order.status,
                carrier_id: order.carrier_id.clone(),
            });
        }

        order.status = OrderStatus::Cancelled;
        let cancelled = order.clone();

        for line in &cancelled.lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock += line.quantity;
            }
        }
        Ok(Transition::Applied(cancelled))
    }

    async fn complete_order(
        &self,
        order_id: &str,
        carrier_id: &str,
        delivered_at: DateTime<Utc>,
    ) -> LedgerResult<Transition> {
        let mut state = self.state.lock();
        let order = state.order_mut(order_id)?;

        if order.status != OrderStatus::Selected || order.carrier_id.as_deref() != Some(carrier_id) {
            return Ok(Transition::Rejected {
                current: order.status,
                carrier_id: order.carrier_id.clone(),
            });
        }

        order.status = OrderStatus::Delivered;
        order.delivery_time = Some(delivered_at);
        let delivered = order.clone();

        *state
            .completed_orders
            .entry(delivered.customer_id.clone())
            .or_insert(0) += 1;
        Ok(Transition::Applied(delivered))
    }

    async fn coupon_by_code(&self, code: &str) -> LedgerResult<Option<Coupon>> {
        Ok(self
            .state
            .lock()
            .coupons
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn has_redeemed_coupon(&self, customer_id: &str, coupon_id: &str) -> LedgerResult<bool> {
        Ok(self
            .state
            .lock()
            .redemptions
            .contains(&(customer_id.to_string(), coupon_id.to_string())))
    }

    async fn completed_orders(&self, customer_id: &str) -> LedgerResult<u32> {
        Ok(self
            .state
            .lock()
            .completed_orders
            .get(customer_id)
            .copied()
            .unwrap_or(0))
    }

    async fn loyalty_settings(&self) -> LedgerResult<Option<LoyaltySettings>> {
        Ok(self.state.lock().loyalty)
    }

    async fn insert_rating(&self, rating: &Rating) -> LedgerResult<bool> {
        let mut state = self.state.lock();
        if state.ratings.iter().any(|r| r.order_id == rating.order_id) {
            return Ok(false);
        }
        state.ratings.push(rating.clone());
        Ok(true)
    }

    async fn has_rated(&self, order_id: &str, customer_id: &str) -> LedgerResult<bool> {
        Ok(self
            .state
            .lock()
            .ratings
            .iter()
            .any(|r| r.order_id == order_id && r.customer_id == customer_id))
    }

    async fn ratings_for_carrier(&self, carrier_id: &str) -> LedgerResult<Vec<Rating>> {
        Ok(self
            .state
            .lock()
            .ratings
            .iter()
            .rev()
            .filter(|r| r.carrier_id == carrier_id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Recording Notifier
// =============================================================================

/// Keeps every notice it is given. Can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// When set, every `notify` returns an error and records nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("notifier offline".to_string()));
        }
        self.notices.lock().push(notice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::Category;
    use chrono::TimeZone;

    fn ledger() -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        ledger.upsert_product(Product {
            id: "onion".to_string(),
            name: "Onion".to_string(),
            category: Category::Vegetable,
            price_per_kg: Money::from_cents(250),
            stock: Quantity::from_kilograms(10),
            threshold: Quantity::from_kilograms(5),
        });
        ledger
    }

    fn rating(id: &str, order_id: &str, carrier_id: &str, score: u8) -> Rating {
        Rating {
            id: id.to_string(),
            order_id: order_id.to_string(),
            customer_id: "alice".to_string(),
            carrier_id: carrier_id.to_string(),
            score,
            comment: None,
            created_at: Utc.with_ymd_and_hms(2026, 6, 2, 9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_stock_moves_must_be_positive() {
        let ledger = ledger();

        for quantity in [Quantity::zero(), Quantity::from_kilograms(-5)] {
            assert!(matches!(
                ledger.reserve_stock("onion", quantity).await,
                Err(LedgerError::Invalid(_))
            ));
            assert!(matches!(
                ledger.release_stock("onion", quantity).await,
                Err(LedgerError::Invalid(_))
            ));
        }
        assert_eq!(ledger.stock_of("onion"), Some(Quantity::from_kilograms(10)));
    }

    #[tokio::test]
    async fn test_one_rating_per_order() {
        let ledger = ledger();

        assert!(ledger.insert_rating(&rating("r-1", "o-1", "carrier-a", 5)).await.unwrap());
        assert!(!ledger.insert_rating(&rating("r-2", "o-1", "carrier-a", 1)).await.unwrap());
        assert!(ledger.insert_rating(&rating("r-3", "o-2", "carrier-a", 2)).await.unwrap());
        assert!(ledger.insert_rating(&rating("r-4", "o-3", "carrier-b", 4)).await.unwrap());

        assert!(ledger.has_rated("o-1", "alice").await.unwrap());
        assert!(!ledger.has_rated("o-1", "bob").await.unwrap());

        let ids: Vec<String> = ledger
            .ratings_for_carrier("carrier-a")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["r-3".to_string(), "r-1".to_string()]);

        let summary = ledger.carrier_rating("carrier-a").await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, 3.5);
        assert_eq!(ledger.carrier_rating("carrier-c").await.unwrap().count, 0);
    }
}
