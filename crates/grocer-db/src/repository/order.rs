//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. INSERT (one transaction)                                            │
//! │     └── orders + order_items                                            │
//! │     └── coupon_redemptions row, coupons.usage_count + 1                 │
//! │     └── customers.completed_orders = 0 (loyalty used)                   │
//! │                                                                         │
//! │  2. CLAIM                                                               │
//! │     └── UPDATE ... WHERE status = 'pending'                             │
//! │                                                                         │
//! │  3a. COMPLETE (one transaction)                                         │
//! │     └── UPDATE ... WHERE status = 'selected' AND carrier_id = :carrier  │
//! │     └── customers.completed_orders + 1                                  │
//! │                                                                         │
//! │  3b. CANCEL (one transaction)                                           │
//! │     └── UPDATE ... WHERE status = 'pending'                             │
//! │     └── products.stock_grams + each line's quantity                     │
//! │                                                                         │
//! │  A guard that matches no row changes nothing; the caller gets the       │
//! │  order's current status back.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transaction opens with a write, so SQLite takes the write lock up
//! front and concurrent writers queue on the busy timeout.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use grocer_core::ports::{Insertion, Transition};
use grocer_core::{
    AppliedCoupon, AppliedDiscounts, Money, Order, OrderLine, OrderStatus, PriceBreakdown,
    ProductSales, Quantity, Rate, SalesReport,
};

const ORDER_SELECT: &str = r#"
    SELECT
        id, customer_id, carrier_id, status,
        order_time, requested_delivery, delivery_time,
        subtotal_cents, discount_bps, discount_cents, after_discount_cents,
        vat_cents, total_cents,
        loyalty_bps, coupon_id, coupon_code, coupon_bps
    FROM orders
"#;

#[derive(Debug, sqlx::FromRow)]
struct ProductSalesRow {
    product_id: String,
    product_name: String,
    quantity_grams: i64,
    revenue_cents: i64,
}

impl From<ProductSalesRow> for ProductSales {
    fn from(row: ProductSalesRow) -> Self {
        ProductSales {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: Quantity::from_grams(row.quantity_grams),
            revenue: Money::from_cents(row.revenue_cents),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    customer_id: String,
    carrier_id: Option<String>,
    status: OrderStatus,
    order_time: DateTime<Utc>,
    requested_delivery: DateTime<Utc>,
    delivery_time: Option<DateTime<Utc>>,
    subtotal_cents: i64,
    discount_bps: i64,
    discount_cents: i64,
    after_discount_cents: i64,
    vat_cents: i64,
    total_cents: i64,
    loyalty_bps: Option<i64>,
    coupon_id: Option<String>,
    coupon_code: Option<String>,
    coupon_bps: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    product_id: String,
    product_name: String,
    quantity_grams: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
}

impl From<OrderItemRow> for OrderLine {
    fn from(row: OrderItemRow) -> Self {
        OrderLine {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: Quantity::from_grams(row.quantity_grams),
            unit_price: Money::from_cents(row.unit_price_cents),
            line_total: Money::from_cents(row.line_total_cents),
        }
    }
}

fn rate(column: &str, bps: i64) -> DbResult<Rate> {
    u32::try_from(bps)
        .map(Rate::from_bps)
        .map_err(|_| DbError::decode(column, format!("{bps} is not a rate")))
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> DbResult<Order> {
        let coupon = match (self.coupon_id, self.coupon_code, self.coupon_bps) {
            (Some(coupon_id), Some(code), Some(bps)) => Some(AppliedCoupon {
                coupon_id,
                code,
                percent: rate("coupon_bps", bps)?,
            }),
            _ => None,
        };
        let loyalty = self
            .loyalty_bps
            .map(|bps| rate("loyalty_bps", bps))
            .transpose()?;

        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            carrier_id: self.carrier_id,
            status: self.status,
            order_time: self.order_time,
            requested_delivery: self.requested_delivery,
            delivery_time: self.delivery_time,
            pricing: PriceBreakdown {
                subtotal: Money::from_cents(self.subtotal_cents),
                discount_percent: rate("discount_bps", self.discount_bps)?,
                discount: Money::from_cents(self.discount_cents),
                after_discount: Money::from_cents(self.after_discount_cents),
                vat: Money::from_cents(self.vat_cents),
                total: Money::from_cents(self.total_cents),
            },
            discounts: AppliedDiscounts { loyalty, coupon },
            lines,
        })
    }
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE id = ?1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.with_lines(row).await?)),
            None => Ok(None),
        }
    }

    /// Orders in one status, oldest first.
    pub async fn list_by_status(&self, status: OrderStatus) -> DbResult<Vec<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE status = ?1 ORDER BY order_time, rowid");
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        self.with_lines_all(rows).await
    }

    /// A customer's orders, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "{ORDER_SELECT} WHERE customer_id = ?1 ORDER BY order_time DESC, rowid DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        self.with_lines_all(rows).await
    }

    /// A carrier's orders, newest first, optionally in one status.
    pub async fn list_for_carrier(
        &self,
        carrier_id: &str,
        status: Option<OrderStatus>,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "{ORDER_SELECT} WHERE carrier_id = ?1 AND (?2 IS NULL OR status = ?2) \
             ORDER BY order_time DESC, rowid DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(carrier_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        self.with_lines_all(rows).await
    }

    pub async fn count_by_status(&self, status: OrderStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Owner totals over DELIVERED orders.
    ///
    /// Product rows are grouped by product id, highest revenue first.
    pub async fn sales_report(&self) -> DbResult<SalesReport> {
        let (count, subtotal, discount, vat, total): (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(subtotal_cents), 0),
                COALESCE(SUM(discount_cents), 0),
                COALESCE(SUM(vat_cents), 0),
                COALESCE(SUM(total_cents), 0)
            FROM orders
            WHERE status = ?1
            "#,
        )
        .bind(OrderStatus::Delivered)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<ProductSalesRow> = sqlx::query_as(
            r#"
            SELECT
                i.product_id,
                MAX(i.product_name) AS product_name,
                SUM(i.quantity_grams) AS quantity_grams,
                SUM(i.line_total_cents) AS revenue_cents
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.status = ?1
            GROUP BY i.product_id
            ORDER BY revenue_cents DESC, product_name
            "#,
        )
        .bind(OrderStatus::Delivered)
        .fetch_all(&self.pool)
        .await?;

        Ok(SalesReport {
            delivered_orders: u32::try_from(count)
                .map_err(|_| DbError::decode("delivered_orders", count.to_string()))?,
            subtotal: Money::from_cents(subtotal),
            discount: Money::from_cents(discount),
            vat: Money::from_cents(vat),
            total: Money::from_cents(total),
            by_product: rows.into_iter().map(ProductSales::from).collect(),
        })
    }

    async fn with_lines(&self, row: OrderRow) -> DbResult<Order> {
        let items: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT product_id, product_name, quantity_grams, unit_price_cents, line_total_cents
            FROM order_items
            WHERE order_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        row.into_order(items.into_iter().map(OrderLine::from).collect())
    }

    async fn with_lines_all(&self, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.with_lines(row).await?);
        }
        Ok(orders)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a PENDING order with its lines, its coupon redemption and its
    /// loyalty reset, all or nothing.
    pub async fn insert(&self, order: &Order) -> DbResult<Insertion> {
        debug!(id = %order.id, customer_id = %order.customer_id, "Inserting order");

        let now = Utc::now();
        let coupon = order.discounts.coupon.as_ref();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, carrier_id, status,
                order_time, requested_delivery, delivery_time,
                subtotal_cents, discount_bps, discount_cents, after_discount_cents,
                vat_cents, total_cents,
                loyalty_bps, coupon_id, coupon_code, coupon_bps,
                updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13,
                ?14, ?15, ?16, ?17,
                ?18
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(&order.carrier_id)
        .bind(order.status)
        .bind(order.order_time)
        .bind(order.requested_delivery)
        .bind(order.delivery_time)
        .bind(order.pricing.subtotal.cents())
        .bind(i64::from(order.pricing.discount_percent.bps()))
        .bind(order.pricing.discount.cents())
        .bind(order.pricing.after_discount.cents())
        .bind(order.pricing.vat.cents())
        .bind(order.pricing.total.cents())
        .bind(order.discounts.loyalty.map(|r| i64::from(r.bps())))
        .bind(coupon.map(|c| c.coupon_id.as_str()))
        .bind(coupon.map(|c| c.code.as_str()))
        .bind(coupon.map(|c| i64::from(c.percent.bps())))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, line_no, product_id, product_name,
                    quantity_grams, unit_price_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&order.id)
            .bind(line_no as i64)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity.grams())
            .bind(line.unit_price.cents())
            .bind(line.line_total.cents())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(coupon) = coupon {
            let redeemed = sqlx::query(
                r#"
                INSERT INTO coupon_redemptions (customer_id, coupon_id, order_id, redeemed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (customer_id, coupon_id) DO NOTHING
                "#,
            )
            .bind(&order.customer_id)
            .bind(&coupon.coupon_id)
            .bind(&order.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if redeemed.rows_affected() == 0 {
                tx.rollback().await?;
                debug!(id = %order.id, code = %coupon.code, "Coupon already redeemed");
                return Ok(Insertion::CouponAlreadyRedeemed);
            }

            let bumped = sqlx::query(
                r#"
                UPDATE coupons SET usage_count = usage_count + 1
                WHERE id = ?1 AND (max_usage = 0 OR usage_count < max_usage)
                "#,
            )
            .bind(&coupon.coupon_id)
            .execute(&mut *tx)
            .await?;

            if bumped.rows_affected() == 0 {
                tx.rollback().await?;
                debug!(id = %order.id, code = %coupon.code, "Coupon usage limit reached");
                return Ok(Insertion::CouponExhausted);
            }
        }

        if order.discounts.uses_loyalty() {
            sqlx::query(
                r#"
                INSERT INTO customers (id, completed_orders, updated_at)
                VALUES (?1, 0, ?2)
                ON CONFLICT (id) DO UPDATE SET
                    completed_orders = 0,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&order.customer_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Insertion::Inserted)
    }

    /// PENDING → SELECTED for `carrier_id`.
    pub async fn claim(&self, order_id: &str, carrier_id: &str) -> DbResult<Transition> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = 'selected',
                carrier_id = ?2,
                updated_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(carrier_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return self.rejected(order_id).await;
        }

        debug!(order_id = %order_id, carrier_id = %carrier_id, "Order claimed");
        self.applied(order_id).await
    }

    /// PENDING → CANCELLED, returning the lines to stock.
    pub async fn cancel(&self, order_id: &str) -> DbResult<Transition> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = 'cancelled',
                updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return self.rejected(order_id).await;
        }

        sqlx::query(
            r#"
            UPDATE products SET
                stock_grams = stock_grams + (
                    SELECT COALESCE(SUM(i.quantity_grams), 0)
                    FROM order_items i
                    WHERE i.order_id = ?1 AND i.product_id = products.id
                ),
                updated_at = ?2
            WHERE id IN (SELECT product_id FROM order_items WHERE order_id = ?1)
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(order_id = %order_id, "Order cancelled, stock returned");
        self.applied(order_id).await
    }

    /// SELECTED (held by `carrier_id`) → DELIVERED, crediting the customer
    /// one completed order.
    pub async fn complete(
        &self,
        order_id: &str,
        carrier_id: &str,
        delivered_at: DateTime<Utc>,
    ) -> DbResult<Transition> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = 'delivered',
                delivery_time = ?3,
                updated_at = ?4
            WHERE id = ?1 AND status = 'selected' AND carrier_id = ?2
            "#,
        )
        .bind(order_id)
        .bind(carrier_id)
        .bind(delivered_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return self.rejected(order_id).await;
        }

        sqlx::query(
            r#"
            INSERT INTO customers (id, completed_orders, updated_at)
            SELECT customer_id, 1, ?2 FROM orders WHERE id = ?1
            ON CONFLICT (id) DO UPDATE SET
                completed_orders = completed_orders + 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(order_id = %order_id, carrier_id = %carrier_id, "Order delivered");
        self.applied(order_id).await
    }

    async fn applied(&self, order_id: &str) -> DbResult<Transition> {
        let order = self
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;
        Ok(Transition::Applied(order))
    }

    async fn rejected(&self, order_id: &str) -> DbResult<Transition> {
        let row: Option<(OrderStatus, Option<String>)> =
            sqlx::query_as("SELECT status, carrier_id FROM orders WHERE id = ?1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((current, carrier_id)) => Ok(Transition::Rejected {
                current,
                carrier_id,
            }),
            None => Err(DbError::not_found("Order", order_id)),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone};
    use grocer_core::{Category, Coupon, PricingEngine, Product};

    fn kg(n: i64) -> Quantity {
        Quantity::from_kilograms(n)
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, hour, 0, 0).unwrap()
    }

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .insert(&Product {
                id: "p-carrot".to_string(),
                name: "Carrot".to_string(),
                category: Category::Vegetable,
                price_per_kg: Money::from_cents(500),
                stock: kg(100),
                threshold: kg(10),
            })
            .await
            .unwrap();
        db.coupons()
            .insert(&Coupon {
                id: "c-ten".to_string(),
                code: "TEN".to_string(),
                discount_percent: Rate::from_percent(10),
                min_order_value: Money::zero(),
                expiry_date: None,
                active: true,
                max_usage: 1,
                usage_count: 0,
            })
            .await
            .unwrap();
        db
    }

    fn order(id: &str, customer: &str, hour: u32, discounts: AppliedDiscounts) -> Order {
        let line = OrderLine {
            product_id: "p-carrot".to_string(),
            product_name: "Carrot".to_string(),
            quantity: kg(4),
            unit_price: Money::from_cents(500),
            line_total: Money::from_cents(2000),
        };
        let pricing =
            PricingEngine::default().breakdown(Money::from_cents(2000), discounts.total_percent());
        Order {
            id: id.to_string(),
            customer_id: customer.to_string(),
            carrier_id: None,
            status: OrderStatus::Pending,
            order_time: at(hour),
            requested_delivery: at(hour) + Duration::hours(4),
            delivery_time: None,
            pricing,
            discounts,
            lines: vec![line],
        }
    }

    fn with_coupon() -> AppliedDiscounts {
        AppliedDiscounts {
            loyalty: None,
            coupon: Some(AppliedCoupon {
                coupon_id: "c-ten".to_string(),
                code: "TEN".to_string(),
                percent: Rate::from_percent(10),
            }),
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = setup().await;
        let placed = order("o-1", "alice", 9, with_coupon());
        assert_eq!(db.orders().insert(&placed).await.unwrap(), Insertion::Inserted);

        let stored = db.orders().get_by_id("o-1").await.unwrap().unwrap();
        assert_eq!(stored, placed);
        assert_eq!(stored.total(), Money::from_cents(2124));
        assert!(db.coupons().has_redeemed("alice", "c-ten").await.unwrap());
    }

    #[tokio::test]
    async fn test_coupon_redeemed_twice_inserts_nothing() {
        let db = setup().await;
        db.orders()
            .insert(&order("o-1", "alice", 9, with_coupon()))
            .await
            .unwrap();

        let second = db
            .orders()
            .insert(&order("o-2", "alice", 10, with_coupon()))
            .await
            .unwrap();
        assert_eq!(second, Insertion::CouponAlreadyRedeemed);
        assert!(db.orders().get_by_id("o-2").await.unwrap().is_none());

        let third = db
            .orders()
            .insert(&order("o-3", "bob", 10, with_coupon()))
            .await
            .unwrap();
        assert_eq!(third, Insertion::CouponExhausted);
        assert!(db.orders().get_by_id("o-3").await.unwrap().is_none());
        assert_eq!(db.coupons().get_by_id("c-ten").await.unwrap().unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn test_loyalty_insert_resets_counter() {
        let db = setup().await;
        db.customers().set_completed_orders("alice", 6).await.unwrap();

        let discounts = AppliedDiscounts {
            loyalty: Some(Rate::from_percent(10)),
            coupon: None,
        };
        db.orders()
            .insert(&order("o-1", "alice", 9, discounts))
            .await
            .unwrap();
        assert_eq!(db.customers().completed_orders("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_claim_is_guarded() {
        let db = setup().await;
        db.orders()
            .insert(&order("o-1", "alice", 9, AppliedDiscounts::none()))
            .await
            .unwrap();

        match db.orders().claim("o-1", "carrier-a").await.unwrap() {
            Transition::Applied(o) => {
                assert_eq!(o.status, OrderStatus::Selected);
                assert_eq!(o.carrier_id.as_deref(), Some("carrier-a"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let second = db.orders().claim("o-1", "carrier-b").await.unwrap();
        assert_eq!(
            second,
            Transition::Rejected {
                current: OrderStatus::Selected,
                carrier_id: Some("carrier-a".to_string()),
            }
        );

        assert!(matches!(
            db.orders().claim("missing", "carrier-a").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_returns_stock() {
        let db = setup().await;
        db.products().reserve("p-carrot", kg(4)).await.unwrap();
        db.orders()
            .insert(&order("o-1", "alice", 9, AppliedDiscounts::none()))
            .await
            .unwrap();

        let cancelled = db.orders().cancel("o-1").await.unwrap();
        assert!(matches!(cancelled, Transition::Applied(ref o) if o.status == OrderStatus::Cancelled));

        let carrot = db.products().get_by_id("p-carrot").await.unwrap().unwrap();
        assert_eq!(carrot.stock, kg(100));

        // a second cancel is rejected and does not restock again
        assert!(matches!(
            db.orders().cancel("o-1").await.unwrap(),
            Transition::Rejected { current: OrderStatus::Cancelled, .. }
        ));
        let carrot = db.products().get_by_id("p-carrot").await.unwrap().unwrap();
        assert_eq!(carrot.stock, kg(100));
    }

    #[tokio::test]
    async fn test_complete_credits_customer_once() {
        let db = setup().await;
        db.orders()
            .insert(&order("o-1", "alice", 9, AppliedDiscounts::none()))
            .await
            .unwrap();
        db.orders().claim("o-1", "carrier-a").await.unwrap();

        let wrong = db.orders().complete("o-1", "carrier-b", at(12)).await.unwrap();
        assert!(matches!(wrong, Transition::Rejected { current: OrderStatus::Selected, .. }));

        let done = db.orders().complete("o-1", "carrier-a", at(12)).await.unwrap();
        match done {
            Transition::Applied(o) => assert_eq!(o.delivery_time, Some(at(12))),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            db.orders().complete("o-1", "carrier-a", at(12)).await.unwrap(),
            Transition::Rejected { current: OrderStatus::Delivered, .. }
        ));
        assert_eq!(db.customers().completed_orders("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sales_report_counts_delivered_only() {
        let db = setup().await;
        assert_eq!(db.orders().sales_report().await.unwrap(), SalesReport::default());

        for (id, customer, hour) in [("o-1", "alice", 8), ("o-2", "bob", 9), ("o-3", "carol", 10)] {
            db.orders()
                .insert(&order(id, customer, hour, AppliedDiscounts::none()))
                .await
                .unwrap();
        }
        db.orders()
            .insert(&order("o-4", "dave", 11, with_coupon()))
            .await
            .unwrap();
        for id in ["o-1", "o-2"] {
            db.orders().claim(id, "carrier-a").await.unwrap();
            db.orders().complete(id, "carrier-a", at(12)).await.unwrap();
        }
        db.orders().cancel("o-4").await.unwrap();

        let report = db.orders().sales_report().await.unwrap();
        assert_eq!(report.delivered_orders, 2);
        assert_eq!(report.subtotal, Money::from_cents(4000));
        assert_eq!(report.discount, Money::zero());
        assert_eq!(report.vat, Money::from_cents(720));
        assert_eq!(report.total, Money::from_cents(4720));
        assert_eq!(
            report.by_product,
            vec![ProductSales {
                product_id: "p-carrot".to_string(),
                product_name: "Carrot".to_string(),
                quantity: kg(8),
                revenue: Money::from_cents(4000),
            }]
        );
    }

    #[tokio::test]
    async fn test_listing_order() {
        let db = setup().await;
        for (id, customer, hour) in [("o-1", "alice", 8), ("o-2", "bob", 9), ("o-3", "alice", 10)] {
            db.orders()
                .insert(&order(id, customer, hour, AppliedDiscounts::none()))
                .await
                .unwrap();
        }
        db.orders().claim("o-2", "carrier-a").await.unwrap();

        let pending: Vec<_> = db
            .orders()
            .list_by_status(OrderStatus::Pending)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(pending, vec!["o-1", "o-3"]);

        let alice: Vec<_> = db
            .orders()
            .list_for_customer("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(alice, vec!["o-3", "o-1"]);

        assert_eq!(db.orders().list_for_carrier("carrier-a", None).await.unwrap().len(), 1);
        assert!(db
            .orders()
            .list_for_carrier("carrier-a", Some(OrderStatus::Delivered))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(db.orders().count_by_status(OrderStatus::Pending).await.unwrap(), 2);
    }
}
