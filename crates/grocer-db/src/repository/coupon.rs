//! # Coupon Repository
//!
//! Coupons, their assignment to customers, and redemptions.
//!
//! Redemptions are written by [`OrderRepository::insert`] in the order's
//! own transaction; this repository only reads them.
//!
//! [`OrderRepository::insert`]: crate::repository::order::OrderRepository::insert

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use grocer_core::{Coupon, Money, Rate};

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: String,
    code: String,
    discount_bps: i64,
    min_order_cents: i64,
    expiry_date: Option<NaiveDate>,
    active: bool,
    max_usage: i64,
    usage_count: i64,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DbError;

    fn try_from(row: CouponRow) -> DbResult<Self> {
        let count = |column: &str, value: i64| {
            u32::try_from(value).map_err(|_| DbError::decode(column, value.to_string()))
        };

        Ok(Coupon {
            discount_percent: Rate::from_bps(count("discount_bps", row.discount_bps)?),
            max_usage: count("max_usage", row.max_usage)?,
            usage_count: count("usage_count", row.usage_count)?,
            id: row.id,
            code: row.code,
            min_order_value: Money::from_cents(row.min_order_cents),
            expiry_date: row.expiry_date,
            active: row.active,
        })
    }
}

fn into_coupons(rows: Vec<CouponRow>) -> DbResult<Vec<Coupon>> {
    rows.into_iter().map(Coupon::try_from).collect()
}

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    /// Creates a new CouponRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Inserts a new coupon.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already taken
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<Coupon> {
        coupon.validate()?;

        info!(code = %coupon.code, percent = %coupon.discount_percent, "Creating coupon");

        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, discount_bps, min_order_cents, expiry_date,
                active, max_usage, usage_count, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&coupon.id)
        .bind(coupon.code.trim())
        .bind(i64::from(coupon.discount_percent.bps()))
        .bind(coupon.min_order_value.cents())
        .bind(coupon.expiry_date)
        .bind(coupon.active)
        .bind(i64::from(coupon.max_usage))
        .bind(i64::from(coupon.usage_count))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, coupon.code.trim()),
            other => other,
        })?;

        Ok(coupon.clone())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Coupon>> {
        let row: Option<CouponRow> = sqlx::query_as(
            r#"
            SELECT id, code, discount_bps, min_order_cents, expiry_date,
                   active, max_usage, usage_count
            FROM coupons
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Looks a coupon up by the code a customer typed.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let row: Option<CouponRow> = sqlx::query_as(
            r#"
            SELECT id, code, discount_bps, min_order_cents, expiry_date,
                   active, max_usage, usage_count
            FROM coupons
            WHERE code = ?1
            "#,
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// All coupons, newest first.
    pub async fn list(&self) -> DbResult<Vec<Coupon>> {
        let rows: Vec<CouponRow> = sqlx::query_as(
            r#"
            SELECT id, code, discount_bps, min_order_cents, expiry_date,
                   active, max_usage, usage_count
            FROM coupons
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        into_coupons(rows)
    }

    /// Switches a coupon off. Already placed orders keep their discount.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE coupons SET active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }

        info!(id = %id, "Coupon deactivated");
        Ok(())
    }

    /// Gives a coupon to a customer. Assigning twice is a no-op.
    pub async fn assign(&self, customer_id: &str, coupon_id: &str) -> DbResult<()> {
        if self.get_by_id(coupon_id).await?.is_none() {
            return Err(DbError::not_found("Coupon", coupon_id));
        }

        sqlx::query(
            r#"
            INSERT INTO customer_coupons (customer_id, coupon_id, assigned_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (customer_id, coupon_id) DO NOTHING
            "#,
        )
        .bind(customer_id)
        .bind(coupon_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(customer_id = %customer_id, coupon_id = %coupon_id, "Coupon assigned");
        Ok(())
    }

    /// Coupons assigned to the customer that they have not redeemed and that
    /// are valid on `today`.
    pub async fn available_for_customer(
        &self,
        customer_id: &str,
        today: NaiveDate,
    ) -> DbResult<Vec<Coupon>> {
        let rows: Vec<CouponRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.code, c.discount_bps, c.min_order_cents, c.expiry_date,
                   c.active, c.max_usage, c.usage_count
            FROM coupons c
            INNER JOIN customer_coupons cc ON cc.coupon_id = c.id
            WHERE cc.customer_id = ?1
              AND NOT EXISTS (
                  SELECT 1 FROM coupon_redemptions r
                  WHERE r.customer_id = cc.customer_id AND r.coupon_id = c.id
              )
            ORDER BY c.code
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_coupons(rows)?
            .into_iter()
            .filter(|coupon| coupon.is_valid(today))
            .collect())
    }

    pub async fn has_redeemed(&self, customer_id: &str, coupon_id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM coupon_redemptions WHERE customer_id = ?1 AND coupon_id = ?2",
        )
        .bind(customer_id)
        .bind(coupon_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
