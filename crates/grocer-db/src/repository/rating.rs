//! # Rating Repository
//!
//! Carrier ratings left by customers after delivery.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order_id (UNIQUE) │ customer_id │ carrier_id │ score │ comment         │
//! │────────────────────┼─────────────┼────────────┼───────┼─────────────────│
//! │  o-1               │ alice       │ carrier-a  │ 5     │ on time         │
//! │  o-2               │ bob         │ carrier-a  │ 3     │ NULL            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The UNIQUE order_id makes "one rating per order" hold across processes:
//! a second insert for the same order writes nothing.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use grocer_core::{CarrierRating, Rating};

const RATING_SELECT: &str = r#"
    SELECT id, order_id, customer_id, carrier_id, score, comment, created_at
    FROM ratings
"#;

#[derive(Debug, sqlx::FromRow)]
struct RatingRow {
    id: String,
    order_id: String,
    customer_id: String,
    carrier_id: String,
    score: i64,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RatingRow> for Rating {
    type Error = DbError;

    fn try_from(row: RatingRow) -> DbResult<Self> {
        let score =
            u8::try_from(row.score).map_err(|_| DbError::decode("score", row.score.to_string()))?;
        Ok(Rating {
            id: row.id,
            order_id: row.order_id,
            customer_id: row.customer_id,
            carrier_id: row.carrier_id,
            score,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

/// Repository for carrier ratings.
#[derive(Debug, Clone)]
pub struct RatingRepository {
    pool: SqlitePool,
}

impl RatingRepository {
    /// Creates a new RatingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RatingRepository { pool }
    }

    /// Stores the rating. `false` when its order already has one.
    pub async fn insert(&self, rating: &Rating) -> DbResult<bool> {
        rating.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO ratings (id, order_id, customer_id, carrier_id, score, comment, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(&rating.id)
        .bind(&rating.order_id)
        .bind(&rating.customer_id)
        .bind(&rating.carrier_id)
        .bind(i64::from(rating.score))
        .bind(&rating.comment)
        .bind(rating.created_at)
        .execute(&self.pool)
        .await?;

        let stored = result.rows_affected() == 1;
        debug!(order_id = %rating.order_id, stored, "Rating insert");
        Ok(stored)
    }

    pub async fn has_rated(&self, order_id: &str, customer_id: &str) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM ratings WHERE order_id = ?1 AND customer_id = ?2")
                .bind(order_id)
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    pub async fn get_for_order(&self, order_id: &str) -> DbResult<Option<Rating>> {
        let sql = format!("{RATING_SELECT} WHERE order_id = ?1");
        let row: Option<RatingRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Rating::try_from).transpose()
    }

    /// Newest first.
    pub async fn list_for_carrier(&self, carrier_id: &str) -> DbResult<Vec<Rating>> {
        let sql = format!("{RATING_SELECT} WHERE carrier_id = ?1 ORDER BY created_at DESC, rowid DESC");
        let rows: Vec<RatingRow> = sqlx::query_as(&sql)
            .bind(carrier_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Rating::try_from).collect()
    }

    /// Every rating, newest first (owner view).
    pub async fn list_all(&self) -> DbResult<Vec<Rating>> {
        let sql = format!("{RATING_SELECT} ORDER BY created_at DESC, rowid DESC");
        let rows: Vec<RatingRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Rating::try_from).collect()
    }

    /// Average and count; an unrated carrier averages 0.
    pub async fn carrier_summary(&self, carrier_id: &str) -> DbResult<CarrierRating> {
        let (average, count): (Option<f64>, i64) =
            sqlx::query_as("SELECT AVG(score), COUNT(*) FROM ratings WHERE carrier_id = ?1")
                .bind(carrier_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(CarrierRating {
            carrier_id: carrier_id.to_string(),
            average: average.unwrap_or(0.0),
            count: u32::try_from(count).map_err(|_| DbError::decode("count", count.to_string()))?,
        })
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
    use grocer_core::ports::TracingNotifier;
    use grocer_core::{
        BusinessRules, Cart, Category, CheckoutRequest, ManualClock, Money, Order, OrderLifecycle,
        Product, Quantity,
    };
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    async fn setup() -> (Database, OrderLifecycle) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .insert(&Product {
                id: "p-carrot".to_string(),
                name: "Carrot".to_string(),
                category: Category::Vegetable,
                price_per_kg: Money::from_cents(500),
                stock: Quantity::from_kilograms(100),
                threshold: Quantity::from_kilograms(10),
            })
            .await
            .unwrap();
        let lifecycle = OrderLifecycle::new(
            Arc::new(db.ledger()),
            Arc::new(TracingNotifier),
            Arc::new(ManualClock::new(start())),
            BusinessRules::default(),
        );
        (db, lifecycle)
    }

    async fn delivered(lifecycle: &OrderLifecycle, customer: &str, carrier: &str) -> Order {
        let mut cart = Cart::new();
        cart.add("p-carrot", "Carrot", Quantity::from_kilograms(4), Money::from_cents(500))
            .unwrap();
        let request = CheckoutRequest {
            customer_id: customer.to_string(),
            requested_delivery: start() + Duration::hours(6),
            coupon_code: None,
            use_loyalty: false,
        };
        let order = lifecycle.place(&cart, &request).await.unwrap();
        lifecycle.claim(&order.id, carrier).await.unwrap();
        lifecycle.complete(&order.id, carrier, start()).await.unwrap()
    }

    fn rating(order: &Order, score: u8, minute: i64) -> Rating {
        Rating {
            id: format!("r-{}", order.id),
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            carrier_id: order.carrier_id.clone().unwrap(),
            score,
            comment: Some("on time".to_string()),
            created_at: start() + Duration::minutes(minute),
        }
    }

    #[tokio::test]
    async fn test_insert_once_per_order() {
        let (db, lifecycle) = setup().await;
        let order = delivered(&lifecycle, "alice", "carrier-a").await;

        assert!(db.ratings().insert(&rating(&order, 5, 1)).await.unwrap());

        let mut again = rating(&order, 1, 2);
        again.id = "r-again".to_string();
        assert!(!db.ratings().insert(&again).await.unwrap());

        let stored = db.ratings().get_for_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored, rating(&order, 5, 1));
        assert!(db.ratings().has_rated(&order.id, "alice").await.unwrap());
        assert!(!db.ratings().has_rated(&order.id, "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_score_writes_nothing() {
        let (db, lifecycle) = setup().await;
        let order = delivered(&lifecycle, "alice", "carrier-a").await;

        let err = db.ratings().insert(&rating(&order, 0, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
        assert!(db.ratings().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_carrier_summary_and_listing() {
        let (db, lifecycle) = setup().await;
        assert_eq!(
            db.ratings().carrier_summary("carrier-a").await.unwrap(),
            CarrierRating::unrated("carrier-a")
        );

        let first = delivered(&lifecycle, "alice", "carrier-a").await;
        let second = delivered(&lifecycle, "bob", "carrier-a").await;
        let other = delivered(&lifecycle, "carol", "carrier-b").await;
        db.ratings().insert(&rating(&first, 5, 1)).await.unwrap();
        db.ratings().insert(&rating(&second, 2, 2)).await.unwrap();
        db.ratings().insert(&rating(&other, 4, 3)).await.unwrap();

        let summary = db.ratings().carrier_summary("carrier-a").await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, 3.5);

        let ids: Vec<String> = db
            .ratings()
            .list_for_carrier("carrier-a")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.order_id)
            .collect();
        assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);
        assert_eq!(db.ratings().list_all().await.unwrap().len(), 3);
    }
}
