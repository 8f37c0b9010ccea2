//! # Customer Repository
//!
//! Loyalty counters per customer and the store-wide loyalty settings.
//!
//! The counter moves inside order transactions (`+1` on delivery, `= 0` on
//! a loyalty checkout); the setter here is for the owner console and seeding.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use grocer_core::{LoyaltySettings, Rate};

/// Repository for customer records and loyalty settings.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Delivered orders since the customer last used the loyalty discount.
    /// 0 for a customer with no record.
    pub async fn completed_orders(&self, customer_id: &str) -> DbResult<u32> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT completed_orders FROM customers WHERE id = ?1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;

        let count = count.unwrap_or(0);
        u32::try_from(count).map_err(|_| DbError::decode("completed_orders", count.to_string()))
    }

    pub async fn set_completed_orders(&self, customer_id: &str, count: u32) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, completed_orders, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                completed_orders = excluded.completed_orders,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(customer_id)
        .bind(i64::from(count))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stored loyalty settings, `None` until the owner saves some.
    pub async fn loyalty_settings(&self) -> DbResult<Option<LoyaltySettings>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT min_orders_for_discount, discount_bps FROM loyalty_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(min_orders, bps)| {
            Ok(LoyaltySettings {
                min_orders_for_discount: u32::try_from(min_orders).map_err(|_| {
                    DbError::decode("min_orders_for_discount", min_orders.to_string())
                })?,
                discount_percent: Rate::from_bps(
                    u32::try_from(bps).map_err(|_| DbError::decode("discount_bps", bps.to_string()))?,
                ),
            })
        })
        .transpose()
    }

    /// Replaces the loyalty settings.
    pub async fn save_loyalty_settings(&self, settings: &LoyaltySettings) -> DbResult<()> {
        settings.validate()?;

        sqlx::query(
            r#"
            INSERT INTO loyalty_settings (id, min_orders_for_discount, discount_bps, updated_at)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                min_orders_for_discount = excluded.min_orders_for_discount,
                discount_bps = excluded.discount_bps,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(i64::from(settings.min_orders_for_discount))
        .bind(i64::from(settings.discount_percent.bps()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(
            min_orders = settings.min_orders_for_discount,
            percent = %settings.discount_percent,
            "Loyalty settings saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_completed_orders_default_and_set() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_eq!(db.customers().completed_orders("alice").await.unwrap(), 0);

        db.customers().set_completed_orders("alice", 4).await.unwrap();
        db.customers().set_completed_orders("alice", 5).await.unwrap();
        assert_eq!(db.customers().completed_orders("alice").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_loyalty_settings_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.customers().loyalty_settings().await.unwrap().is_none());

        let settings = LoyaltySettings {
            min_orders_for_discount: 3,
            discount_percent: Rate::from_percent(12),
        };
        db.customers().save_loyalty_settings(&settings).await.unwrap();
        assert_eq!(db.customers().loyalty_settings().await.unwrap(), Some(settings));

        let invalid = LoyaltySettings {
            min_orders_for_discount: 0,
            ..settings
        };
        assert!(matches!(
            db.customers().save_loyalty_settings(&invalid).await,
            Err(DbError::Invalid(_))
        ));
    }
}
