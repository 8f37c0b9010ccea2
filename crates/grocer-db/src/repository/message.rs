//! # Message Repository
//!
//! Inboxes for the owner and for each customer. Every [`Notice`] the
//! lifecycle sends lands here as one row.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  recipient_role │ recipient_id │ kind            │ subject              │
//! │─────────────────┼──────────────┼─────────────────┼──────────────────────│
//! │  owner          │ NULL         │ price_doubled   │ Price Alert: ...     │
//! │  owner          │ NULL         │ order_cancelled │ Order ... cancelled  │
//! │  customer       │ alice        │ order_delivered │ Your order has ...   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use grocer_core::{Notice, NoticeKind, Recipient};

/// A stored notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub recipient: Recipient,
    pub kind: String,
    pub subject: String,
    pub body: String,
    pub reference: Option<String>,
    /// Structured copy of the notice (JSON).
    pub metadata: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: String,
    recipient_role: String,
    recipient_id: Option<String>,
    kind: String,
    subject: String,
    body: String,
    reference: Option<String>,
    metadata: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = DbError;

    fn try_from(row: MessageRow) -> DbResult<Self> {
        let recipient = match (row.recipient_role.as_str(), row.recipient_id) {
            ("owner", _) => Recipient::Owner,
            ("customer", Some(id)) => Recipient::Customer(id),
            ("carrier", Some(id)) => Recipient::Carrier(id),
            (role, _) => return Err(DbError::decode("recipient_role", role)),
        };
        let metadata = row
            .metadata
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| DbError::decode("metadata", e.to_string()))?;

        Ok(Message {
            id: row.id,
            recipient,
            kind: row.kind,
            subject: row.subject,
            body: row.body,
            reference: row.reference,
            metadata,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

fn recipient_columns(recipient: &Recipient) -> (&'static str, Option<&str>) {
    match recipient {
        Recipient::Owner => ("owner", None),
        Recipient::Customer(id) => ("customer", Some(id.as_str())),
        Recipient::Carrier(id) => ("carrier", Some(id.as_str())),
    }
}

/// Repository for notification messages.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Creates a new MessageRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MessageRepository { pool }
    }

    /// Stores a notice and returns the new message id.
    pub async fn insert(&self, notice: &Notice) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        let (role, recipient_id) = recipient_columns(&notice.recipient);
        let metadata = json!({
            "kind": notice.kind,
            "recipient": notice.recipient,
            "reference": notice.reference,
        });

        sqlx::query(
            r#"
            INSERT INTO messages (
                id, recipient_role, recipient_id, kind, subject, body,
                reference, metadata, is_read, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)
            "#,
        )
        .bind(&id)
        .bind(role)
        .bind(recipient_id)
        .bind(notice.kind.as_str())
        .bind(&notice.subject)
        .bind(&notice.body)
        .bind(&notice.reference)
        .bind(metadata.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(id = %id, kind = notice.kind.as_str(), recipient = role, "Message stored");
        Ok(id)
    }

    /// Messages for one recipient, newest first.
    pub async fn inbox(&self, recipient: &Recipient) -> DbResult<Vec<Message>> {
        let (role, recipient_id) = recipient_columns(recipient);
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, recipient_role, recipient_id, kind, subject, body,
                   reference, metadata, is_read, created_at
            FROM messages
            WHERE recipient_role = ?1 AND recipient_id IS ?2
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(role)
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    /// Messages of one kind across all inboxes, oldest first.
    pub async fn list_by_kind(&self, kind: NoticeKind) -> DbResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, recipient_role, recipient_id, kind, subject, body,
                   reference, metadata, is_read, created_at
            FROM messages
            WHERE kind = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    pub async fn unread_count(&self, recipient: &Recipient) -> DbResult<i64> {
        let (role, recipient_id) = recipient_columns(recipient);
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE recipient_role = ?1 AND recipient_id IS ?2 AND is_read = 0
            "#,
        )
        .bind(role)
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn mark_read(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Message", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn notice(recipient: Recipient, kind: NoticeKind) -> Notice {
        Notice {
            recipient,
            kind,
            subject: "Subject".to_string(),
            body: "Body".to_string(),
            reference: Some("ref-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_inboxes_are_separate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let alice = Recipient::Customer("alice".to_string());

        db.messages()
            .insert(&notice(Recipient::Owner, NoticeKind::StockOut))
            .await
            .unwrap();
        let id = db
            .messages()
            .insert(&notice(alice.clone(), NoticeKind::OrderDelivered))
            .await
            .unwrap();

        let owner = db.messages().inbox(&Recipient::Owner).await.unwrap();
        assert_eq!(owner.len(), 1);
        assert_eq!(owner[0].kind, "stock_out");

        let inbox = db.messages().inbox(&alice).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].recipient, alice);
        let metadata = inbox[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["kind"], "order_delivered");
        assert_eq!(metadata["reference"], "ref-1");

        assert_eq!(db.messages().unread_count(&alice).await.unwrap(), 1);
        db.messages().mark_read(&id).await.unwrap();
        assert_eq!(db.messages().unread_count(&alice).await.unwrap(), 0);

        assert_eq!(
            db.messages()
                .list_by_kind(NoticeKind::StockOut)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
