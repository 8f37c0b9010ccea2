//! # Message Notifier
//!
//! [`Notifier`] that writes each notice into the recipient's inbox.

use async_trait::async_trait;
use tracing::debug;

use crate::repository::message::MessageRepository;
use grocer_core::ports::NotifyError;
use grocer_core::{Notice, Notifier};

/// Delivers notices to the `messages` table.
#[derive(Debug, Clone)]
pub struct MessageNotifier {
    messages: MessageRepository,
}

impl MessageNotifier {
    pub fn new(messages: MessageRepository) -> Self {
        MessageNotifier { messages }
    }
}

#[async_trait]
impl Notifier for MessageNotifier {
    async fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        let id = self
            .messages
            .insert(&notice)
            .await
            .map_err(|e| NotifyError(e.to_string()))?;
        debug!(id = %id, kind = notice.kind.as_str(), "Notice delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use grocer_core::{NoticeKind, Recipient};

    fn notice() -> Notice {
        Notice {
            recipient: Recipient::Customer("alice".to_string()),
            kind: NoticeKind::OrderDelivered,
            subject: "Your order has been delivered".to_string(),
            body: "Thanks for shopping with us.".to_string(),
            reference: Some("o-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_notice_lands_in_inbox() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let notifier = MessageNotifier::new(db.messages());

        notifier.notify(notice()).await.unwrap();

        let inbox = db
            .messages()
            .inbox(&Recipient::Customer("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].subject, "Your order has been delivered");
        assert_eq!(inbox[0].reference.as_deref(), Some("o-1"));
    }

    #[tokio::test]
    async fn test_closed_pool_reports_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let notifier = MessageNotifier::new(db.messages());
        db.close().await;

        assert!(notifier.notify(notice()).await.is_err());
    }
}
