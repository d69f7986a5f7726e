//! Notification delivery and inbox operations

use tracing::warn;

use super::Marketplace;
use crate::notification::{Channel, Notification};
use crate::Result;

impl Marketplace {
    /// Store a notification and push it when its channel asks for that.
    /// Failures are logged; they never undo the operation that triggered them.
    pub(crate) async fn notify(&self, notification: Notification) {
        let stored = self
            .store()
            .and_then(|store| store.insert_notification(&notification));
        if let Err(e) = stored {
            warn!(user = %notification.user_id, "Failed to store notification: {}", e);
            return;
        }

        if notification.channel == Channel::Push {
            if let Err(e) = self.sink.deliver(&notification).await {
                warn!(user = %notification.user_id, "Push delivery failed: {}", e);
            }
        }
    }

    pub fn list_notifications(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        self.store()?.list_notifications(user_id, unread_only)
    }

    pub fn unread_count(&self, user_id: &str) -> Result<usize> {
        self.store()?.unread_count(user_id)
    }

    pub fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<()> {
        self.store()?.mark_notification_read(user_id, notification_id)
    }

    pub fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        self.store()?.mark_all_notifications_read(user_id)
    }
}
