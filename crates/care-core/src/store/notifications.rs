//! Notification persistence

use rusqlite::{params, Row};
use tracing::debug;

use super::{enum_col, time_col, Store};
use crate::notification::{Channel, Notification, NotificationKind, NotificationStatus, Priority};
use crate::{Error, Result};

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: enum_col(row, 2, NotificationKind::parse)?,
        title: row.get(3)?,
        message: row.get(4)?,
        status: enum_col(row, 5, NotificationStatus::parse)?,
        priority: enum_col(row, 6, Priority::parse)?,
        channel: enum_col(row, 7, Channel::parse)?,
        related_request_id: row.get(8)?,
        created_at: time_col(row, 9)?,
    })
}

impl Store {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notifications
                (id, user_id, kind, title, message, status, priority, channel, related_request_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                notification.id,
                notification.user_id,
                notification.kind.as_str(),
                notification.title,
                notification.message,
                notification.status.as_str(),
                notification.priority.as_str(),
                notification.channel.as_str(),
                notification.related_request_id,
                notification.created_at.to_rfc3339(),
            ],
        )?;
        debug!(user = %notification.user_id, "Stored {} notification", notification.kind.as_str());
        Ok(())
    }

    /// Newest first
    pub fn list_notifications(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let sql = if unread_only {
            "SELECT id, user_id, kind, title, message, status, priority, channel, related_request_id, created_at
             FROM notifications WHERE user_id = ?1 AND status = 'unread' ORDER BY created_at DESC"
        } else {
            "SELECT id, user_id, kind, title, message, status, priority, channel, related_request_id, created_at
             FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC"
        };

        let mut stmt = self.conn.prepare(sql)?;
        let notifications = stmt
            .query_map(params![user_id], notification_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    pub fn unread_count(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND status = 'unread'",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Mark one of the user's notifications read
    pub fn mark_notification_read(&self, user_id: &str, id: &str) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE notifications SET status = 'read' WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if affected == 0 {
            return Err(Error::NotificationNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        let affected = self.conn.execute(
            "UPDATE notifications SET status = 'read' WHERE user_id = ?1 AND status = 'unread'",
            params![user_id],
        )?;
        Ok(affected)
    }
}
