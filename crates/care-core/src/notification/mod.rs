//! User notifications
//!
//! Every notification is stored for in-app display. High priority ones are
//! also handed to a [`NotificationSink`] for push delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequested,
    BookingAccepted,
    BookingRejected,
    BookingCancelled,
    PaymentReceived,
    AppointmentCompleted,
    RatingReceived,
    Reminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingRequested => "booking_requested",
            NotificationKind::BookingAccepted => "booking_accepted",
            NotificationKind::BookingRejected => "booking_rejected",
            NotificationKind::BookingCancelled => "booking_cancelled",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::AppointmentCompleted => "appointment_completed",
            NotificationKind::RatingReceived => "rating_received",
            NotificationKind::Reminder => "reminder",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        use NotificationKind::*;
        [
            BookingRequested,
            BookingAccepted,
            BookingRejected,
            BookingCancelled,
            PaymentReceived,
            AppointmentCompleted,
            RatingReceived,
            Reminder,
        ]
        .into_iter()
        .find(|k| k.as_str() == s)
        .ok_or_else(|| Error::Validation(format!("unknown notification kind: {}", s)))
    }

    /// Default priority for this kind of event
    pub fn priority(&self) -> Priority {
        match self {
            NotificationKind::BookingRequested
            | NotificationKind::BookingCancelled
            | NotificationKind::Reminder => Priority::High,
            NotificationKind::BookingAccepted
            | NotificationKind::BookingRejected
            | NotificationKind::PaymentReceived => Priority::Normal,
            NotificationKind::AppointmentCompleted | NotificationKind::RatingReceived => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Push,
}

macro_rules! str_enum {
    ($ty:ty { $($variant:path => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $s),+
                }
            }

            pub fn parse(s: &str) -> Result<Self> {
                match s {
                    $($s => Ok($variant),)+
                    other => Err(Error::Validation(format!(
                        concat!("unknown ", stringify!($ty), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

str_enum!(NotificationStatus {
    NotificationStatus::Unread => "unread",
    NotificationStatus::Read => "read",
});

str_enum!(Priority {
    Priority::Low => "low",
    Priority::Normal => "normal",
    Priority::High => "high",
});

str_enum!(Channel {
    Channel::InApp => "in_app",
    Channel::Push => "push",
});

/// A message for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    pub priority: Priority,
    pub channel: Channel,
    pub related_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let priority = kind.priority();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            status: NotificationStatus::Unread,
            priority,
            channel: if priority == Priority::High {
                Channel::Push
            } else {
                Channel::InApp
            },
            related_request_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_request(mut self, request_id: impl Into<String>) -> Self {
        self.related_request_id = Some(request_id.into());
        self
    }

    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}

/// Push delivery seam for high priority notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Sink that records deliveries in the log
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            user = %notification.user_id,
            kind = notification.kind.as_str(),
            "push: {}",
            notification.title
        );
        Ok(())
    }
}
