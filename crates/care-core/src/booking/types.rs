//! Hire request types and the booking status state machine

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::booking::TimeSlot;
use crate::{Error, Result};

/// Lifecycle status of a hire request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Paid,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Rejected,
        BookingStatus::Paid,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    /// Statuses that hold the caregiver's time
    pub const BLOCKING: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Paid,
        BookingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Paid => "paid",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// The complete set of legal moves
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, Paid)
                | (Accepted, Cancelled)
                | (Paid, Completed)
        )
    }

    /// Validate a move, returning the new status
    pub fn transition(self, next: BookingStatus) -> Result<BookingStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition { from: self, to: next })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Completed
        )
    }

    pub fn blocks_slot(&self) -> bool {
        Self::BLOCKING.contains(self)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown booking status: {}", s)))
    }
}

/// A booking of one caregiver by one client for a contiguous block of hours
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HireRequest {
    pub id: String,
    pub client_id: String,
    pub caregiver_id: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub total_amount_cents: i64,
    /// Set once paid
    pub caregiver_amount_cents: Option<i64>,
    /// Set once paid
    pub platform_fee_cents: Option<i64>,
    pub payment_reference: Option<String>,
    /// Gateway status of the charge. Asaas reports `PENDING` until the client
    /// settles the invoice, so `paid` means the charge was issued.
    pub payment_status: Option<String>,
    pub cancellation_reason: Option<String>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HireRequest {
    /// Create a pending request
    pub fn new(
        client_id: impl Into<String>,
        caregiver_id: impl Into<String>,
        date: NaiveDate,
        slot: TimeSlot,
        total_amount_cents: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: client_id.into(),
            caregiver_id: caregiver_id.into(),
            date,
            slot,
            status: BookingStatus::Pending,
            notes: None,
            total_amount_cents,
            caregiver_amount_cents: None,
            platform_fee_cents: None,
            payment_reference: None,
            payment_status: None,
            cancellation_reason: None,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn is_party(&self, user_id: &str) -> bool {
        self.client_id == user_id || self.caregiver_id == user_id
    }

    /// Appointment start as a naive UTC timestamp
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(hour_time(self.slot.start_hour))
    }

    /// Appointment end as a naive UTC timestamp
    pub fn ends_at(&self) -> NaiveDateTime {
        if self.slot.end_hour >= 24 {
            // Midnight of the following day
            self.date.and_time(NaiveTime::MIN) + chrono::Duration::days(1)
        } else {
            self.date.and_time(hour_time(self.slot.end_hour))
        }
    }
}

fn hour_time(hour: u8) -> NaiveTime {
    NaiveTime::from_hms_opt(u32::from(hour.min(23)), 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Client input for a new booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHireRequest {
    pub caregiver_id: String,
    pub date: NaiveDate,
    pub start_hour: u8,
    pub end_hour: u8,
    #[serde(default)]
    pub notes: Option<String>,
}
