//! Appointment ratings and per-caregiver summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A client's rating of one completed appointment. Keyed by appointment id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub appointment_id: String,
    pub caregiver_id: String,
    pub client_id: String,
    pub stars: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(
        appointment_id: impl Into<String>,
        caregiver_id: impl Into<String>,
        client_id: impl Into<String>,
        stars: u8,
        comment: Option<String>,
    ) -> Result<Self> {
        validate_stars(stars)?;
        Ok(Self {
            appointment_id: appointment_id.into(),
            caregiver_id: caregiver_id.into(),
            client_id: client_id.into(),
            stars,
            comment: comment.filter(|c| !c.trim().is_empty()),
            created_at: Utc::now(),
        })
    }
}

pub fn validate_stars(stars: u8) -> Result<()> {
    if (1..=5).contains(&stars) {
        Ok(())
    } else {
        Err(Error::Validation(format!("rating must be between 1 and 5, got {}", stars)))
    }
}

/// Aggregate of every rating a caregiver has received
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingSummary {
    pub caregiver_id: String,
    pub average: f64,
    pub total: u32,
    /// Count of 1..=5 star ratings, index 0 = one star
    pub histogram: [u32; 5],
}

impl RatingSummary {
    pub fn empty(caregiver_id: impl Into<String>) -> Self {
        Self {
            caregiver_id: caregiver_id.into(),
            average: 0.0,
            total: 0,
            histogram: [0; 5],
        }
    }

    pub fn from_histogram(caregiver_id: impl Into<String>, histogram: [u32; 5]) -> Self {
        let total: u32 = histogram.iter().sum();
        let weighted: u64 = histogram
            .iter()
            .enumerate()
            .map(|(i, n)| (i as u64 + 1) * u64::from(*n))
            .sum();
        let average = if total == 0 {
            0.0
        } else {
            ((weighted as f64 / f64::from(total)) * 100.0).round() / 100.0
        };

        Self {
            caregiver_id: caregiver_id.into(),
            average,
            total,
            histogram,
        }
    }

    /// Summary after adding one rating
    pub fn with_rating(&self, stars: u8) -> Result<Self> {
        validate_stars(stars)?;
        let mut histogram = self.histogram;
        histogram[usize::from(stars - 1)] += 1;
        Ok(Self::from_histogram(self.caregiver_id.clone(), histogram))
    }
}
