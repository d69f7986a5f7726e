//! Caregiver earnings

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::Marketplace;
use crate::user::Role;
use crate::Result;

/// Money and workload totals for one caregiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub caregiver_id: String,
    /// Caregiver share of paid and completed appointments
    pub total_earned_cents: i64,
    pub platform_fees_cents: i64,
    pub completed_count: u32,
    /// Accepted or paid, dated today or later
    pub upcoming_count: u32,
    pub pending_count: u32,
}

impl Marketplace {
    pub fn earnings(&self, caregiver_id: &str) -> Result<EarningsSummary> {
        self.user_with_role(caregiver_id, Role::Caregiver)?;
        self.store()?.earnings(caregiver_id, Utc::now().date_naive())
    }
}
