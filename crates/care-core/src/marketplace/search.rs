//! Caregiver search

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Marketplace;
use crate::booking::slots;
use crate::booking::TimeSlot;
use crate::rating::RatingSummary;
use crate::user::User;
use crate::{Error, Result};

/// Search filters; every given filter must match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub specialty: Option<String>,
    /// Case-insensitive substring of the full name
    pub name: Option<String>,
    pub max_rate_cents: Option<i64>,
    pub min_rating: Option<f64>,
    /// Only caregivers with free time on this date
    pub date: Option<NaiveDate>,
    /// With `date`, require this whole window to be free
    pub start_hour: Option<u8>,
    pub end_hour: Option<u8>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// The requested window, if any. A start without an end means one hour.
    fn window(&self) -> Result<Option<TimeSlot>> {
        match (self.start_hour, self.end_hour) {
            (None, None) => Ok(None),
            (Some(start), None) => TimeSlot::new(start, start.saturating_add(1)).map(Some),
            (Some(start), Some(end)) => TimeSlot::new(start, end).map(Some),
            (None, Some(_)) => Err(Error::Validation("end_hour needs a start_hour".to_string())),
        }
    }
}

/// A search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaregiverCard {
    pub caregiver: User,
    pub rating: RatingSummary,
    /// Free one-hour slots on the searched date; empty without a date
    pub free_slots: Vec<TimeSlot>,
}

impl Marketplace {
    /// Best rated first, then cheapest
    pub fn search_caregivers(&self, query: &SearchQuery) -> Result<Vec<CaregiverCard>> {
        let window = query.window()?;
        if window.is_some() && query.date.is_none() {
            return Err(Error::Validation("an hour window needs a date".to_string()));
        }
        let name = query.name.as_ref().map(|n| n.to_lowercase());

        let store = self.store()?;
        let mut cards = Vec::new();
        for caregiver in store.list_caregivers()? {
            if let Some(specialty) = &query.specialty {
                if !caregiver.has_specialty(specialty) {
                    continue;
                }
            }
            if let Some(name) = &name {
                if !caregiver.full_name.to_lowercase().contains(name) {
                    continue;
                }
            }
            if let Some(max) = query.max_rate_cents {
                if caregiver.hourly_rate_cents.is_none_or(|rate| rate > max) {
                    continue;
                }
            }

            let rating = store.rating_summary(&caregiver.id)?;
            if let Some(min) = query.min_rating {
                if rating.average < min {
                    continue;
                }
            }

            let free_slots = match query.date {
                Some(date) => {
                    let offered = caregiver.availability.offered_on(date);
                    let booked = store.booked_slots(&caregiver.id, date)?;
                    if let Some(window) = &window {
                        if !slots::is_bookable(window, &offered, &booked) {
                            continue;
                        }
                    }
                    let free = slots::available_slots(&self.grid, &offered, &booked);
                    if free.is_empty() {
                        continue;
                    }
                    free
                }
                None => Vec::new(),
            };

            cards.push(CaregiverCard {
                caregiver,
                rating,
                free_slots,
            });
        }
        drop(store);

        cards.sort_by(|a, b| {
            b.rating
                .average
                .partial_cmp(&a.rating.average)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.caregiver.hourly_rate_cents.cmp(&b.caregiver.hourly_rate_cents))
        });
        if let Some(limit) = query.limit {
            cards.truncate(limit);
        }
        debug!("Search matched {} caregivers", cards.len());
        Ok(cards)
    }
}
