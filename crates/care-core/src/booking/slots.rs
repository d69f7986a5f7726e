//! Hourly slot grid and interval overlap

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{Error, Result};

/// Half-open `[start_hour, end_hour)` interval in whole hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl TimeSlot {
    /// Create a slot, rejecting empty or inverted intervals and hours past 24
    pub fn new(start_hour: u8, end_hour: u8) -> Result<Self> {
        if end_hour > 24 {
            return Err(Error::Validation(format!("end hour {} is past midnight", end_hour)));
        }
        if start_hour >= end_hour {
            return Err(Error::Validation(format!(
                "slot start {} must be before end {}",
                start_hour, end_hour
            )));
        }
        Ok(Self { start_hour, end_hour })
    }

    /// One-hour slot starting at `hour`
    pub fn hour(hour: u8) -> Self {
        Self {
            start_hour: hour,
            end_hour: hour + 1,
        }
    }

    pub fn hours(&self) -> u8 {
        self.end_hour - self.start_hour
    }

    /// Exclusive boundaries: 9-10 and 10-11 do not overlap
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start_hour < other.end_hour && self.end_hour > other.start_hour
    }

    /// Start hours of every one-hour slot this interval spans
    pub fn start_hours(&self) -> impl Iterator<Item = u8> {
        self.start_hour..self.end_hour
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

/// The fixed list of bookable hourly slots in a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    first_hour: u8,
    last_hour: u8,
}

impl SlotGrid {
    pub fn new(first_hour: u8, last_hour: u8) -> Result<Self> {
        if first_hour >= last_hour || last_hour > 24 {
            return Err(Error::Config(format!(
                "invalid slot grid {:02}:00-{:02}:00",
                first_hour, last_hour
            )));
        }
        Ok(Self { first_hour, last_hour })
    }

    pub fn first_hour(&self) -> u8 {
        self.first_hour
    }

    pub fn last_hour(&self) -> u8 {
        self.last_hour
    }

    /// Every one-hour slot of the grid, in order
    pub fn slots(&self) -> impl Iterator<Item = TimeSlot> {
        (self.first_hour..self.last_hour).map(TimeSlot::hour)
    }

    pub fn contains(&self, slot: &TimeSlot) -> bool {
        slot.start_hour >= self.first_hour && slot.end_hour <= self.last_hour
    }

    pub fn contains_hour(&self, hour: u8) -> bool {
        hour >= self.first_hour && hour < self.last_hour
    }
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            first_hour: 8,
            last_hour: 20,
        }
    }
}

/// One-hour slots of the grid that are offered and free of every booking
pub fn available_slots(grid: &SlotGrid, offered: &BTreeSet<u8>, booked: &[TimeSlot]) -> Vec<TimeSlot> {
    grid.slots()
        .filter(|slot| offered.contains(&slot.start_hour))
        .filter(|slot| !booked.iter().any(|b| b.overlaps(slot)))
        .collect()
}

/// Whether a multi-hour request fits: every hour offered, nothing overlapping
pub fn is_bookable(slot: &TimeSlot, offered: &BTreeSet<u8>, booked: &[TimeSlot]) -> bool {
    slot.start_hours().all(|h| offered.contains(&h)) && !booked.iter().any(|b| b.overlaps(slot))
}
