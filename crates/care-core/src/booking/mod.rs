//! Booking domain: hire requests, status rules, slots and pricing

pub mod pricing;
pub mod slots;
mod types;

pub use pricing::PaymentSplit;
pub use slots::{SlotGrid, TimeSlot};
pub use types::{BookingStatus, HireRequest, NewHireRequest};
