//! Client and caregiver accounts

mod types;

pub use types::{Availability, DayOfWeek, NewUser, ProfileUpdate, Role, User};
