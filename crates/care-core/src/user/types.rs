//! Account types shared by clients and caregivers

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::booking::SlotGrid;
use crate::{Error, Result};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Caregiver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Caregiver => "caregiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "client" => Ok(Role::Client),
            "caregiver" => Ok(Role::Caregiver),
            other => Err(Error::Validation(format!("unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// Weekly availability: the start hours of the one-hour slots offered per day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Availability(BTreeMap<DayOfWeek, BTreeSet<u8>>);

impl Availability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer every hour in `start..end` on `day`
    pub fn with_hours(mut self, day: DayOfWeek, hours: std::ops::Range<u8>) -> Self {
        self.0.entry(day).or_default().extend(hours);
        self
    }

    /// Hours offered on the weekday of `date`
    pub fn offered_on(&self, date: NaiveDate) -> BTreeSet<u8> {
        self.0.get(&DayOfWeek::of(date)).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|hours| hours.is_empty())
    }

    /// Every offered hour must fall inside the grid
    pub fn validate(&self, grid: &SlotGrid) -> Result<()> {
        for (day, hours) in &self.0 {
            if let Some(h) = hours.iter().find(|h| !grid.contains_hour(**h)) {
                return Err(Error::Validation(format!(
                    "{:?} hour {} is outside bookable hours {:02}:00-{:02}:00",
                    day,
                    h,
                    grid.first_hour(),
                    grid.last_hour()
                )));
            }
        }
        Ok(())
    }
}

/// A client or caregiver account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    /// Caregivers only
    pub hourly_rate_cents: Option<i64>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub availability: Availability,
    /// Caregiver ids a client has starred
    #[serde(default)]
    pub favorites: Vec<String>,
    /// Customer id at the payment gateway, created on first payment
    pub payment_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(role: Role, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            full_name: full_name.into(),
            email: email.into(),
            phone: None,
            bio: None,
            hourly_rate_cents: None,
            specialties: Vec::new(),
            availability: Availability::default(),
            favorites: Vec::new(),
            payment_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_caregiver(&self) -> bool {
        self.role == Role::Caregiver
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    /// Case-insensitive specialty match
    pub fn has_specialty(&self, specialty: &str) -> bool {
        let needle = specialty.to_lowercase();
        self.specialties.iter().any(|s| s.to_lowercase().contains(&needle))
    }
}

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub role: Role,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub hourly_rate_cents: Option<i64>,
    #[serde(default)]
    pub specialties: Vec<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(Error::Validation("full name is required".to_string()));
        }
        if !self.email.contains('@') {
            return Err(Error::Validation(format!("invalid email: {}", self.email)));
        }
        match (self.role, self.hourly_rate_cents) {
            (Role::Caregiver, Some(rate)) if rate > 0 => Ok(()),
            (Role::Caregiver, _) => Err(Error::Validation(
                "caregivers need a positive hourly rate".to_string(),
            )),
            (Role::Client, Some(_)) => Err(Error::Validation(
                "clients cannot set an hourly rate".to_string(),
            )),
            (Role::Client, None) => Ok(()),
        }
    }

    pub fn into_user(self) -> User {
        let mut user = User::new(self.role, self.full_name.trim(), self.email.trim().to_lowercase());
        user.phone = self.phone;
        user.bio = self.bio;
        user.hourly_rate_cents = self.hourly_rate_cents;
        user.specialties = self.specialties;
        user
    }
}

/// Partial profile update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub hourly_rate_cents: Option<i64>,
    pub specialties: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn apply(self, user: &mut User) -> Result<()> {
        if let Some(name) = self.full_name {
            if name.trim().is_empty() {
                return Err(Error::Validation("full name is required".to_string()));
            }
            user.full_name = name.trim().to_string();
        }
        if let Some(rate) = self.hourly_rate_cents {
            if !user.is_caregiver() {
                return Err(Error::Validation("clients cannot set an hourly rate".to_string()));
            }
            if rate <= 0 {
                return Err(Error::Validation("hourly rate must be positive".to_string()));
            }
            user.hourly_rate_cents = Some(rate);
        }
        if let Some(phone) = self.phone {
            user.phone = Some(phone);
        }
        if let Some(bio) = self.bio {
            user.bio = Some(bio);
        }
        if let Some(specialties) = self.specialties {
            user.specialties = specialties;
        }
        user.updated_at = Utc::now();
        Ok(())
    }
}
