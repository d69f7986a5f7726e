//! care-core: CareConnect core library
//!
//! Domain types, the booking status state machine, the hourly slot grid,
//! pricing, SQLite persistence and the `Marketplace` service that ties
//! them together.

pub mod booking;
pub mod config;
pub mod error;
pub mod marketplace;
pub mod notification;
pub mod payment;
pub mod rating;
pub mod store;
pub mod user;

pub use booking::{BookingStatus, HireRequest, NewHireRequest, PaymentSplit, SlotGrid, TimeSlot};
pub use config::{ApiConfig, BookingConfig, Config, DatabaseConfig, PaymentConfig, PaymentProvider, SchedulerConfig};
pub use error::{Error, Result};
pub use marketplace::{CaregiverCard, EarningsSummary, MaintenanceReport, Marketplace, SearchQuery};
pub use notification::{Notification, NotificationKind, NotificationSink, TracingSink};
pub use payment::{ChargeReceipt, ChargeRequest, CustomerRequest, OfflineGateway, PaymentGateway};
pub use rating::{Rating, RatingSummary};
pub use store::Store;
pub use user::{Availability, DayOfWeek, NewUser, ProfileUpdate, Role, User};
