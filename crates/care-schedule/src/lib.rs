//! Scheduled maintenance
//!
//! Runs the marketplace housekeeping jobs (reminders, auto-completion,
//! expiry of stale requests) on cron schedules.

mod config;
mod error;
mod scheduler;

pub use config::{Job, ScheduleConfig, ScheduleTask};
pub use error::{Result, ScheduleError};
pub use scheduler::{Scheduler, SchedulerHandle};
