//! Error types for care-schedule

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression for {task}: {source}")]
    CronParse {
        task: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("Failed to load schedule file: {0}")]
    ConfigLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Core error: {0}")]
    Core(#[from] care_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ScheduleError>;
