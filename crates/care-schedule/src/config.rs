//! Schedule configuration
//!
//! Loaded from a TOML file of `[[schedules]]` tables.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use cron::Schedule as CronSchedule;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// Housekeeping job a schedule triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    /// Remind both parties the day before
    Reminders,
    /// Complete paid appointments that have ended
    AutoComplete,
    /// Cancel requests whose start passed without acceptance or payment
    ExpireStale,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Job::Reminders => "reminders",
            Job::AutoComplete => "auto_complete",
            Job::ExpireStale => "expire_stale",
        })
    }
}

/// All schedules
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub schedules: Vec<ScheduleTask>,
}

/// One cron-triggered job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTask {
    pub name: String,

    /// Six-field cron expression with seconds (e.g. "0 0 18 * * *" = daily at 18:00 UTC)
    pub cron: String,

    pub job: Job,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ScheduleTask {
    pub fn new(name: impl Into<String>, cron: impl Into<String>, job: Job) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            job,
            enabled: true,
        }
    }

    pub fn schedule(&self) -> Result<CronSchedule> {
        CronSchedule::from_str(&self.cron).map_err(|source| ScheduleError::CronParse {
            task: self.name.clone(),
            source,
        })
    }
}

impl ScheduleConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ScheduleError::ConfigLoad(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ScheduleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, else the first default location that exists,
    /// else the built-in schedules
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        Self::load_default()
    }

    pub fn load_default() -> Result<Self> {
        let paths = ["schedule.toml", "config/schedule.toml"];

        for path in &paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::builtin())
    }

    /// Reminders every evening, completion and expiry every quarter hour
    pub fn builtin() -> Self {
        Self {
            schedules: vec![
                ScheduleTask::new("evening reminders", "0 0 18 * * *", Job::Reminders),
                ScheduleTask::new("auto complete", "0 */15 * * * *", Job::AutoComplete),
                ScheduleTask::new("expire stale", "0 5,20,35,50 * * * *", Job::ExpireStale),
            ],
        }
    }

    /// Every cron expression must parse, enabled or not
    pub fn validate(&self) -> Result<()> {
        for task in &self.schedules {
            task.schedule()?;
        }
        Ok(())
    }

    pub fn enabled_tasks(&self) -> Vec<&ScheduleTask> {
        self.schedules.iter().filter(|t| t.enabled).collect()
    }
}
