//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `careconnect.toml` configuration file
//! 3. Default values
//!
//! `${VAR_NAME}` inside the configuration file expands to the value of the
//! environment variable.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::booking::SlotGrid;
use crate::Error;

/// Payment provider used to charge clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    /// In-process gateway, no money moves
    #[default]
    Offline,
    /// Asaas REST API
    Asaas,
}

impl PaymentProvider {
    fn parse(value: &str) -> crate::Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "asaas" => Ok(PaymentProvider::Asaas),
            "offline" => Ok(PaymentProvider::Offline),
            other => Err(Error::Config(format!(
                "unknown payment provider '{}', expected offline or asaas",
                other
            ))),
        }
    }
}

/// Main configuration for CareConnect
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Booking rules
    #[serde(default)]
    pub booking: BookingConfig,

    /// Payment configuration
    #[serde(default)]
    pub payments: PaymentConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API key for HTTP API authentication
    pub key: Option<String>,

    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Allowed CORS origins. Permissive when unset.
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            port: default_api_port(),
            allowed_origins: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Booking rules shared by every booking path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Start hour of the first bookable slot
    #[serde(default = "default_first_hour")]
    pub first_hour: u8,

    /// End hour of the last bookable slot (exclusive)
    #[serde(default = "default_last_hour")]
    pub last_hour: u8,

    /// Longest single booking, in hours
    #[serde(default = "default_max_booking_hours")]
    pub max_booking_hours: u8,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            first_hour: default_first_hour(),
            last_hour: default_last_hour(),
            max_booking_hours: default_max_booking_hours(),
        }
    }
}

impl BookingConfig {
    /// The slot grid described by this configuration
    pub fn grid(&self) -> crate::Result<SlotGrid> {
        SlotGrid::new(self.first_hour, self.last_hour)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Which gateway charges clients
    #[serde(default)]
    pub provider: PaymentProvider,

    /// Provider access token
    pub api_key: Option<String>,

    /// Provider base URL (sandbox when unset)
    pub base_url: Option<String>,

    /// Share of each payment kept by the platform, in percent
    #[serde(default = "default_platform_fee_percent")]
    pub platform_fee_percent: u8,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider: PaymentProvider::Offline,
            api_key: None,
            base_url: None,
            platform_fee_percent: default_platform_fee_percent(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether maintenance jobs run
    pub enabled: bool,

    /// Path of the schedule definition file
    pub config_path: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            config_path: None,
        }
    }
}

fn default_api_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "data/careconnect.db".to_string()
}

fn default_first_hour() -> u8 {
    8
}

fn default_last_hour() -> u8 {
    20
}

fn default_max_booking_hours() -> u8 {
    8
}

fn default_platform_fee_percent() -> u8 {
    20
}

fn parse_flag(value: &str) -> bool {
    value.to_lowercase() != "false"
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).collect()
}

impl Config {
    /// Expand `${VAR_NAME}` references with environment variable values.
    /// Unknown variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load settings from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;

        Ok(cfg)
    }

    /// Parse TOML text (after env expansion) without consulting overrides
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        Self::from_toml_config(toml)
    }

    /// Load from `./careconnect.toml` when present, else from the environment
    pub fn load() -> crate::Result<Self> {
        if Path::new("careconnect.toml").exists() {
            return Self::from_toml_file("careconnect.toml");
        }

        Self::from_env()
    }

    fn from_toml_config(toml: TomlConfig) -> crate::Result<Self> {
        let api = toml.api.unwrap_or_default();
        let database = toml.database.unwrap_or_default();
        let booking = toml.booking.unwrap_or_default();
        let payments = toml.payments.unwrap_or_default();
        let scheduler = toml.scheduler.unwrap_or_default();

        Ok(Config {
            api: ApiConfig {
                key: api.key.filter(|k| !k.is_empty()),
                port: api.port.unwrap_or_else(default_api_port),
                allowed_origins: api.allowed_origins,
            },
            database: DatabaseConfig {
                db_path: database.db_path.unwrap_or_else(default_db_path),
            },
            booking: BookingConfig {
                first_hour: booking.first_hour.unwrap_or_else(default_first_hour),
                last_hour: booking.last_hour.unwrap_or_else(default_last_hour),
                max_booking_hours: booking
                    .max_booking_hours
                    .unwrap_or_else(default_max_booking_hours),
            },
            payments: PaymentConfig {
                provider: payments
                    .provider
                    .as_deref()
                    .map(PaymentProvider::parse)
                    .transpose()?
                    .unwrap_or_default(),
                api_key: payments.api_key.filter(|k| !k.is_empty()),
                base_url: payments.base_url.filter(|u| !u.is_empty()),
                platform_fee_percent: payments
                    .platform_fee_percent
                    .unwrap_or_else(default_platform_fee_percent),
            },
            scheduler: SchedulerConfig {
                enabled: scheduler.enabled.unwrap_or(true),
                config_path: scheduler.config_path,
            },
        })
    }

    /// Environment variables win over file values
    fn apply_env_overrides(&mut self) -> crate::Result<()> {
        if let Ok(key) = std::env::var("API_KEY") {
            if !key.is_empty() {
                self.api.key = Some(key);
            }
        }
        if let Ok(port) = std::env::var("API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }
        if let Ok(origins) = std::env::var("API_ALLOWED_ORIGINS") {
            self.api.allowed_origins = Some(split_list(&origins));
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            self.database.db_path = path;
        }

        if let Some(h) = std::env::var("BOOKING_FIRST_HOUR").ok().and_then(|v| v.parse().ok()) {
            self.booking.first_hour = h;
        }
        if let Some(h) = std::env::var("BOOKING_LAST_HOUR").ok().and_then(|v| v.parse().ok()) {
            self.booking.last_hour = h;
        }
        if let Some(h) = std::env::var("BOOKING_MAX_HOURS").ok().and_then(|v| v.parse().ok()) {
            self.booking.max_booking_hours = h;
        }

        if let Ok(provider) = std::env::var("PAYMENT_PROVIDER") {
            if !provider.is_empty() {
                self.payments.provider = PaymentProvider::parse(&provider)?;
            }
        }
        if let Ok(key) = std::env::var("ASAAS_API_KEY") {
            if !key.is_empty() {
                self.payments.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("ASAAS_BASE_URL") {
            if !url.is_empty() {
                self.payments.base_url = Some(url);
            }
        }
        if let Some(pct) = std::env::var("PLATFORM_FEE_PERCENT").ok().and_then(|v| v.parse().ok()) {
            self.payments.platform_fee_percent = pct;
        }

        if let Ok(enabled) = std::env::var("SCHEDULE_ENABLED") {
            self.scheduler.enabled = parse_flag(&enabled);
        }
        if let Ok(path) = std::env::var("SCHEDULE_CONFIG_PATH") {
            self.scheduler.config_path = Some(path);
        }

        Ok(())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Config::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        self.booking.grid()?;
        if self.booking.max_booking_hours == 0 {
            return Err(Error::Config("max_booking_hours must be positive".to_string()));
        }
        if self.payments.platform_fee_percent > 100 {
            return Err(Error::Config(format!(
                "platform_fee_percent must be at most 100, got {}",
                self.payments.platform_fee_percent
            )));
        }
        if self.payments.provider == PaymentProvider::Asaas && self.payments.api_key.is_none() {
            return Err(Error::Config(
                "payments.provider = asaas requires ASAAS_API_KEY".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TOML file layout
// ============================================================================

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    api: Option<TomlApi>,
    database: Option<TomlDatabase>,
    booking: Option<TomlBooking>,
    payments: Option<TomlPayments>,
    scheduler: Option<TomlScheduler>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlApi {
    key: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDatabase {
    db_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlBooking {
    first_hour: Option<u8>,
    last_hour: Option<u8>,
    max_booking_hours: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlPayments {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    platform_fee_percent: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlScheduler {
    enabled: Option<bool>,
    config_path: Option<String>,
}
