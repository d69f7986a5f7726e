//! Marketplace service
//!
//! The single entry point for every CareConnect operation. Holds the store
//! behind a mutex, the booking rules, the payment gateway and the push sink.

mod booking;
mod earnings;
mod maintenance;
mod notifications;
mod ratings;
mod search;
mod users;

pub use earnings::EarningsSummary;
pub use maintenance::MaintenanceReport;
pub use search::{CaregiverCard, SearchQuery};

use std::sync::{Arc, Mutex, MutexGuard};

use crate::booking::SlotGrid;
use crate::notification::{NotificationSink, TracingSink};
use crate::payment::{OfflineGateway, PaymentGateway};
use crate::{Config, Error, Result, Store};

/// CareConnect business operations over a shared store
pub struct Marketplace {
    store: Arc<Mutex<Store>>,
    grid: SlotGrid,
    max_booking_hours: u8,
    platform_fee_percent: u8,
    gateway: Arc<dyn PaymentGateway>,
    sink: Arc<dyn NotificationSink>,
}

impl Marketplace {
    /// Build a marketplace over `store` using the booking and payment rules of `config`
    pub fn new(config: &Config, store: Store) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            grid: config.booking.grid()?,
            max_booking_hours: config.booking.max_booking_hours,
            platform_fee_percent: config.payments.platform_fee_percent,
            gateway: Arc::new(OfflineGateway),
            sink: Arc::new(TracingSink),
        })
    }

    /// Open the configured database file
    pub fn open(config: &Config) -> Result<Self> {
        let store = Store::new(&config.database.db_path)?;
        Self::new(config, store)
    }

    /// In-memory marketplace with default rules (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(&Config::default(), Store::in_memory()?)
    }

    /// Replace the payment gateway
    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    /// Replace the push notification sink
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn grid(&self) -> SlotGrid {
        self.grid
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| Error::Other("store lock poisoned".to_string()))
    }
}
