//! care-payments: Asaas payment gateway for CareConnect
//!
//! Implements [`care_core::PaymentGateway`] over the Asaas v3 REST API.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use care_payments::{AsaasClient, AsaasConfig};
//!
//! let client = AsaasClient::new(AsaasConfig::sandbox("$aact_..."))?;
//! let marketplace = Marketplace::open(&config)?.with_gateway(Arc::new(client));
//! ```

pub mod client;
pub mod error;
pub mod models;

pub use client::AsaasClient;
pub use error::{PaymentError, Result};
pub use models::{AsaasConfig, SANDBOX_URL};
