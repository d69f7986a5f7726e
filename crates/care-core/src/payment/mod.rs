//! Payment gateway abstraction

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// Customer registration at the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRequest {
    /// Our user id, sent as the gateway's external reference
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A charge against an existing gateway customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub customer_id: String,
    /// Hire request id
    pub request_id: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub description: String,
}

/// Gateway acknowledgement of a charge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeReceipt {
    pub reference: String,
    pub status: String,
}

/// A payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Register a customer, returning the provider's customer id
    async fn create_customer(&self, request: &CustomerRequest) -> Result<String>;

    /// Charge a customer
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt>;
}

/// Gateway that accepts every charge without moving money
#[derive(Debug, Default, Clone)]
pub struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    fn name(&self) -> &str {
        "offline"
    }

    async fn create_customer(&self, request: &CustomerRequest) -> Result<String> {
        debug!("Offline customer for user {}", request.user_id);
        Ok(format!("cus_offline_{}", request.user_id))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt> {
        debug!(
            "Offline charge of {} cents for request {}",
            request.amount_cents, request.request_id
        );
        Ok(ChargeReceipt {
            reference: format!("pay_offline_{}", uuid::Uuid::new_v4().simple()),
            status: "CONFIRMED".to_string(),
        })
    }
}
