//! Asaas configuration and wire types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use care_core::PaymentConfig;

use crate::error::{PaymentError, Result};

/// Asaas sandbox API root
pub const SANDBOX_URL: &str = "https://sandbox.asaas.com/api/v3";

/// Asaas connection settings
#[derive(Debug, Clone)]
pub struct AsaasConfig {
    /// Sent in the `access_token` header
    pub api_key: String,
    pub base_url: String,
}

impl AsaasConfig {
    pub fn sandbox(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: SANDBOX_URL.to_string(),
        }
    }

    /// Build from the `[payments]` section
    pub fn from_payment_config(config: &PaymentConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PaymentError::Configuration("ASAAS_API_KEY is not set".to_string()))?;
        Ok(Self {
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| SANDBOX_URL.to_string()),
        })
    }
}

/// Convert integer cents to the decimal amount Asaas expects
pub fn cents_to_value(cents: i64) -> Result<f64> {
    if cents <= 0 {
        return Err(PaymentError::InvalidAmount(cents));
    }
    Ok(cents as f64 / 100.0)
}

/// Convert an Asaas decimal amount back to cents
pub fn value_to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerBody<'a> {
    pub name: &'a str,
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<&'a str>,
    pub external_reference: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CustomerResponse {
    pub id: String,
}

/// Let the client pick pix, boleto or card on the invoice page
pub const BILLING_TYPE: &str = "UNDEFINED";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody<'a> {
    pub customer: &'a str,
    pub billing_type: &'a str,
    pub value: f64,
    #[serde(with = "asaas_date")]
    pub due_date: NaiveDate,
    pub description: &'a str,
    pub external_reference: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub invoice_url: Option<String>,
}

/// Error envelope returned with 4xx responses
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl ErrorResponse {
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.description))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

mod asaas_date {
    use chrono::NaiveDate;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }
}
