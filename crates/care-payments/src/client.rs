//! Asaas REST client

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};

use care_core::{ChargeReceipt, ChargeRequest, CustomerRequest, PaymentGateway};

use crate::error::{PaymentError, Result};
use crate::models::{
    cents_to_value, value_to_cents, AsaasConfig, CustomerBody, CustomerResponse, ErrorResponse,
    PaymentBody, PaymentResponse, BILLING_TYPE,
};

/// Asaas v3 API client
pub struct AsaasClient {
    client: Client,
    config: AsaasConfig,
    base_url: String,
}

impl AsaasClient {
    pub fn new(config: AsaasConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PaymentError::Configuration("Asaas API key is empty".to_string()));
        }

        let client = Client::builder()
            .user_agent(concat!("careconnect/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Configuration(e.to_string()))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!("Asaas client initialized for: {}", base_url);

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Register a customer, returning its Asaas id (`cus_...`)
    pub async fn create_customer(&self, request: &CustomerRequest) -> Result<String> {
        let body = CustomerBody {
            name: &request.name,
            email: &request.email,
            mobile_phone: request.phone.as_deref(),
            external_reference: &request.user_id,
        };
        let customer: CustomerResponse = self.post("customers", &body).await?;
        info!(user = %request.user_id, "Created Asaas customer {}", customer.id);
        Ok(customer.id)
    }

    /// Create a charge for an existing customer
    pub async fn create_payment(&self, request: &ChargeRequest) -> Result<PaymentResponse> {
        let body = PaymentBody {
            customer: &request.customer_id,
            billing_type: BILLING_TYPE,
            value: cents_to_value(request.amount_cents)?,
            due_date: request.due_date,
            description: &request.description,
            external_reference: &request.request_id,
        };
        let payment: PaymentResponse = self.post("payments", &body).await?;

        if let Some(value) = payment.value {
            if value_to_cents(value) != request.amount_cents {
                error!(
                    "Asaas charged {} for a {} cent request {}",
                    value, request.amount_cents, request.request_id
                );
                return Err(PaymentError::InvalidResponse(format!(
                    "charged value {} does not match {} cents",
                    value, request.amount_cents
                )));
            }
        }

        info!(
            request = %request.request_id,
            "Created Asaas payment {} ({})",
            payment.id,
            payment.status
        );
        Ok(payment)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("access_token", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Connection(e.to_string()))?;

        Self::read(response).await
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| PaymentError::InvalidResponse(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        error!("Asaas request failed: {} - {}", status, text);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(PaymentError::Authentication(status.to_string()))
            }
            s if s.is_client_error() => {
                let detail = serde_json::from_str::<ErrorResponse>(&text)
                    .map(|e| e.summary())
                    .unwrap_or(text);
                Err(PaymentError::Rejected(detail))
            }
            _ => Err(PaymentError::Connection(format!("{} - {}", status, text))),
        }
    }
}

#[async_trait]
impl PaymentGateway for AsaasClient {
    fn name(&self) -> &str {
        "asaas"
    }

    async fn create_customer(&self, request: &CustomerRequest) -> care_core::Result<String> {
        Ok(AsaasClient::create_customer(self, request).await?)
    }

    async fn create_charge(&self, request: &ChargeRequest) -> care_core::Result<ChargeReceipt> {
        let payment = self.create_payment(request).await?;
        Ok(ChargeReceipt {
            reference: payment.id,
            status: payment.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    type Reply = std::result::Result<Json<Value>, (axum::http::StatusCode, Json<Value>)>;

    fn check_token(headers: &HeaderMap) -> std::result::Result<(), (axum::http::StatusCode, Json<Value>)> {
        if headers.get("access_token").and_then(|v| v.to_str().ok()) == Some("test-token") {
            Ok(())
        } else {
            Err((axum::http::StatusCode::UNAUTHORIZED, Json(json!({}))))
        }
    }

    async fn customers(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
        check_token(&headers)?;
        Ok(Json(json!({
            "id": format!("cus_{}", body["externalReference"].as_str().unwrap_or_default()),
            "name": body["name"],
        })))
    }

    async fn payments(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
        check_token(&headers)?;
        if body["value"].as_f64().unwrap_or_default() > 1000.0 {
            return Err((
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({"errors": [{"code": "invalid_value", "description": "limit exceeded"}]})),
            ));
        }
        Ok(Json(json!({
            "id": "pay_123",
            "status": "PENDING",
            "value": body["value"],
            "invoiceUrl": "https://sandbox.asaas.com/i/123",
        })))
    }

    /// Serve a fake Asaas API on a random local port
    async fn mock_asaas() -> String {
        let app = Router::new()
            .route("/customers", post(customers))
            .route("/payments", post(payments));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String, token: &str) -> AsaasClient {
        AsaasClient::new(AsaasConfig {
            api_key: token.to_string(),
            base_url,
        })
        .unwrap()
    }

    fn charge(amount_cents: i64) -> ChargeRequest {
        ChargeRequest {
            customer_id: "cus_u1".to_string(),
            request_id: "req-1".to_string(),
            amount_cents,
            due_date: NaiveDate::from_ymd_opt(2030, 5, 13).unwrap(),
            description: "Care appointment".to_string(),
        }
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            AsaasClient::new(AsaasConfig::sandbox("  ")),
            Err(PaymentError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_customer_and_charge() {
        let gateway = client(mock_asaas().await, "test-token");

        let customer = PaymentGateway::create_customer(
            &gateway,
            &CustomerRequest {
                user_id: "u1".to_string(),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                phone: Some("+5511999990000".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(customer, "cus_u1");

        let receipt = gateway.create_charge(&charge(15_000)).await.unwrap();
        assert_eq!(
            receipt,
            ChargeReceipt {
                reference: "pay_123".to_string(),
                status: "PENDING".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_gateway_errors() {
        let base = mock_asaas().await;

        let rejected = client(base.clone(), "test-token")
            .create_payment(&charge(500_000))
            .await
            .unwrap_err();
        assert!(matches!(&rejected, PaymentError::Rejected(msg) if msg.contains("invalid_value")));

        let unauthorized = client(base, "wrong").create_payment(&charge(100)).await.unwrap_err();
        assert!(matches!(unauthorized, PaymentError::Authentication(_)));

        let as_core: care_core::Error = rejected.into();
        assert!(matches!(as_core, care_core::Error::Payment(_)));
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        let gateway = client("http://127.0.0.1:9".to_string(), "test-token");
        let err = gateway.create_charge(&charge(100)).await.unwrap_err();
        assert!(matches!(err, care_core::Error::Payment(_)));
    }
}
