use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GatewayError, GatewayInvoiceRequest, GatewayLineItem};
use crate::ports::PaymentGateway;

const INVOICES_PATH: &str = "/v2/invoices";

#[derive(Debug, Serialize)]
struct CreateInvoiceBody {
    external_id: String,
    amount: i64,
    customer: Customer,
    customer_notification_preference: NotificationPreference,
    items: Vec<GatewayLineItem>,
}

#[derive(Debug, Serialize)]
struct Customer {
    given_names: String,
    email: String,
}

#[derive(Debug, Serialize)]
struct NotificationPreference {
    invoice_created: Vec<&'static str>,
    invoice_paid: Vec<&'static str>,
}

impl From<&GatewayInvoiceRequest> for CreateInvoiceBody {
    fn from(request: &GatewayInvoiceRequest) -> Self {
        Self {
            external_id: request.external_id.clone(),
            amount: request.amount,
            customer: Customer {
                given_names: request.customer_name.clone(),
                email: request.customer_email.clone(),
            },
            customer_notification_preference: NotificationPreference {
                invoice_created: vec!["email"],
                invoice_paid: vec!["email"],
            },
            items: request.items.clone(),
        }
    }
}

/// Subset of the gateway's invoice resource we rely on.
#[derive(Debug, Deserialize)]
struct CreateInvoiceResponse {
    invoice_url: String,
}

/// HTTP client for the Xendit invoice API
#[derive(Clone)]
pub struct XenditClient {
    client: Client,
    base_url: String,
    secret_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl XenditClient {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(base_url: String, secret_key: String, timeout: Duration) -> Result<Self, GatewayError> {
        Self::with_circuit_breaker(base_url, secret_key, timeout, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        secret_key: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Ok(XenditClient {
            client,
            base_url,
            secret_key,
            circuit_breaker,
        })
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}

#[async_trait]
impl PaymentGateway for XenditClient {
    async fn create_invoice(&self, request: &GatewayInvoiceRequest) -> Result<String, GatewayError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), INVOICES_PATH);
        let client = self.client.clone();
        let secret_key = self.secret_key.clone();
        let body = CreateInvoiceBody::from(request);

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .basic_auth(secret_key, None::<&str>)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            GatewayError::Timeout
                        } else {
                            GatewayError::Request(e)
                        }
                    })?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }

                let created = response
                    .json::<CreateInvoiceResponse>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                Ok(created.invoice_url)
            })
            .await;

        match result {
            Ok(url) => Ok(url),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "payment gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> GatewayInvoiceRequest {
        GatewayInvoiceRequest {
            external_id: "24-05-01-AB12345".to_string(),
            amount: 50_000,
            customer_name: "Budi".to_string(),
            customer_email: "a@b.com".to_string(),
            items: vec![GatewayLineItem {
                name: "Pattern pack".to_string(),
                quantity: 1,
                price: 50_000,
            }],
        }
    }

    fn client(base_url: String) -> XenditClient {
        XenditClient::new(base_url, "xnd_test_key".to_string(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_create_invoice_returns_invoice_url() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/v2/invoices")
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::PartialJson(json!({
                "external_id": "24-05-01-AB12345",
                "amount": 50000,
                "customer": { "given_names": "Budi", "email": "a@b.com" },
                "customer_notification_preference": {
                    "invoice_created": ["email"],
                    "invoice_paid": ["email"]
                },
                "items": [{ "name": "Pattern pack", "quantity": 1, "price": 50000 }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"inv-1","status":"PENDING","invoice_url":"https://pay.example/xyz"}"#)
            .create_async()
            .await;

        let url = client(server.url()).create_invoice(&request()).await.unwrap();

        assert_eq!(url, "https://pay.example/xyz");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/v2/invoices")
            .with_status(400)
            .with_body(r#"{"error_code":"API_VALIDATION_ERROR"}"#)
            .create_async()
            .await;

        let result = client(server.url()).create_invoice(&request()).await;

        assert!(matches!(result, Err(GatewayError::Rejected { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_missing_invoice_url_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/v2/invoices")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"inv-1"}"#)
            .create_async()
            .await;

        let result = client(server.url()).create_invoice(&request()).await;

        assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/v2/invoices")
            .with_status(500)
            .expect_at_least(3)
            .create_async()
            .await;

        let client = XenditClient::with_circuit_breaker(
            server.url(),
            "xnd_test_key".to_string(),
            Duration::from_secs(5),
            3,
            60,
        )
        .unwrap();

        for _ in 0..3 {
            let _ = client.create_invoice(&request()).await;
        }

        assert_eq!(client.circuit_state(), "open");
        let result = client.create_invoice(&request()).await;
        assert!(matches!(result, Err(GatewayError::CircuitBreakerOpen(_))));
    }

    #[test]
    fn test_new_client_starts_closed() {
        let client = client("https://api.xendit.co".to_string());
        assert_eq!(client.circuit_state(), "closed");
    }
}
