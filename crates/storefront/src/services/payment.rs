//! Payment gateway adapter.
//!
//! The storefront hands an order reference, amount and customer to the
//! gateway and gets back an opaque client token for the browser's payment
//! popup. [`MidtransGateway`] talks to Midtrans Snap over HTTPS.

use std::future::Future;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use loka_core::order::Customer;
use loka_core::{Money, OrderNumber};

use crate::config::PaymentConfig;

const SNAP_PRODUCTION_URL: &str = "https://app.midtrans.com/snap/v1/transactions";
const SNAP_SANDBOX_URL: &str = "https://app.sandbox.midtrans.com/snap/v1/transactions";

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// No response within the configured timeout.
    #[error("payment gateway timed out")]
    Timeout,

    /// The gateway refused the transaction.
    #[error("payment gateway rejected request: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// What the gateway needs to open a payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_number: OrderNumber,
    pub amount: Money,
    pub customer: Customer,
}

/// An opened payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Token the browser passes to the payment popup.
    pub token: String,
    /// Hosted payment page, when the gateway offers one.
    pub redirect_url: Option<String>,
}

/// External payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Open a payment session for an order that does not exist yet.
    fn create_payment_session(
        &self,
        request: &PaymentRequest,
    ) -> impl Future<Output = Result<PaymentSession, GatewayError>> + Send;
}

#[derive(Debug, Serialize)]
struct SnapTransaction<'a> {
    transaction_details: TransactionDetails<'a>,
    customer_details: CustomerDetails<'a>,
}

#[derive(Debug, Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct CustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: Option<String>,
}

impl<'a> From<&'a PaymentRequest> for SnapTransaction<'a> {
    fn from(request: &'a PaymentRequest) -> Self {
        Self {
            transaction_details: TransactionDetails {
                order_id: request.order_number.as_str(),
                gross_amount: request.amount.whole_units(),
            },
            customer_details: CustomerDetails {
                first_name: &request.customer.name,
                email: request.customer.email.as_str(),
            },
        }
    }
}

/// Midtrans Snap client.
#[derive(Clone)]
pub struct MidtransGateway {
    client: reqwest::Client,
    endpoint: String,
    server_key: secrecy::SecretString,
}

impl std::fmt::Debug for MidtransGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransGateway")
            .field("endpoint", &self.endpoint)
            .field("server_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl MidtransGateway {
    /// Create a client for the sandbox or production endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, GatewayError> {
        let endpoint = if config.is_production {
            SNAP_PRODUCTION_URL
        } else {
            SNAP_SANDBOX_URL
        };
        Self::with_endpoint(config, endpoint)
    }

    /// Create a client against an explicit endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_endpoint(config: &PaymentConfig, endpoint: &str) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
            server_key: config.server_key.clone(),
        })
    }
}

impl PaymentGateway for MidtransGateway {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_number))]
    async fn create_payment_session(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let body = SnapTransaction::from(request);

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(self.server_key.expose_secret(), None::<&str>)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let snap: SnapResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        tracing::info!("Payment session created");
        Ok(PaymentSession {
            token: snap.token,
            redirect_url: snap.redirect_url,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loka_core::Email;

    use super::*;

    #[test]
    fn test_snap_body_uses_whole_rupiah() {
        let request = PaymentRequest {
            order_number: OrderNumber::generate(),
            amount: Money::from_major(290_000),
            customer: Customer {
                email: Email::parse("putu@loka.co").unwrap(),
                name: "Putu".to_owned(),
            },
        };
        let json = serde_json::to_value(SnapTransaction::from(&request)).unwrap();
        assert_eq!(json["transaction_details"]["gross_amount"], 290_000);
        assert_eq!(
            json["transaction_details"]["order_id"],
            request.order_number.as_str()
        );
        assert_eq!(json["customer_details"]["first_name"], "Putu");
        assert_eq!(json["customer_details"]["email"], "putu@loka.co");
    }

    #[test]
    fn test_snap_response_without_redirect() {
        let parsed: SnapResponse = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(parsed.token, "abc");
        assert!(parsed.redirect_url.is_none());
    }
}
