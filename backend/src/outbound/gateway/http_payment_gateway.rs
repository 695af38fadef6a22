//! Reqwest-backed payment gateway adapter.
//!
//! Owns transport details only: request serialisation, authentication, HTTP
//! error mapping, and JSON decoding into port types. The staging record id is
//! embedded into the charge's metadata at creation so a settled charge can be
//! bound back to its staging record without guesswork.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::domain::ports::{
    ChargeMetadata, ChargeStatus, CreatedCharge, PaymentGateway, PaymentGatewayError,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Connection settings for the gateway adapter.
#[derive(Debug, Clone)]
pub struct HttpPaymentGatewayConfig {
    /// Gateway API base URL, e.g. `https://api.stripe.com`.
    pub base_url: Url,
    /// Bearer secret key for server-side calls.
    pub secret_key: String,
    /// ISO currency code for created charges.
    pub currency: String,
    pub request_timeout: Duration,
}

impl HttpPaymentGatewayConfig {
    /// Create a configuration with the default timeout and GBP currency.
    pub fn new(base_url: Url, secret_key: impl Into<String>) -> Self {
        Self {
            base_url,
            secret_key: secret_key.into(),
            currency: "gbp".to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Gateway adapter performing HTTP requests against a payment-intent API.
pub struct HttpPaymentGateway {
    client: Client,
    config: HttpPaymentGatewayConfig,
}

impl HttpPaymentGateway {
    /// Build an adapter with its own reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: HttpPaymentGatewayConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentGatewayError> {
        self.config
            .base_url
            .join(path)
            .map_err(|err| PaymentGatewayError::rejected(format!("invalid endpoint: {err}")))
    }
}

#[derive(Debug, Deserialize)]
struct PaymentIntentDto {
    id: String,
    client_secret: Option<String>,
    status: String,
}

fn map_transport_error(error: reqwest::Error) -> PaymentGatewayError {
    PaymentGatewayError::unavailable(error.to_string())
}

fn map_status_error(status: StatusCode, body: &str) -> PaymentGatewayError {
    let detail = if body.is_empty() { "<empty body>" } else { body };
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        PaymentGatewayError::unavailable(format!("gateway returned {status}: {detail}"))
    } else {
        PaymentGatewayError::rejected(format!("gateway returned {status}: {detail}"))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_charge(
        &self,
        amount_minor: i64,
        metadata: &ChargeMetadata,
    ) -> Result<CreatedCharge, PaymentGatewayError> {
        let endpoint = self.endpoint("v1/payment_intents")?;
        let amount = amount_minor.to_string();
        let staging_record_id = metadata.staging_record_id.to_string();
        let user_id = metadata.user_id.to_string();
        let mut form: Vec<(&str, &str)> = vec![
            ("amount", &amount),
            ("currency", &self.config.currency),
            ("metadata[staging_record_id]", &staging_record_id),
            ("metadata[user_id]", &user_id),
        ];
        let reservation_id = metadata.reservation_id.map(|id| id.to_string());
        if let Some(reservation_id) = &reservation_id {
            form.push(("metadata[reservation_id]", reservation_id));
        }

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        let intent: PaymentIntentDto = serde_json::from_str(&body)
            .map_err(|err| PaymentGatewayError::rejected(format!("decode charge: {err}")))?;
        let client_secret = intent.client_secret.ok_or_else(|| {
            PaymentGatewayError::rejected("gateway response carries no client secret")
        })?;
        Ok(CreatedCharge {
            charge_id: intent.id,
            client_secret,
        })
    }

    async fn get_charge(&self, charge_id: &str) -> Result<ChargeStatus, PaymentGatewayError> {
        let endpoint = self.endpoint(&format!("v1/payment_intents/{charge_id}"))?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        let intent: PaymentIntentDto = serde_json::from_str(&body)
            .map_err(|err| PaymentGatewayError::rejected(format!("decode charge: {err}")))?;
        Ok(ChargeStatus::parse(&intent.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_server_errors_map_to_unavailable() {
        assert!(matches!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            PaymentGatewayError::Unavailable { .. }
        ));
        assert!(matches!(
            map_status_error(StatusCode::BAD_GATEWAY, ""),
            PaymentGatewayError::Unavailable { .. }
        ));
        assert!(matches!(
            map_status_error(StatusCode::PAYMENT_REQUIRED, "card declined"),
            PaymentGatewayError::Rejected { .. }
        ));
    }

    #[test]
    fn intent_dto_decodes_minimal_payload() {
        let intent: PaymentIntentDto = serde_json::from_str(
            r#"{ "id": "pi_1", "client_secret": "pi_1_secret", "status": "processing" }"#,
        )
        .expect("intent decodes");
        assert_eq!(intent.id, "pi_1");
        assert_eq!(ChargeStatus::parse(&intent.status), ChargeStatus::Processing);
    }
}
