//! Port abstraction for the external payment gateway.
//!
//! The gateway owns checkout and card handling; this core only creates
//! charges (embedding the staging record id in the charge's metadata) and
//! re-reads charge status when local reservation state may have desynced.

use async_trait::async_trait;
use uuid::Uuid;

/// Errors raised by payment gateway adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentGatewayError {
    /// The gateway could not be reached.
    #[error("payment gateway unavailable: {message}")]
    Unavailable { message: String },
    /// The gateway rejected the request.
    #[error("payment gateway rejected the request: {message}")]
    Rejected { message: String },
}

impl PaymentGatewayError {
    /// Create an unavailable error with the given message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a rejected error with the given message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Gateway-reported charge status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    Failed,
    Canceled,
    /// A status this core does not recognise; treated as still in flight.
    Unknown(String),
}

impl ChargeStatus {
    /// Whether the gateway will make no further transition for this charge
    /// and the payment did not settle.
    pub fn is_decisively_failed(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Canceled | Self::RequiresPaymentMethod
        )
    }

    /// Parse a gateway status string.
    pub fn parse(value: &str) -> Self {
        match value {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

/// Metadata embedded in every charge at creation time.
///
/// `staging_record_id` is the only trusted key used later to relocate the
/// staging record; charges without it cannot be reconciled automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeMetadata {
    pub staging_record_id: Uuid,
    pub user_id: Uuid,
    pub reservation_id: Option<Uuid>,
}

/// A charge created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCharge {
    pub charge_id: String,
    /// Secret the payment form needs to confirm the charge client-side.
    pub client_secret: String,
}

/// Port for gateway charge operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge for `amount_minor`, embedding `metadata`.
    async fn create_charge(
        &self,
        amount_minor: i64,
        metadata: &ChargeMetadata,
    ) -> Result<CreatedCharge, PaymentGatewayError>;

    /// Read the authoritative status of an existing charge.
    async fn get_charge(&self, charge_id: &str) -> Result<ChargeStatus, PaymentGatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisive_failures_allow_reservation_retry() {
        assert!(ChargeStatus::Failed.is_decisively_failed());
        assert!(ChargeStatus::Canceled.is_decisively_failed());
        assert!(ChargeStatus::RequiresPaymentMethod.is_decisively_failed());
        assert!(!ChargeStatus::Succeeded.is_decisively_failed());
        assert!(!ChargeStatus::Processing.is_decisively_failed());
        assert!(!ChargeStatus::Unknown("requires_capture".to_owned()).is_decisively_failed());
    }

    #[test]
    fn parses_gateway_vocabulary() {
        assert_eq!(ChargeStatus::parse("succeeded"), ChargeStatus::Succeeded);
        assert_eq!(
            ChargeStatus::parse("requires_capture"),
            ChargeStatus::Unknown("requires_capture".to_owned())
        );
    }
}
