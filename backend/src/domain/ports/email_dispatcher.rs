//! Port abstraction for staging transactional emails.
//!
//! Staging is fire-and-forget from the reconciliation core's perspective:
//! delivery and retry belong to the dispatcher. Payment-completion latency is
//! never coupled to email-provider latency.

use async_trait::async_trait;

use crate::domain::completion::{FailedPayment, SettledPayment, ZeroValuePurchase};

/// Errors raised by email dispatcher adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmailDispatchError {
    /// The outbox or provider could not accept the message.
    #[error("email staging failed: {message}")]
    Staging { message: String },
}

impl EmailDispatchError {
    /// Create a staging error with the given message.
    pub fn staging(message: impl Into<String>) -> Self {
        Self::Staging {
            message: message.into(),
        }
    }
}

/// Confirmation email payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationEmail {
    Settled(SettledPayment),
    ZeroValue(ZeroValuePurchase),
}

/// Port for staging payment emails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    /// Queue a purchase confirmation for batch dispatch.
    async fn stage_confirmation_email(
        &self,
        email: &ConfirmationEmail,
    ) -> Result<(), EmailDispatchError>;

    /// Queue a failed-payment notification for batch dispatch.
    async fn stage_failed_payment_email(
        &self,
        failure: &FailedPayment,
    ) -> Result<(), EmailDispatchError>;
}
