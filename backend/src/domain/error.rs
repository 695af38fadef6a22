//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses; the mapping lives in `inbound::http::error`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// The requested resource does not exist.
    NotFound,
    /// The registration category is at capacity; the caller may join a waitlist.
    CapacityExceeded,
    /// The user already holds a live reservation or completed purchase for this category.
    DuplicateReservation,
    /// The payment gateway reports the charge as still in flight; the caller must wait.
    GatewayStatusAmbiguous,
    /// Accounting staging rows could not be created; the purchase must not proceed.
    StagingCreationFailed,
    /// A settled payment references a staging record that cannot be located.
    /// Requires operator review; heuristic matching is never attempted.
    StagingRecordNotFound,
    /// A downstream collaborator is temporarily unavailable.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

/// Domain error payload.
///
/// # Examples
/// ```
/// use rollcall::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("missing");
/// assert_eq!(err.code, ErrorCode::NotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Error {
    /// Stable machine-readable error code.
    #[schema(example = "capacity_exceeded")]
    pub code: ErrorCode,
    /// Human-readable error message.
    #[schema(example = "category is at capacity")]
    pub message: String,
    /// Supplementary structured details, e.g. `{ "shouldOfferWaitlist": true }`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Error {
    /// Create a new error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use rollcall::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::invalid_request("bad").with_details(json!({ "field": "userId" }));
    /// assert!(err.details.is_some());
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::CapacityExceeded`].
    ///
    /// Always carries `shouldOfferWaitlist: true` so clients can offer the
    /// waitlist join without inspecting the message.
    pub fn capacity_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CapacityExceeded, message)
            .with_details(json!({ "shouldOfferWaitlist": true }))
    }

    /// Convenience constructor for [`ErrorCode::DuplicateReservation`].
    pub fn duplicate_reservation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DuplicateReservation, message)
    }

    /// Convenience constructor for [`ErrorCode::GatewayStatusAmbiguous`].
    pub fn gateway_status_ambiguous(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GatewayStatusAmbiguous, message)
    }

    /// Convenience constructor for [`ErrorCode::StagingCreationFailed`].
    pub fn staging_creation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StagingCreationFailed, message)
    }

    /// Convenience constructor for [`ErrorCode::StagingRecordNotFound`].
    pub fn staging_record_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StagingRecordNotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}
