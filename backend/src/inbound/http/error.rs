//! HTTP adapter mapping for domain errors.
//!
//! Purpose: keep the domain error type HTTP-agnostic while allowing Actix
//! handlers to turn domain failures into consistent JSON responses and status
//! codes.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use tracing::error;

use crate::domain::{Error, ErrorCode};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::CapacityExceeded
        | ErrorCode::DuplicateReservation
        | ErrorCode::GatewayStatusAmbiguous => StatusCode::CONFLICT,
        ErrorCode::StagingCreationFailed
        | ErrorCode::StagingRecordNotFound
        | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn redact_if_internal(error: &Error) -> Error {
    if matches!(error.code, ErrorCode::InternalError) {
        Error::internal("Internal server error")
    } else {
        error.clone()
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code)
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            error!(code = ?self.code, message = %self.message, "request failed");
        }
        HttpResponse::build(self.status_code()).json(redact_if_internal(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Do not leak implementation details to clients.
        error!(error = %err, "actix error promoted to domain error");
        Error::internal("Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;
    use rstest::rstest;
    use serde_json::Value;

    use super::*;

    #[rstest]
    #[case(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
    #[case(Error::not_found("missing"), StatusCode::NOT_FOUND)]
    #[case(Error::capacity_exceeded("full"), StatusCode::CONFLICT)]
    #[case(Error::duplicate_reservation("dup"), StatusCode::CONFLICT)]
    #[case(Error::gateway_status_ambiguous("wait"), StatusCode::CONFLICT)]
    #[case(
        Error::staging_creation_failed("no rows"),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    #[case(
        Error::staging_record_not_found("no match"),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    #[case(Error::service_unavailable("down"), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_error_codes_to_statuses(#[case] error: Error, #[case] expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
    }

    #[actix_web::test]
    async fn internal_error_message_is_redacted() {
        let response = Error::internal("connection string leaked").error_response();
        let body = to_bytes(response.into_body()).await.expect("body");
        let value: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(value["message"], "Internal server error");
        assert_eq!(value["code"], "internal_error");
    }

    #[actix_web::test]
    async fn capacity_error_keeps_waitlist_details() {
        let response = Error::capacity_exceeded("Early bird is at capacity").error_response();
        let body = to_bytes(response.into_body()).await.expect("body");
        let value: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(value["details"]["shouldOfferWaitlist"], true);
        assert_eq!(value["message"], "Early bird is at capacity");
    }
}
