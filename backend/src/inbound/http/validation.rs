//! Shared validation helpers for inbound HTTP adapters.

use serde_json::json;
use uuid::Uuid;

use crate::domain::Error;

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    InvalidUuid,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidUuid => "invalid_uuid",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(&self) -> &str {
        self.0
    }
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let field = field.as_str();
    Error::invalid_request(format!("missing required field: {field}")).with_details(json!({
        "field": field,
        "code": ErrorCode::MissingField.as_str(),
    }))
}

pub(crate) fn invalid_uuid_error(field: FieldName, value: &str) -> Error {
    let field_name = field.as_str();
    Error::invalid_request(format!("{field_name} must be a valid UUID")).with_details(json!({
        "field": field_name,
        "value": value,
        "code": ErrorCode::InvalidUuid.as_str(),
    }))
}

pub(crate) fn parse_uuid(value: String, field: FieldName) -> Result<Uuid, Error> {
    Uuid::parse_str(&value).map_err(|_| invalid_uuid_error(field, &value))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    field: FieldName,
) -> Result<Option<Uuid>, Error> {
    value.map(|raw| parse_uuid(raw, field)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_uuid_carries_field_details() {
        let error = parse_uuid("not-a-uuid".to_owned(), FieldName::new("userId"))
            .expect_err("parse fails");
        let details = error.details.expect("details present");
        assert_eq!(details["field"], "userId");
        assert_eq!(details["code"], "invalid_uuid");
        assert_eq!(details["value"], "not-a-uuid");
    }

    #[test]
    fn optional_uuid_passes_through_none() {
        let parsed = parse_optional_uuid(None, FieldName::new("reservationId"))
            .expect("no value validates");
        assert!(parsed.is_none());
    }
}
