//! Payment gateway webhook handler.
//!
//! ```text
//! POST /api/v1/webhooks/payment
//! ```
//!
//! Translates gateway events into payment completion events and hands them to
//! the completion processor. Unrecognised event types are acknowledged with
//! 200 so the gateway stops redelivering them.

use actix_web::{post, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::completion::{
    CompletionOutcome, FailedPayment, PaymentCompletionEvent, SettledPayment,
};
use crate::inbound::http::checkout::DiscountBody;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    missing_field_error, parse_optional_uuid, parse_uuid, FieldName,
};
use crate::inbound::http::ApiResult;

const EVENT_SETTLED: &str = "payment_intent.succeeded";
const EVENT_FAILED: &str = "payment_intent.payment_failed";
const EVENT_CANCELED: &str = "payment_intent.canceled";

/// Charge metadata echoed back by the gateway.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMetadataBody {
    #[serde(default)]
    #[schema(format = "uuid")]
    pub staging_record_id: Option<String>,
    #[serde(default)]
    #[schema(format = "uuid")]
    pub user_id: Option<String>,
    #[serde(default)]
    #[schema(format = "uuid")]
    pub reservation_id: Option<String>,
}

/// Charge payload carried by a gateway event.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChargeBody {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub metadata: WebhookMetadataBody,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub bank_account_ref: Option<String>,
    #[serde(default)]
    pub payment_plan: bool,
    #[serde(default)]
    pub discount: Option<DiscountBody>,
}

/// Gateway webhook envelope.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct PaymentWebhookBody {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookChargeBody,
}

/// Webhook acknowledgement.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponseBody {
    pub received: bool,
    /// `completed` or `failureRecorded`; absent for unhandled event types.
    pub outcome: Option<String>,
    #[schema(format = "uuid")]
    pub staging_record_id: Option<String>,
}

fn parse_settled(charge: WebhookChargeBody) -> ApiResult<SettledPayment> {
    let user_id = charge
        .metadata
        .user_id
        .ok_or_else(|| missing_field_error(FieldName::new("data.metadata.userId")))?;
    Ok(SettledPayment {
        user_id: parse_uuid(user_id, FieldName::new("data.metadata.userId"))?,
        staging_record_id: parse_optional_uuid(
            charge.metadata.staging_record_id,
            FieldName::new("data.metadata.stagingRecordId"),
        )?,
        reservation_id: parse_optional_uuid(
            charge.metadata.reservation_id,
            FieldName::new("data.metadata.reservationId"),
        )?,
        charge_id: charge.id,
        amount_minor: charge.amount,
        discount: charge.discount.map(DiscountBody::into_domain).transpose()?,
        bank_account_ref: charge.bank_account_ref,
        payment_plan: charge.payment_plan,
        occurred_at: Utc::now(),
    })
}

fn parse_failed(charge: WebhookChargeBody) -> ApiResult<FailedPayment> {
    let user_id = charge
        .metadata
        .user_id
        .ok_or_else(|| missing_field_error(FieldName::new("data.metadata.userId")))?;
    Ok(FailedPayment {
        user_id: parse_uuid(user_id, FieldName::new("data.metadata.userId"))?,
        reservation_id: parse_optional_uuid(
            charge.metadata.reservation_id,
            FieldName::new("data.metadata.reservationId"),
        )?,
        charge_id: Some(charge.id),
        failure_reason: charge
            .failure_reason
            .unwrap_or_else(|| "payment declined".to_owned()),
        occurred_at: Utc::now(),
    })
}

/// Process a payment outcome reported by the gateway.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment",
    request_body = PaymentWebhookBody,
    responses(
        (status = 200, description = "Event processed or acknowledged", body = WebhookResponseBody),
        (status = 400, description = "Malformed event payload", body = crate::domain::Error),
        (status = 500, description = "Settled charge could not be matched to a staging record", body = crate::domain::Error),
        (status = 503, description = "Store unavailable; gateway should redeliver", body = crate::domain::Error)
    ),
    tags = ["webhooks"],
    operation_id = "paymentWebhook"
)]
#[post("/webhooks/payment")]
pub async fn payment_webhook(
    state: web::Data<HttpState>,
    payload: web::Json<PaymentWebhookBody>,
) -> ApiResult<web::Json<WebhookResponseBody>> {
    let payload = payload.into_inner();
    let event = match payload.event_type.as_str() {
        EVENT_SETTLED => PaymentCompletionEvent::Settled(parse_settled(payload.data)?),
        EVENT_FAILED | EVENT_CANCELED => {
            PaymentCompletionEvent::Failed(parse_failed(payload.data)?)
        }
        _ => {
            return Ok(web::Json(WebhookResponseBody {
                received: true,
                outcome: None,
                staging_record_id: None,
            }));
        }
    };

    let outcome = state.completion.process_payment_completion(event).await?;
    let (outcome, staging_record_id) = match outcome {
        CompletionOutcome::Completed { staging_record_id } => {
            ("completed", Some(staging_record_id.to_string()))
        }
        CompletionOutcome::FailureRecorded => ("failureRecorded", None),
    };
    Ok(web::Json(WebhookResponseBody {
        received: true,
        outcome: Some(outcome.to_owned()),
        staging_record_id,
    }))
}

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod tests;
