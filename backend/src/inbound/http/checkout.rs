//! Checkout HTTP handler.
//!
//! ```text
//! POST /api/v1/checkout
//! ```
//!
//! Stages the purchase in the accounting tables before any charge exists,
//! then creates the gateway charge with the staging record id embedded in its
//! metadata. Zero-value purchases never touch the gateway; they complete
//! inline through the completion processor.

use actix_web::{post, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::completion::{CompletionOutcome, PaymentCompletionEvent, ZeroValuePurchase};
use crate::domain::ports::{ChargeMetadata, PaymentGatewayError};
use crate::domain::purchase::{
    ContactDetails, DiscountApplication, ProductSelection, PurchaseStagingRequest, StagingOptions,
};
use crate::domain::Error;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{parse_uuid, FieldName};
use crate::inbound::http::ApiResult;

/// Discount applied to the purchase.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountBody {
    pub code: String,
    pub amount_saved_minor: i64,
    #[schema(format = "uuid")]
    pub registration_id: String,
}

impl DiscountBody {
    pub(crate) fn into_domain(self) -> Result<DiscountApplication, Error> {
        Ok(DiscountApplication {
            registration_id: parse_uuid(
                self.registration_id,
                FieldName::new("discount.registrationId"),
            )?,
            code: self.code,
            amount_saved_minor: self.amount_saved_minor,
        })
    }
}

/// Contact details captured for later ledger-contact creation.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactBody {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Instalment settings for payment-plan purchases.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPlanBody {
    pub installments: u32,
}

/// Request payload for checkout.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequestBody {
    #[schema(format = "uuid")]
    pub user_id: String,
    /// Product selection, tagged by `kind` (`membership` or `registration`).
    #[schema(value_type = Object)]
    pub product: ProductSelection,
    pub contact: ContactBody,
    pub total_minor: i64,
    #[serde(default)]
    pub discount: Option<DiscountBody>,
    #[serde(default)]
    pub payment_plan: Option<PaymentPlanBody>,
}

/// Response payload for checkout.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponseBody {
    #[schema(format = "uuid")]
    pub staging_record_id: String,
    /// Set when a gateway charge was created and the client must confirm it.
    pub client_secret: Option<String>,
    pub charge_id: Option<String>,
    /// True for zero-value purchases, which complete without a charge.
    pub completed: bool,
}

fn map_gateway_error(error: PaymentGatewayError) -> Error {
    match error {
        PaymentGatewayError::Unavailable { message } => Error::service_unavailable(message),
        PaymentGatewayError::Rejected { message } => Error::invalid_request(message),
    }
}

/// Begin a purchase: stage accounting rows and create the gateway charge.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequestBody,
    responses(
        (status = 200, description = "Charge created or purchase completed", body = CheckoutResponseBody),
        (status = 400, description = "Invalid request or charge rejected", body = Error),
        (status = 500, description = "Staging rows could not be created", body = Error),
        (status = 503, description = "Gateway or store unavailable", body = Error)
    ),
    tags = ["checkout"],
    operation_id = "checkout"
)]
#[post("/checkout")]
pub async fn checkout(
    state: web::Data<HttpState>,
    payload: web::Json<CheckoutRequestBody>,
) -> ApiResult<web::Json<CheckoutResponseBody>> {
    let payload = payload.into_inner();
    let user_id = parse_uuid(payload.user_id, FieldName::new("userId"))?;
    let discount = payload
        .discount
        .map(DiscountBody::into_domain)
        .transpose()?;
    let request = PurchaseStagingRequest {
        user_id,
        product: payload.product,
        contact: ContactDetails {
            name: payload.contact.name,
            email: payload.contact.email,
        },
        total_minor: payload.total_minor,
        discount,
    };

    if request.net_minor() == 0 {
        return complete_zero_value(&state, request).await;
    }

    let options = StagingOptions {
        is_free: false,
        is_payment_plan: payload.payment_plan.is_some(),
        installments: payload.payment_plan.map_or(0, |plan| plan.installments),
    };
    let invoice = state
        .staging
        .create_immediate_staging(&request, options)
        .await
        .ok_or_else(|| {
            Error::staging_creation_failed(
                "accounting staging rows could not be created; the purchase was aborted",
            )
        })?;

    let metadata = ChargeMetadata {
        staging_record_id: invoice.id,
        user_id,
        reservation_id: request.product.reservation_id(),
    };
    // The invoice's net, not the request's: for payment plans only the
    // first instalment is collected now.
    let charge = state
        .gateway
        .create_charge(invoice.net_minor, &metadata)
        .await
        .map_err(map_gateway_error)?;

    if let Some(reservation_id) = request.product.reservation_id() {
        state
            .reservations
            .mark_processing(reservation_id, &charge.charge_id)
            .await?;
    }

    Ok(web::Json(CheckoutResponseBody {
        staging_record_id: invoice.id.to_string(),
        client_secret: Some(charge.client_secret),
        charge_id: Some(charge.charge_id),
        completed: false,
    }))
}

async fn complete_zero_value(
    state: &HttpState,
    request: PurchaseStagingRequest,
) -> ApiResult<web::Json<CheckoutResponseBody>> {
    let reservation_id = request.product.reservation_id();
    let outcome = state
        .completion
        .process_payment_completion(PaymentCompletionEvent::ZeroValue(ZeroValuePurchase {
            staging_record_id: None,
            staging_request: request,
            reservation_id,
            occurred_at: Utc::now(),
        }))
        .await?;
    let CompletionOutcome::Completed { staging_record_id } = outcome else {
        return Err(Error::internal(
            "zero-value completion reported an unexpected outcome",
        ));
    };
    Ok(web::Json(CheckoutResponseBody {
        staging_record_id: staging_record_id.to_string(),
        client_secret: None,
        charge_id: None,
        completed: true,
    }))
}

#[cfg(test)]
#[path = "checkout_tests.rs"]
mod tests;
