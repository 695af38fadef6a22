//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct generating the OpenAPI specification for the
//! REST API: reservation, checkout, webhook, sync, and health endpoints, plus
//! the schemas their payloads reference. The generated document is served at
//! `/api-docs/openapi.json` in debug builds.

use utoipa::OpenApi;

use crate::domain::sync_engine::{SyncCounts, SyncReport};
use crate::domain::{Error, ErrorCode};
use crate::inbound::http::checkout::{
    CheckoutRequestBody, CheckoutResponseBody, ContactBody, DiscountBody, PaymentPlanBody,
};
use crate::inbound::http::reservations::{ReservationBody, ReserveRequestBody};
use crate::inbound::http::webhooks::{
    PaymentWebhookBody, WebhookChargeBody, WebhookMetadataBody, WebhookResponseBody,
};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rollcall backend API",
        description = "Membership and event-registration purchases: capacity \
                       reservations, accounting staging, payment completion, \
                       and external-ledger synchronisation."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::reservations::reserve_slot,
        crate::inbound::http::reservations::release_slot,
        crate::inbound::http::checkout::checkout,
        crate::inbound::http::webhooks::payment_webhook,
        crate::inbound::http::sync::sync_ledger,
        crate::inbound::http::health::live,
        crate::inbound::http::health::ready,
    ),
    components(schemas(
        Error,
        ErrorCode,
        ReserveRequestBody,
        ReservationBody,
        CheckoutRequestBody,
        CheckoutResponseBody,
        ContactBody,
        DiscountBody,
        PaymentPlanBody,
        PaymentWebhookBody,
        WebhookChargeBody,
        WebhookMetadataBody,
        WebhookResponseBody,
        SyncReport,
        SyncCounts,
    )),
    tags(
        (name = "reservations", description = "Capacity holds for limited registration categories"),
        (name = "checkout", description = "Purchase staging and charge creation"),
        (name = "webhooks", description = "Gateway payment outcome delivery"),
        (name = "sync", description = "External ledger synchronisation"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_endpoint() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/v1/reservations",
            "/api/v1/reservations/{id}",
            "/api/v1/checkout",
            "/api/v1/webhooks/payment",
            "/api/v1/sync/ledger",
            "/healthz",
            "/health/ready",
        ] {
            assert!(
                paths.iter().any(|path| path.as_str() == expected),
                "missing path {expected}"
            );
        }
    }
}
