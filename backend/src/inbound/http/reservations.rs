//! Reservation HTTP handlers.
//!
//! ```text
//! POST   /api/v1/reservations       Reserve a slot, or renew an existing hold
//! DELETE /api/v1/reservations/{id}  Release a hold, freeing capacity
//! ```

use actix_web::{delete, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::reservation::Reservation;
use crate::domain::Error;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{parse_uuid, FieldName};
use crate::inbound::http::ApiResult;

/// Request payload for reserving or renewing a hold.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequestBody {
    #[schema(format = "uuid")]
    pub user_id: String,
    #[schema(format = "uuid")]
    pub category_id: String,
    /// When set, renews this existing hold instead of creating a new one.
    #[serde(default)]
    #[schema(format = "uuid")]
    pub reservation_id: Option<String>,
}

/// Response payload describing the held slot.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationBody {
    #[schema(format = "uuid")]
    pub id: String,
    pub status: String,
    #[schema(format = "date-time")]
    pub expires_at: String,
}

impl From<Reservation> for ReservationBody {
    fn from(value: Reservation) -> Self {
        Self {
            id: value.id.to_string(),
            status: value.status.as_str().to_owned(),
            expires_at: value.expires_at.to_rfc3339(),
        }
    }
}

/// Reserve one slot in a capacity-limited registration category.
#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    request_body = ReserveRequestBody,
    responses(
        (status = 200, description = "Slot held", body = ReservationBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Category or reservation not found", body = Error),
        (status = 409, description = "Capacity exceeded, duplicate, or payment in flight", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["reservations"],
    operation_id = "reserveSlot"
)]
#[post("/reservations")]
pub async fn reserve_slot(
    state: web::Data<HttpState>,
    payload: web::Json<ReserveRequestBody>,
) -> ApiResult<web::Json<ReservationBody>> {
    let payload = payload.into_inner();
    let reservation = if let Some(reservation_id) = payload.reservation_id {
        let reservation_id = parse_uuid(reservation_id, FieldName::new("reservationId"))?;
        state.reservations.renew(reservation_id).await?
    } else {
        let user_id = parse_uuid(payload.user_id, FieldName::new("userId"))?;
        let category_id = parse_uuid(payload.category_id, FieldName::new("categoryId"))?;
        state.reservations.reserve(user_id, category_id).await?
    };
    Ok(web::Json(ReservationBody::from(reservation)))
}

/// Release a hold before it settles, freeing the slot immediately.
#[utoipa::path(
    delete,
    path = "/api/v1/reservations/{id}",
    params(("id" = uuid::Uuid, Path, description = "Reservation identifier")),
    responses(
        (status = 204, description = "Hold released"),
        (status = 400, description = "Reservation is already settled", body = Error),
        (status = 404, description = "Reservation not found", body = Error),
        (status = 503, description = "Service unavailable", body = Error)
    ),
    tags = ["reservations"],
    operation_id = "releaseSlot"
)]
#[delete("/reservations/{id}")]
pub async fn release_slot(
    state: web::Data<HttpState>,
    path: web::Path<uuid::Uuid>,
) -> ApiResult<HttpResponse> {
    state.reservations.release(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
#[path = "reservations_tests.rs"]
mod tests;
