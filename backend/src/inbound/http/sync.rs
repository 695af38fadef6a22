//! Ledger sync trigger.
//!
//! ```text
//! POST /api/v1/sync/ledger
//! ```
//!
//! Operator or scheduler entry point. Concurrent triggers join the in-flight
//! run and receive the same report.

use actix_web::{post, web};

use crate::domain::SyncReport;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;

/// Push all pending staged invoices and payments to the external ledger.
#[utoipa::path(
    post,
    path = "/api/v1/sync/ledger",
    responses(
        (status = 200, description = "Sync pass finished", body = SyncReport)
    ),
    tags = ["sync"],
    operation_id = "syncLedger"
)]
#[post("/sync/ledger")]
pub async fn sync_ledger(state: web::Data<HttpState>) -> ApiResult<web::Json<SyncReport>> {
    let report = state.sync.run_sync().await;
    Ok(web::Json(report))
}
