//! Transactional email outbox backed by PostgreSQL.
//!
//! Implements the email dispatcher port by writing rows to `email_outbox`; a
//! separate dispatch worker drains the table. Staging an email is therefore a
//! single insert and shares the completion path's availability rather than an
//! email provider's.

use async_trait::async_trait;
use chrono::Utc;
use diesel_async::RunQueryDsl;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::completion::{FailedPayment, SettledPayment, ZeroValuePurchase};
use crate::domain::ports::{ConfirmationEmail, EmailDispatchError, EmailDispatcher};

use super::models::NewEmailOutboxRow;
use super::pool::DbPool;
use super::schema::email_outbox;

/// Diesel-backed implementation of the email dispatcher port.
#[derive(Clone)]
pub struct DieselEmailOutbox {
    pool: DbPool,
}

impl DieselEmailOutbox {
    /// Create a new outbox with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn stage(
        &self,
        recipient_user_id: Uuid,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<(), EmailDispatchError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| EmailDispatchError::staging(err.to_string()))?;
        let row = NewEmailOutboxRow {
            id: Uuid::new_v4(),
            recipient_user_id,
            kind,
            payload: &payload,
            created_at: Utc::now(),
        };
        diesel::insert_into(email_outbox::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| EmailDispatchError::staging(err.to_string()))
    }
}

/// Template payload for a settled-purchase confirmation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmationPayload {
    charge_id: Option<String>,
    amount_minor: i64,
    payment_plan: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ConfirmationPayload {
    fn settled(settled: &SettledPayment) -> Self {
        Self {
            charge_id: Some(settled.charge_id.clone()),
            amount_minor: settled.amount_minor,
            payment_plan: settled.payment_plan,
            description: None,
        }
    }

    fn zero_value(purchase: &ZeroValuePurchase) -> Self {
        Self {
            charge_id: None,
            amount_minor: 0,
            payment_plan: false,
            description: Some(purchase.staging_request.product.description()),
        }
    }
}

/// Template payload for a failed-payment notice.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailurePayload<'a> {
    charge_id: Option<&'a str>,
    failure_reason: &'a str,
}

fn encode<T: Serialize>(payload: &T) -> Result<serde_json::Value, EmailDispatchError> {
    serde_json::to_value(payload)
        .map_err(|err| EmailDispatchError::staging(format!("encode payload: {err}")))
}

#[async_trait]
impl EmailDispatcher for DieselEmailOutbox {
    async fn stage_confirmation_email(
        &self,
        email: &ConfirmationEmail,
    ) -> Result<(), EmailDispatchError> {
        match email {
            ConfirmationEmail::Settled(settled) => {
                let payload = encode(&ConfirmationPayload::settled(settled))?;
                self.stage(settled.user_id, "purchase_confirmation", payload)
                    .await
            }
            ConfirmationEmail::ZeroValue(purchase) => {
                let payload = encode(&ConfirmationPayload::zero_value(purchase))?;
                self.stage(
                    purchase.staging_request.user_id,
                    "purchase_confirmation",
                    payload,
                )
                .await
            }
        }
    }

    async fn stage_failed_payment_email(
        &self,
        failure: &FailedPayment,
    ) -> Result<(), EmailDispatchError> {
        let payload = encode(&FailurePayload {
            charge_id: failure.charge_id.as_deref(),
            failure_reason: &failure.failure_reason,
        })?;
        self.stage(failure.user_id, "payment_failed", payload).await
    }
}
