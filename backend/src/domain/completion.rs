//! Payment completion events.
//!
//! A completion event is an ephemeral, immutable value constructed fresh from
//! each trigger (gateway webhook, zero-value purchase, or failure) and passed
//! once into the completion processor. It is never persisted. Each trigger
//! variant carries exactly the metadata its path needs; the
//! `staging_record_id` is the load-bearing field binding a settled charge to
//! exactly one staging record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::purchase::{DiscountApplication, PurchaseStagingRequest};

/// A charge the gateway reports as settled.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledPayment {
    pub user_id: Uuid,
    pub charge_id: String,
    pub amount_minor: i64,
    /// The only trusted key for locating the staging record. `None` means the
    /// charge predates staging-id embedding and must go to operator review.
    pub staging_record_id: Option<Uuid>,
    pub reservation_id: Option<Uuid>,
    pub discount: Option<DiscountApplication>,
    pub bank_account_ref: Option<String>,
    pub payment_plan: bool,
    pub occurred_at: DateTime<Utc>,
}

/// A zero-value purchase completing inline, without the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroValuePurchase {
    /// Pre-created staging record, when checkout staged one; a missing record
    /// is the one case where "not found" is expected and triggers fresh
    /// staging creation instead of failure.
    pub staging_record_id: Option<Uuid>,
    pub staging_request: PurchaseStagingRequest,
    pub reservation_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

/// A charge that declined or was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPayment {
    pub user_id: Uuid,
    pub charge_id: Option<String>,
    pub reservation_id: Option<Uuid>,
    pub failure_reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// A terminal payment outcome, tagged by its trigger source.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentCompletionEvent {
    /// Gateway webhook reported settlement.
    Settled(SettledPayment),
    /// Zero-value purchase completed inline.
    ZeroValue(ZeroValuePurchase),
    /// Gateway reported decline or cancellation.
    Failed(FailedPayment),
}

impl PaymentCompletionEvent {
    /// The user the outcome belongs to.
    pub fn user_id(&self) -> Uuid {
        match self {
            Self::Settled(settled) => settled.user_id,
            Self::ZeroValue(purchase) => purchase.staging_request.user_id,
            Self::Failed(failed) => failed.user_id,
        }
    }
}

/// Outcome reported by the completion processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The staging record transitioned (or was already) authorised/pending.
    Completed { staging_record_id: Uuid },
    /// Failure notification staged; no staging mutation performed.
    FailureRecorded,
}

/// A recorded discount usage, unique per `(user, code, registration)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountUsage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub discount_code: String,
    pub registration_id: Uuid,
    pub amount_saved_minor: i64,
    pub created_at: DateTime<Utc>,
}
