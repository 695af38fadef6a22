//! Port abstraction for ledger staging persistence.
//!
//! The staging store is the single source of truth for reconciliation. Claim
//! operations must be atomic against concurrent sync passes (row-level
//! `FOR UPDATE SKIP LOCKED` semantics or equivalent), and record creation is
//! one logical unit: either the invoice, its line items, and the payment
//! shell all land, or none do.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::staging::{NewStagingRecord, StagingInvoice, StagingLineItem, StagingPayment};

/// Errors raised by staging repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StagingRepositoryError {
    /// Repository connection could not be established.
    #[error("staging repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("staging repository query failed: {message}")]
    Query { message: String },
}

impl StagingRepositoryError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Linkage written to a staging record when its charge settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionLinkage {
    pub charge_ref: String,
    pub bank_account_ref: Option<String>,
}

/// Port for staging record storage, lookup, and sync bookkeeping.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StagingRepository: Send + Sync {
    /// Insert an invoice, its line items, and its payment shell atomically.
    async fn create_record(&self, record: &NewStagingRecord)
        -> Result<(), StagingRepositoryError>;

    /// Insert several records in one transaction. Used for payment plans so
    /// a failed instalment leaves no partial plan behind.
    async fn create_records(
        &self,
        records: &[NewStagingRecord],
    ) -> Result<(), StagingRepositoryError>;

    /// Locate an invoice strictly by its id. No other lookup exists on this
    /// port: heuristic matching by user and time window is disallowed.
    async fn find_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<StagingInvoice>, StagingRepositoryError>;

    async fn find_payment_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<StagingPayment>, StagingRepositoryError>;

    async fn line_items_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<StagingLineItem>, StagingRepositoryError>;

    /// Transition a settled invoice: `staged`/`pending` → `pending`, invoice
    /// status → `AUTHORISED`, payment shell → `completed`/`pending` with the
    /// gateway references attached, and link the shell's id onto the invoice.
    /// The charge id is also mirrored into the invoice's metadata document.
    ///
    /// Must be idempotent: re-applying the same linkage leaves the record in
    /// the same terminal state.
    async fn mark_invoice_completed(
        &self,
        invoice_id: Uuid,
        linkage: &CompletionLinkage,
    ) -> Result<StagingInvoice, StagingRepositoryError>;

    /// Atomically claim up to `limit` pending invoices for a sync pass.
    ///
    /// Claimed rows stay `pending`; the claim only excludes them from
    /// concurrent passes for the claim window.
    async fn claim_pending_invoices(
        &self,
        limit: i64,
    ) -> Result<Vec<StagingInvoice>, StagingRepositoryError>;

    /// Atomically claim up to `limit` pending payment shells for a sync pass.
    async fn claim_pending_payments(
        &self,
        limit: i64,
    ) -> Result<Vec<StagingPayment>, StagingRepositoryError>;

    /// Release a claimed invoice without recording an outcome, so the next
    /// scheduled pass can retry it without waiting out the stale-claim
    /// window.
    async fn release_invoice_claim(&self, invoice_id: Uuid)
        -> Result<(), StagingRepositoryError>;

    /// Release a claimed payment without recording an outcome.
    async fn release_payment_claim(
        &self,
        payment_row_id: Uuid,
    ) -> Result<(), StagingRepositoryError>;

    /// Record a successful invoice push.
    async fn record_invoice_synced(
        &self,
        invoice_id: Uuid,
        external_id: &str,
        external_number: &str,
    ) -> Result<(), StagingRepositoryError>;

    /// Record a permanent invoice rejection for the admin sync log.
    async fn record_invoice_sync_failure(
        &self,
        invoice_id: Uuid,
        error: &str,
    ) -> Result<(), StagingRepositoryError>;

    /// Record a successful payment push. `external_payment_id` is `None` when
    /// the external invoice was already fully paid and no new payment was
    /// created.
    async fn record_payment_synced<'a>(
        &self,
        payment_row_id: Uuid,
        external_payment_id: Option<&'a str>,
    ) -> Result<(), StagingRepositoryError>;

    /// Record a permanent payment rejection for the admin sync log.
    async fn record_payment_sync_failure(
        &self,
        payment_row_id: Uuid,
        error: &str,
    ) -> Result<(), StagingRepositoryError>;

    /// Count rows currently eligible for sync, used to skip no-op passes.
    async fn count_pending(&self) -> Result<u64, StagingRepositoryError>;
}
