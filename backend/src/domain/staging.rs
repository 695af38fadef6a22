//! Ledger staging records.
//!
//! A staging record is the internal shadow of an external-ledger invoice:
//! one invoice row, its line items, and a linked payment shell. Records are
//! created eagerly, before the gateway charge is confirmed, so a settled
//! charge always has a row waiting for it. Records are never deleted; failed
//! syncs are retried via status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External-ledger synchronisation status of an invoice or payment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Created but not yet eligible for sync (e.g. later instalments).
    Staged,
    /// Eligible for the next sync pass.
    Pending,
    /// Pushed to the external ledger.
    Synced,
    /// Rejected by the external ledger; needs operator attention.
    Failed,
    /// Synced once but local state diverged; must be pushed again.
    NeedsUpdate,
}

impl SyncStatus {
    /// Stable database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staged => "staged",
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::NeedsUpdate => "needs_update",
        }
    }

    /// Parse the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "staged" => Some(Self::Staged),
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            "needs_update" => Some(Self::NeedsUpdate),
            _ => None,
        }
    }
}

/// External-ledger invoice status mirrored on the staging row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Authorised,
}

impl InvoiceStatus {
    /// Stable database representation (matches the ledger's own vocabulary).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Authorised => "AUTHORISED",
        }
    }

    /// Parse the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(Self::Draft),
            "AUTHORISED" => Some(Self::Authorised),
            _ => None,
        }
    }
}

/// Settlement status of a staging payment shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentShellStatus {
    /// Awaiting a terminal gateway outcome.
    Staged,
    /// The gateway confirmed settlement.
    Completed,
}

impl PaymentShellStatus {
    /// Stable database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staged => "staged",
            Self::Completed => "completed",
        }
    }

    /// Parse the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "staged" => Some(Self::Staged),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Free-form metadata carried on a staging invoice.
///
/// The gateway charge id lands here when the charge settles; contact details
/// are captured at checkout so the sync pass can build a ledger contact
/// without consulting any other system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,
    pub contact_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    /// Set when this invoice is one instalment of a payment plan.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub payment_plan: bool,
    /// 1-based instalment index within a payment plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment: Option<u32>,
}

/// The invoice half of a staging record.
///
/// The `id` is the primary linkage key: it is embedded in the gateway
/// charge's metadata at creation time and is the only trusted key used to
/// relocate the record once the charge settles.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingInvoice {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Registration the purchase belongs to, when the product is an event
    /// registration rather than a membership.
    pub registration_id: Option<Uuid>,
    pub total_minor: i64,
    pub discount_minor: i64,
    pub net_minor: i64,
    pub invoice_status: InvoiceStatus,
    pub sync_status: SyncStatus,
    pub metadata: StagingMetadata,
    /// Set once a real payment shell has been linked by completion.
    pub payment_id: Option<Uuid>,
    pub external_invoice_id: Option<String>,
    pub external_invoice_number: Option<String>,
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One invoice line; discount lines carry a negative amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub amount_minor: i64,
    pub quantity: i32,
}

/// The payment shell linked to a staging invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingPayment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub status: PaymentShellStatus,
    pub sync_status: SyncStatus,
    pub charge_ref: Option<String>,
    pub bank_account_ref: Option<String>,
    pub external_payment_id: Option<String>,
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A freshly built staging record, inserted as one logical unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStagingRecord {
    pub invoice: StagingInvoice,
    pub line_items: Vec<StagingLineItem>,
    pub payment: StagingPayment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_round_trips() {
        for status in [
            SyncStatus::Staged,
            SyncStatus::Pending,
            SyncStatus::Synced,
            SyncStatus::Failed,
            SyncStatus::NeedsUpdate,
        ] {
            assert_eq!(SyncStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SyncStatus::parse("queued"), None);
    }

    #[test]
    fn invoice_status_uses_ledger_vocabulary() {
        assert_eq!(InvoiceStatus::Authorised.as_str(), "AUTHORISED");
        assert_eq!(InvoiceStatus::parse("DRAFT"), Some(InvoiceStatus::Draft));
        assert_eq!(InvoiceStatus::parse("authorised"), None);
    }

    #[test]
    fn metadata_omits_absent_fields() {
        let metadata = StagingMetadata {
            contact_name: "Ada Lovelace".to_owned(),
            ..StagingMetadata::default()
        };
        let value = serde_json::to_value(&metadata).expect("metadata serialises");
        assert_eq!(value["contactName"], "Ada Lovelace");
        assert!(value.get("chargeId").is_none());
        assert!(value.get("paymentPlan").is_none());
    }
}
