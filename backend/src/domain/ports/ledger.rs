//! Port abstraction for the external accounting ledger.
//!
//! The ledger owns contacts, invoices, and payments. Error variants encode
//! the transient/permanent boundary the sync engine acts on: transient
//! failures leave local rows `pending` for the next scheduled pass, permanent
//! rejections mark them `failed` for the admin sync log.

use async_trait::async_trait;
use uuid::Uuid;

/// Errors raised by ledger adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerApiError {
    /// The ledger could not be reached or no tenant connection is live.
    #[error("ledger unavailable: {message}")]
    Unavailable { message: String },
    /// The ledger throttled the request (HTTP 429 or equivalent).
    #[error("ledger rate limited: {message}")]
    RateLimited { message: String },
    /// The ledger rejected the payload as invalid.
    #[error("ledger validation error: {message}")]
    Validation { message: String },
    /// The chosen contact is archived and cannot receive invoices.
    #[error("ledger contact {contact_id} is archived")]
    ArchivedContact { contact_id: String },
}

impl LedgerApiError {
    /// Create an unavailable error with the given message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a rate-limited error with the given message.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Create a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an archived-contact error for the given contact.
    pub fn archived_contact(contact_id: impl Into<String>) -> Self {
        Self::ArchivedContact {
            contact_id: contact_id.into(),
        }
    }

    /// Whether the next scheduled pass should retry without operator action.
    ///
    /// This boundary is policy, not law: validation errors are permanent,
    /// connectivity and throttling are transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::RateLimited { .. })
    }
}

/// A ledger contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerContact {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub archived: bool,
}

/// Contact resolution request built from staging metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactUpsert {
    pub name: String,
    pub email: Option<String>,
}

/// Contact search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactFilter {
    /// Exact display-name match.
    Name(String),
    /// Exact email match.
    Email(String),
}

/// One invoice line in ledger terms (major currency units).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLineItem {
    pub description: String,
    pub quantity: i32,
    /// Decimal string in major units, e.g. `"125.00"`.
    pub unit_amount: String,
}

/// Invoice submission payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerInvoiceDraft {
    /// Local staging record id, carried as the ledger invoice reference.
    pub reference: Uuid,
    pub contact_id: String,
    pub line_items: Vec<LedgerLineItem>,
    /// Ledger-side status, e.g. `AUTHORISED`.
    pub status: String,
}

/// Identifiers assigned by the ledger on invoice creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerInvoiceSummary {
    pub external_id: String,
    pub number: String,
}

/// Current ledger-side invoice state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerInvoiceState {
    pub status: String,
    pub amount_due_minor: i64,
}

/// Port for ledger contact/invoice/payment operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Whether at least one ledger tenant connection is live.
    async fn has_live_connection(&self) -> Result<bool, LedgerApiError>;

    /// Resolve or create a contact for the given details.
    async fn upsert_contact(
        &self,
        contact: &ContactUpsert,
    ) -> Result<LedgerContact, LedgerApiError>;

    /// Search contacts by filter.
    async fn list_contacts(
        &self,
        filter: &ContactFilter,
    ) -> Result<Vec<LedgerContact>, LedgerApiError>;

    /// Rename an existing contact (used to clear archived-name collisions).
    async fn rename_contact(
        &self,
        contact_id: &str,
        new_name: &str,
    ) -> Result<(), LedgerApiError>;

    /// Submit an invoice.
    async fn create_invoice(
        &self,
        draft: &LedgerInvoiceDraft,
    ) -> Result<LedgerInvoiceSummary, LedgerApiError>;

    /// Read an invoice's current status and amount due.
    async fn get_invoice(&self, external_id: &str) -> Result<LedgerInvoiceState, LedgerApiError>;

    /// Record a payment against an invoice, returning the ledger payment id.
    async fn create_payment(
        &self,
        invoice_external_id: &str,
        bank_account_code: &str,
        amount_minor: i64,
    ) -> Result<String, LedgerApiError>;
}
