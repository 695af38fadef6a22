//! DTOs for the external ledger's JSON wire format.
//!
//! The adapter decodes into these transport DTOs first, then maps into port
//! types in one pass. Field names follow the ledger's PascalCase vocabulary.

use serde::{Deserialize, Serialize};

use crate::domain::ports::LedgerContact;

#[derive(Debug, Deserialize)]
pub(super) struct ConnectionDto {
    #[serde(rename = "tenantId")]
    #[expect(dead_code, reason = "identifies the tenant; only presence matters here")]
    pub(super) tenant_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ContactUpsertDto<'a> {
    #[serde(rename = "Name")]
    pub(super) name: &'a str,
    #[serde(rename = "EmailAddress", skip_serializing_if = "Option::is_none")]
    pub(super) email_address: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct ContactRenameDto<'a> {
    #[serde(rename = "Name")]
    pub(super) name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ContactDto {
    #[serde(rename = "ContactID")]
    pub(super) contact_id: String,
    #[serde(rename = "Name")]
    pub(super) name: String,
    #[serde(rename = "EmailAddress")]
    pub(super) email_address: Option<String>,
    #[serde(rename = "ContactStatus", default)]
    pub(super) contact_status: Option<String>,
}

impl ContactDto {
    pub(super) fn is_archived(&self) -> bool {
        self.contact_status.as_deref() == Some("ARCHIVED")
    }

    pub(super) fn into_port_contact(self) -> LedgerContact {
        let archived = self.is_archived();
        LedgerContact {
            id: self.contact_id,
            name: self.name,
            email: self.email_address,
            archived,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ContactsEnvelopeDto {
    #[serde(rename = "Contacts", default)]
    pub(super) contacts: Vec<ContactDto>,
}

#[derive(Debug, Serialize)]
pub(super) struct InvoiceContactRefDto<'a> {
    #[serde(rename = "ContactID")]
    pub(super) contact_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct InvoiceLineItemDto<'a> {
    #[serde(rename = "Description")]
    pub(super) description: &'a str,
    #[serde(rename = "Quantity")]
    pub(super) quantity: i32,
    #[serde(rename = "UnitAmount")]
    pub(super) unit_amount: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct InvoiceDraftDto<'a> {
    #[serde(rename = "Type")]
    pub(super) invoice_type: &'static str,
    #[serde(rename = "Reference")]
    pub(super) reference: String,
    #[serde(rename = "Contact")]
    pub(super) contact: InvoiceContactRefDto<'a>,
    #[serde(rename = "LineItems")]
    pub(super) line_items: Vec<InvoiceLineItemDto<'a>>,
    #[serde(rename = "Status")]
    pub(super) status: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct InvoiceDto {
    #[serde(rename = "InvoiceID")]
    pub(super) invoice_id: String,
    #[serde(rename = "InvoiceNumber", default)]
    pub(super) invoice_number: Option<String>,
    #[serde(rename = "Status", default)]
    pub(super) status: Option<String>,
    #[serde(rename = "AmountDue", default)]
    pub(super) amount_due: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct InvoicesEnvelopeDto {
    #[serde(rename = "Invoices", default)]
    pub(super) invoices: Vec<InvoiceDto>,
}

#[derive(Debug, Serialize)]
pub(super) struct PaymentInvoiceRefDto<'a> {
    #[serde(rename = "InvoiceID")]
    pub(super) invoice_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct PaymentAccountRefDto<'a> {
    #[serde(rename = "Code")]
    pub(super) code: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct PaymentDraftDto<'a> {
    #[serde(rename = "Invoice")]
    pub(super) invoice: PaymentInvoiceRefDto<'a>,
    #[serde(rename = "Account")]
    pub(super) account: PaymentAccountRefDto<'a>,
    #[serde(rename = "Amount")]
    pub(super) amount: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PaymentDto {
    #[serde(rename = "PaymentID")]
    pub(super) payment_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PaymentsEnvelopeDto {
    #[serde(rename = "Payments", default)]
    pub(super) payments: Vec<PaymentDto>,
}

/// Convert a ledger decimal amount to minor units.
pub(super) fn major_to_minor(amount: f64) -> i64 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "ledger amounts fit comfortably in i64 minor units"
    )]
    let minor = (amount * 100.0).round() as i64;
    minor
}
