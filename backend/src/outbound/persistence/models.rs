//! Internal Diesel row structs for database operations.
//!
//! Implementation details of the persistence layer, never exposed to the
//! domain. Conversions to domain types live in the repository adapters.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    discount_usages, email_outbox, registration_categories, reservations, staging_invoices,
    staging_line_items, staging_payments,
};

/// Row struct for reading registration categories.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = registration_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub max_capacity: Option<i32>,
    pub price_minor: i64,
    #[expect(dead_code, reason = "schema field not surfaced on the domain entity")]
    pub created_at: DateTime<Utc>,
}

/// Row struct for reading reservations.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = reservations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ReservationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub status: String,
    pub charge_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for creating reservations.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reservations)]
pub(crate) struct NewReservationRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub status: &'a str,
    pub charge_id: Option<&'a str>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Changeset struct for updating reservations.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = reservations)]
pub(crate) struct ReservationUpdate<'a> {
    pub status: &'a str,
    pub charge_id: Option<Option<&'a str>>,
    pub expires_at: DateTime<Utc>,
}

/// Row struct for reading staging invoices.
///
/// Also derives `QueryableByName` because claim queries go through
/// `sql_query` with a `RETURNING *` clause.
#[derive(Debug, Clone, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = staging_invoices)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StagingInvoiceRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub registration_id: Option<Uuid>,
    pub total_minor: i64,
    pub discount_minor: i64,
    pub net_minor: i64,
    pub invoice_status: String,
    pub sync_status: String,
    pub metadata: serde_json::Value,
    pub payment_id: Option<Uuid>,
    pub external_invoice_id: Option<String>,
    pub external_invoice_number: Option<String>,
    pub sync_error: Option<String>,
    #[expect(dead_code, reason = "claim bookkeeping column, not a domain field")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for creating staging invoices.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = staging_invoices)]
pub(crate) struct NewStagingInvoiceRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub registration_id: Option<Uuid>,
    pub total_minor: i64,
    pub discount_minor: i64,
    pub net_minor: i64,
    pub invoice_status: &'a str,
    pub sync_status: &'a str,
    pub metadata: &'a serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Row struct for reading staging line items.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = staging_line_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StagingLineItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub amount_minor: i64,
    pub quantity: i32,
}

/// Insertable struct for creating staging line items.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = staging_line_items)]
pub(crate) struct NewStagingLineItemRow<'a> {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: &'a str,
    pub amount_minor: i64,
    pub quantity: i32,
}

/// Row struct for reading staging payments.
#[derive(Debug, Clone, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = staging_payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StagingPaymentRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub status: String,
    pub sync_status: String,
    pub charge_ref: Option<String>,
    pub bank_account_ref: Option<String>,
    pub external_payment_id: Option<String>,
    pub sync_error: Option<String>,
    #[expect(dead_code, reason = "claim bookkeeping column, not a domain field")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for creating staging payments.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = staging_payments)]
pub(crate) struct NewStagingPaymentRow<'a> {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub status: &'a str,
    pub sync_status: &'a str,
    pub charge_ref: Option<&'a str>,
    pub bank_account_ref: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for recording discount usages.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = discount_usages)]
pub(crate) struct NewDiscountUsageRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub discount_code: &'a str,
    pub registration_id: Uuid,
    pub amount_saved_minor: i64,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for staging outbox emails.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = email_outbox)]
pub(crate) struct NewEmailOutboxRow<'a> {
    pub id: Uuid,
    pub recipient_user_id: Uuid,
    pub kind: &'a str,
    pub payload: &'a serde_json::Value,
    pub created_at: DateTime<Utc>,
}
