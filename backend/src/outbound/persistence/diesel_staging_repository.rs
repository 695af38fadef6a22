//! PostgreSQL-backed staging repository using Diesel.
//!
//! Record creation and completion run in transactions so the invoice, its
//! line items, and the payment shell move as one logical unit. Claim queries
//! use `FOR UPDATE SKIP LOCKED` so concurrent sync passes never push the same
//! row twice; a stale claim expires after ten minutes in case a pass dies
//! mid-batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::BigInt;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{CompletionLinkage, StagingRepository, StagingRepositoryError};
use crate::domain::staging::{
    InvoiceStatus, NewStagingRecord, PaymentShellStatus, StagingInvoice, StagingLineItem,
    StagingMetadata, StagingPayment, SyncStatus,
};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{
    NewStagingInvoiceRow, NewStagingLineItemRow, NewStagingPaymentRow, StagingInvoiceRow,
    StagingLineItemRow, StagingPaymentRow,
};
use super::pool::{DbPool, PoolError};
use super::schema::{staging_invoices, staging_line_items, staging_payments};

const CLAIM_INVOICES_SQL: &str = "\
    UPDATE staging_invoices SET claimed_at = NOW() \
    WHERE id IN ( \
        SELECT id FROM staging_invoices \
        WHERE sync_status = 'pending' \
          AND (claimed_at IS NULL OR claimed_at < NOW() - INTERVAL '10 minutes') \
        ORDER BY created_at \
        LIMIT $1 \
        FOR UPDATE SKIP LOCKED \
    ) \
    RETURNING *";

const CLAIM_PAYMENTS_SQL: &str = "\
    UPDATE staging_payments SET claimed_at = NOW() \
    WHERE id IN ( \
        SELECT id FROM staging_payments \
        WHERE sync_status = 'pending' \
          AND status = 'completed' \
          AND (claimed_at IS NULL OR claimed_at < NOW() - INTERVAL '10 minutes') \
        ORDER BY created_at \
        LIMIT $1 \
        FOR UPDATE SKIP LOCKED \
    ) \
    RETURNING *";

/// Diesel-backed implementation of the staging repository port.
#[derive(Clone)]
pub struct DieselStagingRepository {
    pool: DbPool,
}

impl DieselStagingRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> StagingRepositoryError {
    map_basic_pool_error(error, StagingRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> StagingRepositoryError {
    map_basic_diesel_error(
        error,
        StagingRepositoryError::query,
        StagingRepositoryError::connection,
    )
}

fn row_to_invoice(row: StagingInvoiceRow) -> Result<StagingInvoice, StagingRepositoryError> {
    let invoice_status = InvoiceStatus::parse(&row.invoice_status).ok_or_else(|| {
        StagingRepositoryError::query(format!("unknown invoice status {:?}", row.invoice_status))
    })?;
    let sync_status = SyncStatus::parse(&row.sync_status).ok_or_else(|| {
        StagingRepositoryError::query(format!("unknown sync status {:?}", row.sync_status))
    })?;
    let metadata: StagingMetadata = serde_json::from_value(row.metadata)
        .map_err(|err| StagingRepositoryError::query(format!("decode metadata: {err}")))?;
    Ok(StagingInvoice {
        id: row.id,
        user_id: row.user_id,
        registration_id: row.registration_id,
        total_minor: row.total_minor,
        discount_minor: row.discount_minor,
        net_minor: row.net_minor,
        invoice_status,
        sync_status,
        metadata,
        payment_id: row.payment_id,
        external_invoice_id: row.external_invoice_id,
        external_invoice_number: row.external_invoice_number,
        sync_error: row.sync_error,
        created_at: row.created_at,
    })
}

fn row_to_payment(row: StagingPaymentRow) -> Result<StagingPayment, StagingRepositoryError> {
    let status = PaymentShellStatus::parse(&row.status).ok_or_else(|| {
        StagingRepositoryError::query(format!("unknown payment status {:?}", row.status))
    })?;
    let sync_status = SyncStatus::parse(&row.sync_status).ok_or_else(|| {
        StagingRepositoryError::query(format!("unknown sync status {:?}", row.sync_status))
    })?;
    Ok(StagingPayment {
        id: row.id,
        invoice_id: row.invoice_id,
        user_id: row.user_id,
        amount_minor: row.amount_minor,
        status,
        sync_status,
        charge_ref: row.charge_ref,
        bank_account_ref: row.bank_account_ref,
        external_payment_id: row.external_payment_id,
        sync_error: row.sync_error,
        created_at: row.created_at,
    })
}

fn row_to_line_item(row: StagingLineItemRow) -> StagingLineItem {
    StagingLineItem {
        id: row.id,
        invoice_id: row.invoice_id,
        description: row.description,
        amount_minor: row.amount_minor,
        quantity: row.quantity,
    }
}

fn serialize_metadata(
    metadata: &StagingMetadata,
) -> Result<serde_json::Value, StagingRepositoryError> {
    serde_json::to_value(metadata)
        .map_err(|err| StagingRepositoryError::query(format!("serialise metadata: {err}")))
}

/// Sync status a row takes once its charge settles: already-synced rows stay
/// synced, everything else becomes eligible for the next pass.
fn settled_sync_status(current: SyncStatus) -> SyncStatus {
    match current {
        SyncStatus::Synced => SyncStatus::Synced,
        _ => SyncStatus::Pending,
    }
}

/// Rewrite an invoice's metadata document with the settling charge id.
fn attach_charge_ref(
    metadata: serde_json::Value,
    charge_ref: &str,
) -> Result<serde_json::Value, serde_json::Error> {
    let mut decoded: StagingMetadata = serde_json::from_value(metadata)?;
    decoded.charge_id = Some(charge_ref.to_owned());
    serde_json::to_value(&decoded)
}

#[async_trait]
impl StagingRepository for DieselStagingRepository {
    async fn create_record(
        &self,
        record: &NewStagingRecord,
    ) -> Result<(), StagingRepositoryError> {
        self.create_records(std::slice::from_ref(record)).await
    }

    async fn create_records(
        &self,
        records: &[NewStagingRecord],
    ) -> Result<(), StagingRepositoryError> {
        let metadata_values = records
            .iter()
            .map(|record| serialize_metadata(&record.invoice.metadata))
            .collect::<Result<Vec<_>, _>>()?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let invoice_rows: Vec<NewStagingInvoiceRow<'_>> = records
            .iter()
            .zip(&metadata_values)
            .map(|(record, metadata)| NewStagingInvoiceRow {
                id: record.invoice.id,
                user_id: record.invoice.user_id,
                registration_id: record.invoice.registration_id,
                total_minor: record.invoice.total_minor,
                discount_minor: record.invoice.discount_minor,
                net_minor: record.invoice.net_minor,
                invoice_status: record.invoice.invoice_status.as_str(),
                sync_status: record.invoice.sync_status.as_str(),
                metadata,
                created_at: record.invoice.created_at,
            })
            .collect();
        let line_item_rows: Vec<NewStagingLineItemRow<'_>> = records
            .iter()
            .flat_map(|record| record.line_items.iter())
            .map(|item| NewStagingLineItemRow {
                id: item.id,
                invoice_id: item.invoice_id,
                description: &item.description,
                amount_minor: item.amount_minor,
                quantity: item.quantity,
            })
            .collect();
        let payment_rows: Vec<NewStagingPaymentRow<'_>> = records
            .iter()
            .map(|record| NewStagingPaymentRow {
                id: record.payment.id,
                invoice_id: record.payment.invoice_id,
                user_id: record.payment.user_id,
                amount_minor: record.payment.amount_minor,
                status: record.payment.status.as_str(),
                sync_status: record.payment.sync_status.as_str(),
                charge_ref: record.payment.charge_ref.as_deref(),
                bank_account_ref: record.payment.bank_account_ref.as_deref(),
                created_at: record.payment.created_at,
            })
            .collect();

        conn.transaction(|conn| {
            async move {
                diesel::insert_into(staging_invoices::table)
                    .values(&invoice_rows)
                    .execute(conn)
                    .await?;
                diesel::insert_into(staging_line_items::table)
                    .values(&line_item_rows)
                    .execute(conn)
                    .await?;
                diesel::insert_into(staging_payments::table)
                    .values(&payment_rows)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn find_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<StagingInvoice>, StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = staging_invoices::table
            .filter(staging_invoices::id.eq(invoice_id))
            .select(StagingInvoiceRow::as_select())
            .first::<StagingInvoiceRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_invoice).transpose()
    }

    async fn find_payment_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<StagingPayment>, StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = staging_payments::table
            .filter(staging_payments::invoice_id.eq(invoice_id))
            .select(StagingPaymentRow::as_select())
            .first::<StagingPaymentRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_payment).transpose()
    }

    async fn line_items_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<StagingLineItem>, StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<StagingLineItemRow> = staging_line_items::table
            .filter(staging_line_items::invoice_id.eq(invoice_id))
            .order(staging_line_items::amount_minor.desc())
            .select(StagingLineItemRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_line_item).collect())
    }

    async fn mark_invoice_completed(
        &self,
        invoice_id: Uuid,
        linkage: &CompletionLinkage,
    ) -> Result<StagingInvoice, StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let charge_ref = linkage.charge_ref.clone();
        let bank_account_ref = linkage.bank_account_ref.clone();

        let row = conn
            .transaction(|conn| {
                async move {
                    let invoice_row: StagingInvoiceRow = staging_invoices::table
                        .filter(staging_invoices::id.eq(invoice_id))
                        .for_update()
                        .select(StagingInvoiceRow::as_select())
                        .first(conn)
                        .await?;
                    let payment_row: StagingPaymentRow = staging_payments::table
                        .filter(staging_payments::invoice_id.eq(invoice_id))
                        .for_update()
                        .select(StagingPaymentRow::as_select())
                        .first(conn)
                        .await?;

                    let payment_sync = SyncStatus::parse(&payment_row.sync_status)
                        .map_or(SyncStatus::Pending, settled_sync_status);
                    diesel::update(
                        staging_payments::table.filter(staging_payments::id.eq(payment_row.id)),
                    )
                    .set((
                        staging_payments::status.eq(PaymentShellStatus::Completed.as_str()),
                        staging_payments::sync_status.eq(payment_sync.as_str()),
                        staging_payments::charge_ref.eq(Some(charge_ref.as_str())),
                        staging_payments::bank_account_ref.eq(bank_account_ref.as_deref()),
                    ))
                    .execute(conn)
                    .await?;

                    let invoice_sync = SyncStatus::parse(&invoice_row.sync_status)
                        .map_or(SyncStatus::Pending, settled_sync_status);
                    let metadata = attach_charge_ref(invoice_row.metadata.clone(), &charge_ref)
                        .map_err(|err| {
                            diesel::result::Error::DeserializationError(Box::new(err))
                        })?;
                    let updated: StagingInvoiceRow = diesel::update(
                        staging_invoices::table.filter(staging_invoices::id.eq(invoice_id)),
                    )
                    .set((
                        staging_invoices::invoice_status.eq(InvoiceStatus::Authorised.as_str()),
                        staging_invoices::sync_status.eq(invoice_sync.as_str()),
                        staging_invoices::payment_id.eq(Some(payment_row.id)),
                        staging_invoices::metadata.eq(metadata),
                    ))
                    .returning(StagingInvoiceRow::as_returning())
                    .get_result(conn)
                    .await?;
                    Ok(updated)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        row_to_invoice(row)
    }

    async fn claim_pending_invoices(
        &self,
        limit: i64,
    ) -> Result<Vec<StagingInvoice>, StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<StagingInvoiceRow> = sql_query(CLAIM_INVOICES_SQL)
            .bind::<BigInt, _>(limit)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_invoice).collect()
    }

    async fn claim_pending_payments(
        &self,
        limit: i64,
    ) -> Result<Vec<StagingPayment>, StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<StagingPaymentRow> = sql_query(CLAIM_PAYMENTS_SQL)
            .bind::<BigInt, _>(limit)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_payment).collect()
    }

    async fn release_invoice_claim(
        &self,
        invoice_id: Uuid,
    ) -> Result<(), StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(staging_invoices::table.filter(staging_invoices::id.eq(invoice_id)))
            .set(staging_invoices::claimed_at.eq(None::<DateTime<Utc>>))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn release_payment_claim(
        &self,
        payment_row_id: Uuid,
    ) -> Result<(), StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(staging_payments::table.filter(staging_payments::id.eq(payment_row_id)))
            .set(staging_payments::claimed_at.eq(None::<DateTime<Utc>>))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn record_invoice_synced(
        &self,
        invoice_id: Uuid,
        external_id: &str,
        external_number: &str,
    ) -> Result<(), StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(staging_invoices::table.filter(staging_invoices::id.eq(invoice_id)))
            .set((
                staging_invoices::sync_status.eq(SyncStatus::Synced.as_str()),
                staging_invoices::external_invoice_id.eq(Some(external_id)),
                staging_invoices::external_invoice_number.eq(Some(external_number)),
                staging_invoices::sync_error.eq(None::<String>),
                staging_invoices::claimed_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn record_invoice_sync_failure(
        &self,
        invoice_id: Uuid,
        error: &str,
    ) -> Result<(), StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(staging_invoices::table.filter(staging_invoices::id.eq(invoice_id)))
            .set((
                staging_invoices::sync_status.eq(SyncStatus::Failed.as_str()),
                staging_invoices::sync_error.eq(Some(error)),
                staging_invoices::claimed_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn record_payment_synced<'a>(
        &self,
        payment_row_id: Uuid,
        external_payment_id: Option<&'a str>,
    ) -> Result<(), StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(staging_payments::table.filter(staging_payments::id.eq(payment_row_id)))
            .set((
                staging_payments::sync_status.eq(SyncStatus::Synced.as_str()),
                staging_payments::external_payment_id.eq(external_payment_id),
                staging_payments::sync_error.eq(None::<String>),
                staging_payments::claimed_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn record_payment_sync_failure(
        &self,
        payment_row_id: Uuid,
        error: &str,
    ) -> Result<(), StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(staging_payments::table.filter(staging_payments::id.eq(payment_row_id)))
            .set((
                staging_payments::sync_status.eq(SyncStatus::Failed.as_str()),
                staging_payments::sync_error.eq(Some(error)),
                staging_payments::claimed_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn count_pending(&self) -> Result<u64, StagingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let pending_invoices: i64 = staging_invoices::table
            .filter(staging_invoices::sync_status.eq(SyncStatus::Pending.as_str()))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let pending_payments: i64 = staging_payments::table
            .filter(
                staging_payments::sync_status
                    .eq(SyncStatus::Pending.as_str())
                    .and(staging_payments::status.eq(PaymentShellStatus::Completed.as_str())),
            )
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(u64::try_from(pending_invoices + pending_payments).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    //! Coverage for row conversion and settlement status transitions.

    use chrono::Utc;
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    #[fixture]
    fn valid_row() -> StagingInvoiceRow {
        StagingInvoiceRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            registration_id: None,
            total_minor: 10_000,
            discount_minor: 0,
            net_minor: 10_000,
            invoice_status: "DRAFT".to_owned(),
            sync_status: "staged".to_owned(),
            metadata: json!({ "contactName": "Ada Lovelace" }),
            payment_id: None,
            external_invoice_id: None,
            external_invoice_number: None,
            sync_error: None,
            claimed_at: None,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    fn row_conversion_decodes_metadata(valid_row: StagingInvoiceRow) {
        let invoice = row_to_invoice(valid_row).expect("valid row converts");
        assert_eq!(invoice.metadata.contact_name, "Ada Lovelace");
        assert_eq!(invoice.sync_status, SyncStatus::Staged);
    }

    #[rstest]
    fn row_conversion_rejects_unknown_sync_status(mut valid_row: StagingInvoiceRow) {
        valid_row.sync_status = "queued".to_owned();
        let error = row_to_invoice(valid_row).expect_err("unknown status should fail");
        assert!(error.to_string().contains("queued"));
    }

    #[rstest]
    fn settlement_preserves_already_synced_rows() {
        assert_eq!(settled_sync_status(SyncStatus::Synced), SyncStatus::Synced);
        assert_eq!(settled_sync_status(SyncStatus::Staged), SyncStatus::Pending);
        assert_eq!(settled_sync_status(SyncStatus::Pending), SyncStatus::Pending);
    }

    #[rstest]
    fn settlement_writes_charge_ref_into_metadata() {
        let metadata = json!({
            "contactName": "Ada Lovelace",
            "contactEmail": "ada@example.org",
        });
        let updated = attach_charge_ref(metadata, "pi_42").expect("metadata rewrites");
        assert_eq!(updated["chargeId"], "pi_42");
        assert_eq!(updated["contactName"], "Ada Lovelace");

        let again = attach_charge_ref(updated, "pi_42").expect("rewrite is idempotent");
        assert_eq!(again["chargeId"], "pi_42");
    }
}
