//! Staging manager: builds ledger staging rows for a purchase.
//!
//! Rows are created eagerly, before the gateway charge is confirmed, so a
//! settled charge always finds its record by id. Creation failures are
//! reported as `None` rather than an error value: callers must treat `None`
//! as "the purchase cannot proceed". Silent staging failure is the highest
//! risk defect class in this system, so every failure path logs before
//! returning.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tracing::error;
use uuid::Uuid;

use crate::domain::ports::StagingRepository;
use crate::domain::purchase::{PurchaseStagingRequest, StagingOptions};
use crate::domain::staging::{
    InvoiceStatus, NewStagingRecord, PaymentShellStatus, StagingInvoice, StagingLineItem,
    StagingMetadata, StagingPayment, SyncStatus,
};

/// Domain service constructing staging records.
pub struct StagingManager {
    staging: Arc<dyn StagingRepository>,
    clock: Arc<dyn Clock>,
}

impl StagingManager {
    /// Create a manager over the staging store.
    pub fn new(staging: Arc<dyn StagingRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { staging, clock }
    }

    /// Build invoice, line items, and payment shell for a purchase, returning
    /// the primary invoice. For payment plans, all instalments are created up
    /// front; instalments beyond the first stay `staged` until triggered.
    ///
    /// Returns `None` when staging could not be written.
    pub async fn create_immediate_staging(
        &self,
        request: &PurchaseStagingRequest,
        options: StagingOptions,
    ) -> Option<StagingInvoice> {
        if options.is_free || request.net_minor() == 0 {
            return self.create_free_purchase_staging(request).await;
        }
        if options.is_payment_plan {
            return self.create_payment_plan_staging(request, options.installments).await;
        }

        let record = self.build_record(request, RecordShape::paid_pending_charge());
        self.insert(record).await
    }

    /// Zero-value purchase: authorised immediately, never touches the
    /// gateway, and its payment shell has nothing to push.
    pub async fn create_free_purchase_staging(
        &self,
        request: &PurchaseStagingRequest,
    ) -> Option<StagingInvoice> {
        let record = self.build_record(request, RecordShape::free());
        self.insert(record).await
    }

    /// Post-hoc fallback: the payment already settled but no staging row
    /// exists (only expected for zero-value purchases). The record is born
    /// authorised and sync-eligible.
    pub async fn create_paid_purchase_staging(
        &self,
        request: &PurchaseStagingRequest,
        charge_ref: Option<&str>,
    ) -> Option<StagingInvoice> {
        let mut shape = RecordShape::settled();
        shape.charge_ref = charge_ref.map(str::to_owned);
        let record = self.build_record(request, shape);
        self.insert(record).await
    }

    async fn create_payment_plan_staging(
        &self,
        request: &PurchaseStagingRequest,
        installments: u32,
    ) -> Option<StagingInvoice> {
        let installments = installments.max(1);
        let per_installment = request.net_minor() / i64::from(installments);
        let remainder = request.net_minor() - per_installment * i64::from(installments);

        let records: Vec<NewStagingRecord> = (1..=installments)
            .map(|index| {
                let amount = if index == 1 {
                    per_installment + remainder
                } else {
                    per_installment
                };
                let shape = RecordShape::installment(index, installments, amount);
                self.build_installment_record(request, shape, index, installments, amount)
            })
            .collect();
        let first = records.first().map(|record| record.invoice.clone())?;

        // All instalments land in one transaction: an aborted plan must not
        // leave stray rows in the staging trail.
        match self.staging.create_records(&records).await {
            Ok(()) => Some(first),
            Err(error) => {
                error!(
                    staging_record_id = %first.id,
                    user_id = %first.user_id,
                    %error,
                    "instalment staging creation failed; purchase must not proceed"
                );
                None
            }
        }
    }

    fn metadata(&self, request: &PurchaseStagingRequest) -> StagingMetadata {
        StagingMetadata {
            charge_id: None,
            contact_name: request.contact.name.clone(),
            contact_email: request.contact.email.clone(),
            payment_plan: false,
            installment: None,
        }
    }

    fn build_record(&self, request: &PurchaseStagingRequest, shape: RecordShape) -> NewStagingRecord {
        let now = self.clock.utc();
        let invoice_id = Uuid::new_v4();
        let net = request.net_minor();

        let mut line_items = vec![StagingLineItem {
            id: Uuid::new_v4(),
            invoice_id,
            description: request.product.description(),
            amount_minor: request.total_minor,
            quantity: 1,
        }];
        if let Some(discount) = &request.discount {
            line_items.push(StagingLineItem {
                id: Uuid::new_v4(),
                invoice_id,
                description: format!("Discount {}", discount.code),
                amount_minor: -discount.amount_saved_minor,
                quantity: 1,
            });
        }

        let invoice = StagingInvoice {
            id: invoice_id,
            user_id: request.user_id,
            registration_id: request.product.registration_id(),
            total_minor: request.total_minor,
            discount_minor: request.discount_minor(),
            net_minor: net,
            invoice_status: shape.invoice_status,
            sync_status: shape.invoice_sync,
            metadata: self.metadata(request),
            payment_id: None,
            external_invoice_id: None,
            external_invoice_number: None,
            sync_error: None,
            created_at: now,
        };

        let payment = self.payment_shell(&shape, invoice_id, request.user_id, net, now);
        NewStagingRecord {
            invoice,
            line_items,
            payment,
        }
    }

    fn build_installment_record(
        &self,
        request: &PurchaseStagingRequest,
        shape: RecordShape,
        index: u32,
        total: u32,
        amount_minor: i64,
    ) -> NewStagingRecord {
        let now = self.clock.utc();
        let invoice_id = Uuid::new_v4();

        let mut metadata = self.metadata(request);
        metadata.payment_plan = true;
        metadata.installment = Some(index);

        let invoice = StagingInvoice {
            id: invoice_id,
            user_id: request.user_id,
            registration_id: request.product.registration_id(),
            total_minor: amount_minor,
            discount_minor: 0,
            net_minor: amount_minor,
            invoice_status: shape.invoice_status,
            sync_status: shape.invoice_sync,
            metadata,
            payment_id: None,
            external_invoice_id: None,
            external_invoice_number: None,
            sync_error: None,
            created_at: now,
        };
        let line_items = vec![StagingLineItem {
            id: Uuid::new_v4(),
            invoice_id,
            description: format!("{} (instalment {index} of {total})", request.product.description()),
            amount_minor,
            quantity: 1,
        }];
        let payment = self.payment_shell(&shape, invoice_id, request.user_id, amount_minor, now);

        NewStagingRecord {
            invoice,
            line_items,
            payment,
        }
    }

    fn payment_shell(
        &self,
        shape: &RecordShape,
        invoice_id: Uuid,
        user_id: Uuid,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> StagingPayment {
        StagingPayment {
            id: Uuid::new_v4(),
            invoice_id,
            user_id,
            amount_minor,
            status: shape.payment_status,
            sync_status: shape.payment_sync,
            charge_ref: shape.charge_ref.clone(),
            bank_account_ref: None,
            external_payment_id: None,
            sync_error: None,
            created_at: now,
        }
    }

    async fn insert(&self, record: NewStagingRecord) -> Option<StagingInvoice> {
        let invoice = record.invoice.clone();
        match self.staging.create_record(&record).await {
            Ok(()) => Some(invoice),
            Err(error) => {
                error!(
                    staging_record_id = %invoice.id,
                    user_id = %invoice.user_id,
                    %error,
                    "staging record creation failed; purchase must not proceed"
                );
                None
            }
        }
    }
}

/// Status shape of a freshly built record, per construction path.
struct RecordShape {
    invoice_status: InvoiceStatus,
    invoice_sync: SyncStatus,
    payment_status: PaymentShellStatus,
    payment_sync: SyncStatus,
    charge_ref: Option<String>,
}

impl RecordShape {
    /// Normal paid purchase awaiting its gateway charge.
    fn paid_pending_charge() -> Self {
        Self {
            invoice_status: InvoiceStatus::Draft,
            invoice_sync: SyncStatus::Staged,
            payment_status: PaymentShellStatus::Staged,
            payment_sync: SyncStatus::Staged,
            charge_ref: None,
        }
    }

    /// Zero-value purchase: nothing to collect, invoice sync-eligible now.
    fn free() -> Self {
        Self {
            invoice_status: InvoiceStatus::Authorised,
            invoice_sync: SyncStatus::Pending,
            payment_status: PaymentShellStatus::Completed,
            payment_sync: SyncStatus::Synced,
            charge_ref: None,
        }
    }

    /// Post-hoc record for an already-settled payment.
    fn settled() -> Self {
        Self {
            invoice_status: InvoiceStatus::Authorised,
            invoice_sync: SyncStatus::Pending,
            payment_status: PaymentShellStatus::Completed,
            payment_sync: SyncStatus::Pending,
            charge_ref: None,
        }
    }

    /// One instalment of a payment plan; only the first becomes active.
    fn installment(index: u32, _total: u32, _amount_minor: i64) -> Self {
        if index == 1 {
            Self::paid_pending_charge()
        } else {
            Self {
                invoice_status: InvoiceStatus::Draft,
                invoice_sync: SyncStatus::Staged,
                payment_status: PaymentShellStatus::Staged,
                payment_sync: SyncStatus::Staged,
                charge_ref: None,
            }
        }
    }
}

#[cfg(test)]
#[path = "staging_service_tests.rs"]
mod tests;
