//! Per-invoice push logic for a sync run.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::ports::{
    ContactFilter, ContactUpsert, LedgerApiError, LedgerContact, LedgerInvoiceDraft,
    LedgerLineItem,
};
use crate::domain::staging::{PaymentShellStatus, StagingInvoice};

use super::{format_major, EngineInner, ItemOutcome};

/// Push one claimed invoice to the ledger.
///
/// Non-zero invoices are only pushed once their payment shell is completed;
/// otherwise the invoice would land in the ledger with no money behind it.
pub(super) async fn sync_invoice(inner: Arc<EngineInner>, invoice: StagingInvoice) -> ItemOutcome {
    if invoice.net_minor != 0 {
        match inner.staging.find_payment_for_invoice(invoice.id).await {
            Ok(Some(payment)) if payment.status == PaymentShellStatus::Completed => {}
            Ok(_) => {
                info!(
                    staging_record_id = %invoice.id,
                    "invoice deferred: payment not yet completed"
                );
                return defer(&inner, &invoice).await;
            }
            Err(error) => {
                warn!(staging_record_id = %invoice.id, %error, "invoice deferred: payment lookup failed");
                return defer(&inner, &invoice).await;
            }
        }
    }

    let upsert = ContactUpsert {
        name: invoice.metadata.contact_name.clone(),
        email: invoice.metadata.contact_email.clone(),
    };
    let contact = match resolve_contact(&inner, &upsert).await {
        Ok(contact) => contact,
        Err(error) => return record_push_error(&inner, &invoice, &error).await,
    };

    let line_items = match inner.staging.line_items_for_invoice(invoice.id).await {
        Ok(items) => items,
        Err(error) => {
            warn!(staging_record_id = %invoice.id, %error, "invoice deferred: line items unavailable");
            return defer(&inner, &invoice).await;
        }
    };
    let draft = LedgerInvoiceDraft {
        reference: invoice.id,
        contact_id: contact.id,
        line_items: line_items
            .into_iter()
            .map(|item| LedgerLineItem {
                description: item.description,
                quantity: item.quantity,
                unit_amount: format_major(item.amount_minor),
            })
            .collect(),
        status: invoice.invoice_status.as_str().to_owned(),
    };

    match inner.ledger.create_invoice(&draft).await {
        Ok(summary) => {
            match inner
                .staging
                .record_invoice_synced(invoice.id, &summary.external_id, &summary.number)
                .await
            {
                Ok(()) => {
                    info!(
                        staging_record_id = %invoice.id,
                        external_invoice_id = %summary.external_id,
                        "invoice synced"
                    );
                    ItemOutcome::Synced
                }
                Err(error) => {
                    // The ledger has the invoice but our row still says
                    // pending; the next run will re-push unless an operator
                    // intervenes first.
                    warn!(
                        staging_record_id = %invoice.id,
                        external_invoice_id = %summary.external_id,
                        %error,
                        "invoice pushed but local sync state not recorded"
                    );
                    defer(&inner, &invoice).await
                }
            }
        }
        Err(error) => record_push_error(&inner, &invoice, &error).await,
    }
}

async fn record_push_error(
    inner: &EngineInner,
    invoice: &StagingInvoice,
    error: &LedgerApiError,
) -> ItemOutcome {
    if error.is_transient() {
        warn!(staging_record_id = %invoice.id, %error, "invoice deferred to next run");
        return defer(inner, invoice).await;
    }
    warn!(staging_record_id = %invoice.id, %error, "invoice rejected by ledger");
    if let Err(record_error) = inner
        .staging
        .record_invoice_sync_failure(invoice.id, &error.to_string())
        .await
    {
        warn!(staging_record_id = %invoice.id, %record_error, "invoice failure not recorded");
        return defer(inner, invoice).await;
    }
    ItemOutcome::Failed
}

/// Defer a claimed invoice: release the claim so the next scheduled run can
/// retry immediately instead of waiting out the stale-claim window.
async fn defer(inner: &EngineInner, invoice: &StagingInvoice) -> ItemOutcome {
    if let Err(error) = inner.staging.release_invoice_claim(invoice.id).await {
        warn!(
            staging_record_id = %invoice.id,
            %error,
            "claim not released; row retries after the stale-claim window"
        );
    }
    ItemOutcome::Deferred
}

/// Resolve or create the ledger contact for an invoice.
///
/// An archived contact squatting on the name is renamed out of the way and
/// the upsert retried exactly once.
async fn resolve_contact(
    inner: &EngineInner,
    upsert: &ContactUpsert,
) -> Result<LedgerContact, LedgerApiError> {
    match inner.ledger.upsert_contact(upsert).await {
        Ok(contact) => Ok(contact),
        Err(LedgerApiError::ArchivedContact { contact_id }) => {
            release_archived_name(inner, upsert, &contact_id).await?;
            inner.ledger.upsert_contact(upsert).await
        }
        Err(error) => Err(error),
    }
}

async fn release_archived_name(
    inner: &EngineInner,
    upsert: &ContactUpsert,
    contact_id: &str,
) -> Result<(), LedgerApiError> {
    let mut candidates = inner
        .ledger
        .list_contacts(&ContactFilter::Name(upsert.name.clone()))
        .await?;
    if !candidates.iter().any(|candidate| candidate.archived) {
        if let Some(email) = &upsert.email {
            candidates = inner
                .ledger
                .list_contacts(&ContactFilter::Email(email.clone()))
                .await?;
        }
    }
    let Some(archived) = candidates.into_iter().find(|candidate| candidate.archived) else {
        return Err(LedgerApiError::archived_contact(contact_id));
    };
    let released_name = format!("{} (archived {})", upsert.name, archived.id);
    info!(
        contact_id = %archived.id,
        %released_name,
        "renaming archived ledger contact to free its name"
    );
    inner.ledger.rename_contact(&archived.id, &released_name).await
}
