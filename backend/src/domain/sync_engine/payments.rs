//! Per-payment push logic for a sync run.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::staging::{StagingPayment, SyncStatus};

use super::{EngineInner, ItemOutcome};

/// Push one claimed payment to the ledger.
///
/// A payment can only be recorded against an invoice the ledger already
/// holds; rows whose invoice has not synced yet stay pending. When the
/// external invoice shows nothing due, the payment was already recorded (a
/// previous run that died between push and bookkeeping) and the row is
/// marked synced without creating a duplicate.
pub(super) async fn sync_payment(inner: Arc<EngineInner>, payment: StagingPayment) -> ItemOutcome {
    let invoice = match inner.staging.find_invoice(payment.invoice_id).await {
        Ok(Some(invoice)) => invoice,
        Ok(None) => {
            warn!(
                payment_row_id = %payment.id,
                invoice_id = %payment.invoice_id,
                "payment rejected: staging invoice row is missing"
            );
            return record_failure(&inner, &payment, "staging invoice row is missing").await;
        }
        Err(error) => {
            warn!(payment_row_id = %payment.id, %error, "payment deferred: invoice lookup failed");
            return defer(&inner, &payment).await;
        }
    };

    let (SyncStatus::Synced, Some(external_invoice_id)) =
        (invoice.sync_status, invoice.external_invoice_id.as_deref())
    else {
        info!(
            payment_row_id = %payment.id,
            invoice_id = %invoice.id,
            "payment deferred: invoice not yet synced"
        );
        return defer(&inner, &payment).await;
    };

    let state = match inner.ledger.get_invoice(external_invoice_id).await {
        Ok(state) => state,
        Err(error) if error.is_transient() => {
            warn!(payment_row_id = %payment.id, %error, "payment deferred to next run");
            return defer(&inner, &payment).await;
        }
        Err(error) => {
            warn!(payment_row_id = %payment.id, %error, "payment rejected by ledger");
            return record_failure(&inner, &payment, &error.to_string()).await;
        }
    };

    if state.amount_due_minor == 0 {
        info!(
            payment_row_id = %payment.id,
            %external_invoice_id,
            "external invoice already settled; skipping duplicate payment"
        );
        return record_synced(&inner, &payment, None).await;
    }

    let bank_account_code = payment
        .bank_account_ref
        .as_deref()
        .unwrap_or(&inner.config.default_bank_account_code);
    match inner
        .ledger
        .create_payment(external_invoice_id, bank_account_code, payment.amount_minor)
        .await
    {
        Ok(external_payment_id) => {
            info!(
                payment_row_id = %payment.id,
                %external_payment_id,
                amount_minor = payment.amount_minor,
                "payment synced"
            );
            record_synced(&inner, &payment, Some(&external_payment_id)).await
        }
        Err(error) if error.is_transient() => {
            warn!(payment_row_id = %payment.id, %error, "payment deferred to next run");
            defer(&inner, &payment).await
        }
        Err(error) => {
            warn!(payment_row_id = %payment.id, %error, "payment rejected by ledger");
            record_failure(&inner, &payment, &error.to_string()).await
        }
    }
}

async fn record_synced(
    inner: &EngineInner,
    payment: &StagingPayment,
    external_payment_id: Option<&str>,
) -> ItemOutcome {
    match inner
        .staging
        .record_payment_synced(payment.id, external_payment_id)
        .await
    {
        Ok(()) => ItemOutcome::Synced,
        Err(error) => {
            warn!(
                payment_row_id = %payment.id,
                %error,
                "payment pushed but local sync state not recorded"
            );
            defer(inner, payment).await
        }
    }
}

async fn record_failure(
    inner: &EngineInner,
    payment: &StagingPayment,
    reason: &str,
) -> ItemOutcome {
    if let Err(error) = inner
        .staging
        .record_payment_sync_failure(payment.id, reason)
        .await
    {
        warn!(payment_row_id = %payment.id, %error, "payment failure not recorded");
        return defer(inner, payment).await;
    }
    ItemOutcome::Failed
}

/// Defer a claimed payment: release the claim so the next scheduled run can
/// retry immediately instead of waiting out the stale-claim window.
async fn defer(inner: &EngineInner, payment: &StagingPayment) -> ItemOutcome {
    if let Err(error) = inner.staging.release_payment_claim(payment.id).await {
        warn!(
            payment_row_id = %payment.id,
            %error,
            "claim not released; row retries after the stale-claim window"
        );
    }
    ItemOutcome::Deferred
}
