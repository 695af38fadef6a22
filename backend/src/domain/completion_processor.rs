//! Payment completion processor.
//!
//! Single entry point for every terminal payment outcome: gateway settlement,
//! zero-value purchase, or failure. The core phase (locating the staging
//! record and marking it completed) is fatal on error; the follow-up phases
//! (confirmation email, discount accounting, reservation settlement) are
//! individually swallowed and logged so a partial failure never loses the
//! money movement itself. Re-delivery of the same event is safe end to end.

use std::sync::Arc;

use mockable::Clock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::completion::{
    CompletionOutcome, DiscountUsage, FailedPayment, PaymentCompletionEvent, SettledPayment,
    ZeroValuePurchase,
};
use crate::domain::ports::{
    CompletionLinkage, ConfirmationEmail, DiscountUsageOutcome, DiscountUsageRepository,
    EmailDispatcher, ReservationRepository, StagingRepository, StagingRepositoryError,
};
use crate::domain::purchase::DiscountApplication;
use crate::domain::reservation::ReservationStatus;
use crate::domain::staging_service::StagingManager;
use crate::domain::Error;

fn map_staging_error(error: StagingRepositoryError) -> Error {
    match error {
        StagingRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("staging store unavailable: {message}"))
        }
        StagingRepositoryError::Query { message } => {
            Error::internal(format!("staging store error: {message}"))
        }
    }
}

/// Domain service applying terminal payment outcomes.
pub struct CompletionProcessor {
    staging: Arc<dyn StagingRepository>,
    staging_manager: Arc<StagingManager>,
    discounts: Arc<dyn DiscountUsageRepository>,
    emails: Arc<dyn EmailDispatcher>,
    reservations: Arc<dyn ReservationRepository>,
    clock: Arc<dyn Clock>,
}

impl CompletionProcessor {
    pub fn new(
        staging: Arc<dyn StagingRepository>,
        staging_manager: Arc<StagingManager>,
        discounts: Arc<dyn DiscountUsageRepository>,
        emails: Arc<dyn EmailDispatcher>,
        reservations: Arc<dyn ReservationRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            staging,
            staging_manager,
            discounts,
            emails,
            reservations,
            clock,
        }
    }

    /// Apply a terminal payment outcome.
    ///
    /// Settled events that cannot be bound to a staging record by id fail
    /// with no side effects: the money moved but the books cannot be updated,
    /// which is an operator-review condition, never a guessing game.
    pub async fn process_payment_completion(
        &self,
        event: PaymentCompletionEvent,
    ) -> Result<CompletionOutcome, Error> {
        match event {
            PaymentCompletionEvent::Settled(settled) => self.process_settled(settled).await,
            PaymentCompletionEvent::ZeroValue(purchase) => self.process_zero_value(purchase).await,
            PaymentCompletionEvent::Failed(failed) => Ok(self.process_failed(failed).await),
        }
    }

    async fn process_settled(
        &self,
        settled: SettledPayment,
    ) -> Result<CompletionOutcome, Error> {
        let Some(staging_record_id) = settled.staging_record_id else {
            error!(
                charge_id = %settled.charge_id,
                user_id = %settled.user_id,
                "settled charge carries no staging record id; operator review required"
            );
            return Err(Error::staging_record_not_found(format!(
                "settled charge {} carries no staging record id",
                settled.charge_id
            )));
        };

        let invoice = self
            .staging
            .find_invoice(staging_record_id)
            .await
            .map_err(map_staging_error)?;
        if invoice.is_none() {
            error!(
                %staging_record_id,
                charge_id = %settled.charge_id,
                user_id = %settled.user_id,
                "settled charge references a missing staging record; operator review required"
            );
            return Err(Error::staging_record_not_found(format!(
                "no staging record {staging_record_id} for settled charge {}",
                settled.charge_id
            )));
        }

        let linkage = CompletionLinkage {
            charge_ref: settled.charge_id.clone(),
            bank_account_ref: settled.bank_account_ref.clone(),
        };
        self.staging
            .mark_invoice_completed(staging_record_id, &linkage)
            .await
            .map_err(map_staging_error)?;
        info!(
            %staging_record_id,
            charge_id = %settled.charge_id,
            amount_minor = settled.amount_minor,
            "staging record marked completed"
        );

        // Follow-up phases: each failure is logged and swallowed so the
        // completed record above is never rolled back by a notification.
        self.stage_confirmation(ConfirmationEmail::Settled(settled.clone()))
            .await;
        if let Some(discount) = &settled.discount {
            self.record_discount_usage(settled.user_id, discount).await;
        }
        if let Some(reservation_id) = settled.reservation_id {
            self.settle_reservation(reservation_id, Some(&settled.charge_id))
                .await;
        }

        Ok(CompletionOutcome::Completed { staging_record_id })
    }

    async fn process_zero_value(
        &self,
        purchase: ZeroValuePurchase,
    ) -> Result<CompletionOutcome, Error> {
        // Zero-value records are born authorised and sync-eligible, so an
        // existing record needs no further transition. A missing record is
        // the one expected "not found": checkout may complete free purchases
        // without staging first, so we create the record here instead.
        let existing = match purchase.staging_record_id {
            Some(id) => self
                .staging
                .find_invoice(id)
                .await
                .map_err(map_staging_error)?,
            None => None,
        };

        let invoice = match existing {
            Some(invoice) => invoice,
            None => self
                .staging_manager
                .create_free_purchase_staging(&purchase.staging_request)
                .await
                .ok_or_else(|| {
                    Error::staging_creation_failed(
                        "staging rows for the zero-value purchase could not be created",
                    )
                })?,
        };
        let staging_record_id = invoice.id;
        info!(%staging_record_id, "zero-value purchase completed");

        self.stage_confirmation(ConfirmationEmail::ZeroValue(purchase.clone()))
            .await;
        if let Some(discount) = &purchase.staging_request.discount {
            self.record_discount_usage(purchase.staging_request.user_id, discount)
                .await;
        }
        if let Some(reservation_id) = purchase.reservation_id {
            self.settle_reservation(reservation_id, None).await;
        }

        Ok(CompletionOutcome::Completed { staging_record_id })
    }

    /// Failures never touch staging rows; the record stays reusable for the
    /// user's next attempt.
    async fn process_failed(&self, failed: FailedPayment) -> CompletionOutcome {
        if let Err(error) = self.emails.stage_failed_payment_email(&failed).await {
            error!(
                user_id = %failed.user_id,
                %error,
                "failed-payment notification could not be staged"
            );
        }
        if let Some(reservation_id) = failed.reservation_id {
            self.mark_reservation_failed(reservation_id, failed.charge_id.as_deref())
                .await;
        }
        CompletionOutcome::FailureRecorded
    }

    async fn stage_confirmation(&self, email: ConfirmationEmail) {
        if let Err(error) = self.emails.stage_confirmation_email(&email).await {
            error!(%error, "confirmation email could not be staged");
        }
    }

    async fn record_discount_usage(&self, user_id: Uuid, discount: &DiscountApplication) {
        let usage = DiscountUsage {
            id: Uuid::new_v4(),
            user_id,
            discount_code: discount.code.clone(),
            registration_id: discount.registration_id,
            amount_saved_minor: discount.amount_saved_minor,
            created_at: self.clock.utc(),
        };
        match self.discounts.record_usage(&usage).await {
            Ok(DiscountUsageOutcome::Recorded) => {
                info!(%user_id, code = %discount.code, "discount usage recorded");
            }
            Ok(DiscountUsageOutcome::AlreadyRecorded) => {
                info!(%user_id, code = %discount.code, "discount usage already recorded");
            }
            Err(error) => {
                error!(%user_id, code = %discount.code, %error, "discount usage not recorded");
            }
        }
    }

    async fn settle_reservation(&self, reservation_id: Uuid, charge_id: Option<&str>) {
        match self.reservations.find_by_id(reservation_id).await {
            Ok(Some(mut reservation)) => {
                if reservation.status == ReservationStatus::Paid {
                    return;
                }
                reservation.status = ReservationStatus::Paid;
                if let Some(charge_id) = charge_id {
                    reservation.charge_id = Some(charge_id.to_owned());
                }
                if let Err(error) = self.reservations.update(&reservation).await {
                    error!(%reservation_id, %error, "reservation could not be marked paid");
                }
            }
            Ok(None) => {
                warn!(%reservation_id, "settled payment references a missing reservation");
            }
            Err(error) => {
                error!(%reservation_id, %error, "reservation lookup failed during settlement");
            }
        }
    }

    async fn mark_reservation_failed(&self, reservation_id: Uuid, charge_id: Option<&str>) {
        match self.reservations.find_by_id(reservation_id).await {
            Ok(Some(mut reservation)) => {
                if reservation.status.is_terminal() {
                    return;
                }
                reservation.status = ReservationStatus::Failed;
                if let Some(charge_id) = charge_id {
                    reservation.charge_id = Some(charge_id.to_owned());
                }
                if let Err(error) = self.reservations.update(&reservation).await {
                    error!(%reservation_id, %error, "reservation could not be marked failed");
                }
            }
            Ok(None) => {
                warn!(%reservation_id, "failed payment references a missing reservation");
            }
            Err(error) => {
                error!(%reservation_id, %error, "reservation lookup failed during failure handling");
            }
        }
    }
}

#[cfg(test)]
#[path = "completion_processor_tests.rs"]
mod tests;
