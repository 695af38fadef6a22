//! Reservation manager: capacity holds for limited registration categories.
//!
//! Capacity enforcement is check-then-insert with a second verification on
//! insert conflict. True linearizable enforcement is not guaranteed under
//! extreme concurrency; overshoot is bounded to the race window between check
//! and insert and self-heals on the next attempt, before any charge is
//! created.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ports::{
    CategoryRepository, ChargeStatus, PaymentGateway, ReservationRepository,
    ReservationRepositoryError,
};
use crate::domain::reservation::{
    RegistrationCategory, Reservation, ReservationStatus, DEFAULT_RESERVATION_TTL_MINUTES,
};
use crate::domain::Error;

fn map_repository_error(error: ReservationRepositoryError) -> Error {
    match error {
        ReservationRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("reservation store unavailable: {message}"))
        }
        ReservationRepositoryError::Query { message } => {
            Error::internal(format!("reservation store error: {message}"))
        }
        ReservationRepositoryError::DuplicateActive { message } => {
            Error::duplicate_reservation(message)
        }
    }
}

/// Domain service owning the reservation lifecycle.
pub struct ReservationService {
    reservations: Arc<dyn ReservationRepository>,
    categories: Arc<dyn CategoryRepository>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ReservationService {
    /// Create a service with the default 5-minute hold TTL.
    pub fn new(
        reservations: Arc<dyn ReservationRepository>,
        categories: Arc<dyn CategoryRepository>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_ttl(
            reservations,
            categories,
            gateway,
            clock,
            Duration::minutes(DEFAULT_RESERVATION_TTL_MINUTES),
        )
    }

    /// Create a service with an explicit hold TTL.
    pub fn with_ttl(
        reservations: Arc<dyn ReservationRepository>,
        categories: Arc<dyn CategoryRepository>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            reservations,
            categories,
            gateway,
            clock,
            ttl,
        }
    }

    /// Reserve one slot in `category_id` for `user_id`.
    ///
    /// Reuses the user's existing `failed` or `awaiting_payment` row when one
    /// exists; `processing` rows are resolved against the gateway's
    /// authoritative charge status before any retry is allowed.
    pub async fn reserve(&self, user_id: Uuid, category_id: Uuid) -> Result<Reservation, Error> {
        let category = self.require_category(category_id).await?;
        let now = self.clock.utc();

        if let Some(existing) = self
            .reservations
            .find_for_user(user_id, category_id)
            .await
            .map_err(map_repository_error)?
        {
            return self.retry_existing(existing, &category, now).await;
        }

        self.ensure_capacity(&category, now).await?;
        let hold = Reservation::new_hold(user_id, category_id, now, self.ttl);
        match self.reservations.insert(&hold).await {
            Ok(()) => Ok(hold),
            Err(ReservationRepositoryError::DuplicateActive { .. }) => {
                self.resolve_insert_conflict(user_id, &category, now).await
            }
            Err(error) => Err(map_repository_error(error)),
        }
    }

    /// Reset the expiry of a reusable hold and clear any stale charge linkage.
    pub async fn renew(&self, reservation_id: Uuid) -> Result<Reservation, Error> {
        let reservation = self.require_reservation(reservation_id).await?;
        match reservation.status {
            ReservationStatus::AwaitingPayment | ReservationStatus::Failed => {
                self.renew_row(reservation).await
            }
            ReservationStatus::Processing => Err(Error::gateway_status_ambiguous(
                "a payment for this reservation is still being processed",
            )),
            ReservationStatus::Paid | ReservationStatus::Refunded => Err(
                Error::duplicate_reservation("this reservation is already settled"),
            ),
        }
    }

    /// Delete a non-terminal reservation, freeing capacity immediately.
    ///
    /// Called on modal close, countdown expiry, or a confirmed decline.
    pub async fn release(&self, reservation_id: Uuid) -> Result<(), Error> {
        let reservation = self.require_reservation(reservation_id).await?;
        if reservation.status.is_terminal() {
            return Err(Error::invalid_request(
                "settled reservations cannot be released",
            ));
        }
        self.reservations
            .delete(reservation_id)
            .await
            .map_err(map_repository_error)?;
        info!(%reservation_id, "reservation released");
        Ok(())
    }

    /// Record that a charge confirmation has started for this hold.
    pub async fn mark_processing(
        &self,
        reservation_id: Uuid,
        charge_id: &str,
    ) -> Result<(), Error> {
        let mut reservation = self.require_reservation(reservation_id).await?;
        reservation.status = ReservationStatus::Processing;
        reservation.charge_id = Some(charge_id.to_owned());
        self.reservations
            .update(&reservation)
            .await
            .map_err(map_repository_error)
    }

    async fn require_category(&self, category_id: Uuid) -> Result<RegistrationCategory, Error> {
        self.categories
            .find_by_id(category_id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| Error::not_found(format!("registration category {category_id} not found")))
    }

    async fn require_reservation(&self, reservation_id: Uuid) -> Result<Reservation, Error> {
        self.reservations
            .find_by_id(reservation_id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| Error::not_found(format!("reservation {reservation_id} not found")))
    }

    async fn ensure_capacity(
        &self,
        category: &RegistrationCategory,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let Some(max_capacity) = category.max_capacity else {
            return Ok(());
        };
        let occupancy = self
            .reservations
            .count_occupancy(category.id, now)
            .await
            .map_err(map_repository_error)?;
        if occupancy >= u64::try_from(max_capacity.max(0)).unwrap_or(0) {
            info!(
                category_id = %category.id,
                occupancy,
                max_capacity,
                "reservation rejected: category at capacity"
            );
            return Err(Error::capacity_exceeded(format!(
                "{} is at capacity",
                category.name
            )));
        }
        Ok(())
    }

    async fn retry_existing(
        &self,
        existing: Reservation,
        category: &RegistrationCategory,
        now: DateTime<Utc>,
    ) -> Result<Reservation, Error> {
        match existing.status {
            ReservationStatus::AwaitingPayment => {
                // A live hold already counts against capacity; renewal does
                // not increase occupancy, so no fresh check is needed.
                if existing.is_expired(now) {
                    self.ensure_capacity(category, now).await?;
                }
                self.renew_row(existing).await
            }
            ReservationStatus::Failed => {
                self.ensure_capacity(category, now).await?;
                self.renew_row(existing).await
            }
            ReservationStatus::Processing => {
                self.resolve_processing(existing, category, now).await
            }
            ReservationStatus::Paid | ReservationStatus::Refunded => Err(
                Error::duplicate_reservation("this category is already purchased"),
            ),
        }
    }

    async fn renew_row(&self, mut reservation: Reservation) -> Result<Reservation, Error> {
        reservation.status = ReservationStatus::AwaitingPayment;
        reservation.charge_id = None;
        reservation.expires_at = self.clock.utc() + self.ttl;
        self.reservations
            .update(&reservation)
            .await
            .map_err(map_repository_error)?;
        Ok(reservation)
    }

    /// A `processing` row is a cache of gateway state that can silently
    /// desync (e.g. a redeploy losing the webhook). The gateway's answer is
    /// authoritative.
    async fn resolve_processing(
        &self,
        existing: Reservation,
        category: &RegistrationCategory,
        now: DateTime<Utc>,
    ) -> Result<Reservation, Error> {
        let Some(charge_id) = existing.charge_id.clone() else {
            // Processing without a charge linkage is stale local state.
            return self.renew_row(existing).await;
        };

        let status = self
            .gateway
            .get_charge(&charge_id)
            .await
            .map_err(|error| Error::service_unavailable(error.to_string()))?;

        match status {
            ChargeStatus::Succeeded => {
                warn!(
                    reservation_id = %existing.id,
                    %charge_id,
                    "gateway reports settled charge for processing reservation; repairing local state"
                );
                let mut repaired = existing;
                repaired.status = ReservationStatus::Paid;
                self.reservations
                    .update(&repaired)
                    .await
                    .map_err(map_repository_error)?;
                Err(Error::duplicate_reservation(
                    "payment already completed for this category",
                ))
            }
            status if status.is_decisively_failed() => {
                self.reservations
                    .delete(existing.id)
                    .await
                    .map_err(map_repository_error)?;
                self.ensure_capacity(category, now).await?;
                let hold =
                    Reservation::new_hold(existing.user_id, existing.category_id, now, self.ttl);
                self.reservations
                    .insert(&hold)
                    .await
                    .map_err(map_repository_error)?;
                Ok(hold)
            }
            _ => Err(Error::gateway_status_ambiguous(
                "a payment for this reservation is still being processed; please wait",
            )),
        }
    }

    async fn resolve_insert_conflict(
        &self,
        user_id: Uuid,
        category: &RegistrationCategory,
        now: DateTime<Utc>,
    ) -> Result<Reservation, Error> {
        // Second verification after losing the insert race.
        if self
            .reservations
            .find_for_user(user_id, category.id)
            .await
            .map_err(map_repository_error)?
            .is_some()
        {
            return Err(Error::duplicate_reservation(
                "a reservation for this category is already in progress",
            ));
        }
        self.ensure_capacity(category, now).await?;
        Err(Error::duplicate_reservation(
            "a concurrent reservation attempt was detected; please retry",
        ))
    }
}

#[cfg(test)]
#[path = "reservation_service_tests.rs"]
mod tests;
