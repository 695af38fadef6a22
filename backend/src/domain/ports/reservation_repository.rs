//! Port abstraction for reservation persistence.
//!
//! The store's partial uniqueness constraint on `(user, category)` over
//! non-terminal rows is the only mutual exclusion against double-booking;
//! adapters must surface that constraint violation as
//! [`ReservationRepositoryError::DuplicateActive`] so the service can run its
//! second capacity check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::reservation::Reservation;

/// Errors raised by reservation repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationRepositoryError {
    /// Repository connection could not be established.
    #[error("reservation repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("reservation repository query failed: {message}")]
    Query { message: String },
    /// Insert collided with an existing non-terminal row for the same
    /// `(user, category)` pair.
    #[error("a live reservation already exists: {message}")]
    DuplicateActive { message: String },
}

impl ReservationRepositoryError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a duplicate-active error with the given message.
    pub fn duplicate_active(message: impl Into<String>) -> Self {
        Self::DuplicateActive {
            message: message.into(),
        }
    }
}

/// Port for reservation storage and occupancy queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert a fresh hold.
    ///
    /// Must fail with [`ReservationRepositoryError::DuplicateActive`] when the
    /// uniqueness constraint rejects the row.
    async fn insert(&self, reservation: &Reservation) -> Result<(), ReservationRepositoryError>;

    async fn find_by_id(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, ReservationRepositoryError>;

    /// Most recent reusable or blocking row for this `(user, category)` pair:
    /// any `awaiting_payment`/`processing` row, or the latest `failed` one.
    async fn find_for_user(
        &self,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<Option<Reservation>, ReservationRepositoryError>;

    /// Count rows occupying capacity at `now`: `paid` plus non-expired
    /// `awaiting_payment`/`processing`.
    async fn count_occupancy(
        &self,
        category_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, ReservationRepositoryError>;

    /// Persist status/expiry/charge-linkage changes to an existing row.
    async fn update(&self, reservation: &Reservation) -> Result<(), ReservationRepositoryError>;

    /// Delete a row, returning whether it existed.
    async fn delete(&self, reservation_id: Uuid) -> Result<bool, ReservationRepositoryError>;
}

/// Port for registration category lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn find_by_id(
        &self,
        category_id: Uuid,
    ) -> Result<Option<crate::domain::reservation::RegistrationCategory>, ReservationRepositoryError>;
}
