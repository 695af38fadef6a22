//! PostgreSQL-backed reservation and category repositories using Diesel.
//!
//! The reservations table carries a partial unique index on
//! `(user_id, category_id)` over non-terminal statuses; a unique violation on
//! insert surfaces as `DuplicateActive` so the domain can run its
//! second-verification path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{
    CategoryRepository, ReservationRepository, ReservationRepositoryError,
};
use crate::domain::reservation::{RegistrationCategory, Reservation, ReservationStatus};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{CategoryRow, NewReservationRow, ReservationRow, ReservationUpdate};
use super::pool::{DbPool, PoolError};
use super::schema::{registration_categories, reservations};

/// Diesel-backed implementation of the reservation repository port.
#[derive(Clone)]
pub struct DieselReservationRepository {
    pool: DbPool,
}

impl DieselReservationRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Diesel-backed implementation of the category repository port.
#[derive(Clone)]
pub struct DieselCategoryRepository {
    pool: DbPool,
}

impl DieselCategoryRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ReservationRepositoryError {
    map_basic_pool_error(error, ReservationRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> ReservationRepositoryError {
    if let diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = &error {
        return ReservationRepositoryError::duplicate_active(info.message());
    }
    map_basic_diesel_error(
        error,
        ReservationRepositoryError::query,
        ReservationRepositoryError::connection,
    )
}

fn row_to_reservation(row: ReservationRow) -> Result<Reservation, ReservationRepositoryError> {
    let status = ReservationStatus::parse(&row.status).ok_or_else(|| {
        ReservationRepositoryError::query(format!("unknown reservation status {:?}", row.status))
    })?;
    Ok(Reservation {
        id: row.id,
        user_id: row.user_id,
        category_id: row.category_id,
        status,
        charge_id: row.charge_id,
        expires_at: row.expires_at,
        created_at: row.created_at,
    })
}

#[async_trait]
impl ReservationRepository for DieselReservationRepository {
    async fn insert(&self, reservation: &Reservation) -> Result<(), ReservationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewReservationRow {
            id: reservation.id,
            user_id: reservation.user_id,
            category_id: reservation.category_id,
            status: reservation.status.as_str(),
            charge_id: reservation.charge_id.as_deref(),
            expires_at: reservation.expires_at,
            created_at: reservation.created_at,
        };
        diesel::insert_into(reservations::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn find_by_id(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, ReservationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = reservations::table
            .filter(reservations::id.eq(reservation_id))
            .select(ReservationRow::as_select())
            .first::<ReservationRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_reservation).transpose()
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<Option<Reservation>, ReservationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = reservations::table
            .filter(
                reservations::user_id
                    .eq(user_id)
                    .and(reservations::category_id.eq(category_id)),
            )
            .order(reservations::created_at.desc())
            .select(ReservationRow::as_select())
            .first::<ReservationRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_reservation).transpose()
    }

    async fn count_occupancy(
        &self,
        category_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, ReservationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        // Paid rows occupy forever; live holds only until their expiry.
        let count: i64 = reservations::table
            .filter(reservations::category_id.eq(category_id))
            .filter(
                reservations::status.eq(ReservationStatus::Paid.as_str()).or(
                    reservations::status
                        .eq_any([
                            ReservationStatus::AwaitingPayment.as_str(),
                            ReservationStatus::Processing.as_str(),
                        ])
                        .and(reservations::expires_at.gt(now)),
                ),
            )
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn update(&self, reservation: &Reservation) -> Result<(), ReservationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let changes = ReservationUpdate {
            status: reservation.status.as_str(),
            charge_id: Some(reservation.charge_id.as_deref()),
            expires_at: reservation.expires_at,
        };
        diesel::update(reservations::table.filter(reservations::id.eq(reservation.id)))
            .set(&changes)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn delete(&self, reservation_id: Uuid) -> Result<bool, ReservationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted =
            diesel::delete(reservations::table.filter(reservations::id.eq(reservation_id)))
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl CategoryRepository for DieselCategoryRepository {
    async fn find_by_id(
        &self,
        category_id: Uuid,
    ) -> Result<Option<RegistrationCategory>, ReservationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = registration_categories::table
            .filter(registration_categories::id.eq(category_id))
            .select(CategoryRow::as_select())
            .first::<CategoryRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|row| RegistrationCategory {
            id: row.id,
            name: row.name,
            max_capacity: row.max_capacity,
            price_minor: row.price_minor,
        }))
    }
}
