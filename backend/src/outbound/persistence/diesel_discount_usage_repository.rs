//! PostgreSQL-backed discount usage repository using Diesel.
//!
//! The table carries a unique index on `(user_id, discount_code,
//! registration_id)`; inserts go through `ON CONFLICT DO NOTHING` so webhook
//! redelivery reports `AlreadyRecorded` instead of double counting.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;

use crate::domain::completion::DiscountUsage;
use crate::domain::ports::{
    DiscountUsageOutcome, DiscountUsageRepository, DiscountUsageRepositoryError,
};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::NewDiscountUsageRow;
use super::pool::{DbPool, PoolError};
use super::schema::discount_usages;

/// Diesel-backed implementation of the discount usage repository port.
#[derive(Clone)]
pub struct DieselDiscountUsageRepository {
    pool: DbPool,
}

impl DieselDiscountUsageRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DiscountUsageRepositoryError {
    map_basic_pool_error(error, DiscountUsageRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> DiscountUsageRepositoryError {
    map_basic_diesel_error(
        error,
        DiscountUsageRepositoryError::query,
        DiscountUsageRepositoryError::connection,
    )
}

#[async_trait]
impl DiscountUsageRepository for DieselDiscountUsageRepository {
    async fn record_usage(
        &self,
        usage: &DiscountUsage,
    ) -> Result<DiscountUsageOutcome, DiscountUsageRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewDiscountUsageRow {
            id: usage.id,
            user_id: usage.user_id,
            discount_code: &usage.discount_code,
            registration_id: usage.registration_id,
            amount_saved_minor: usage.amount_saved_minor,
            created_at: usage.created_at,
        };
        let inserted = diesel::insert_into(discount_usages::table)
            .values(&row)
            .on_conflict((
                discount_usages::user_id,
                discount_usages::discount_code,
                discount_usages::registration_id,
            ))
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(if inserted > 0 {
            DiscountUsageOutcome::Recorded
        } else {
            DiscountUsageOutcome::AlreadyRecorded
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let repo_err = map_pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(
            repo_err,
            DiscountUsageRepositoryError::Connection { .. }
        ));
    }

    #[rstest]
    fn diesel_error_maps_to_query_error() {
        let repo_err = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(repo_err, DiscountUsageRepositoryError::Query { .. }));
    }
}
