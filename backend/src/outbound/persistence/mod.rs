//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Thin adapters only: repository implementations translate between Diesel
//! row structs and domain types. Row models (`models.rs`) and schema
//! definitions (`schema.rs`) are internal and never exposed to the domain.
//! Connections are pooled via `bb8` with native async support through
//! `diesel-async`, and all database errors are mapped to the ports' error
//! types.

mod diesel_basic_error_mapping;
mod diesel_discount_usage_repository;
mod diesel_email_outbox;
mod diesel_reservation_repository;
mod diesel_staging_repository;
mod models;
mod pool;
mod schema;

pub use diesel_discount_usage_repository::DieselDiscountUsageRepository;
pub use diesel_email_outbox::DieselEmailOutbox;
pub use diesel_reservation_repository::{DieselCategoryRepository, DieselReservationRepository};
pub use diesel_staging_repository::DieselStagingRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
