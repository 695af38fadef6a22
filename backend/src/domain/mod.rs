//! Domain layer: payment-completion reconciliation, transport and storage
//! agnostic.
//!
//! Services here depend only on the ports in [`ports`]; adapters live under
//! `inbound` and `outbound`.

pub mod completion;
mod completion_processor;
mod error;
pub mod ports;
pub mod purchase;
pub mod reservation;
mod reservation_service;
pub mod staging;
mod staging_service;
pub mod sync_engine;

pub use completion_processor::CompletionProcessor;
pub use error::{Error, ErrorCode};
pub use reservation_service::ReservationService;
pub use staging_service::StagingManager;
pub use sync_engine::{BatchSyncEngine, BatchSyncEngineConfig, SyncReport};
