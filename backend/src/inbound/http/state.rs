//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::PaymentGateway;
use crate::domain::{BatchSyncEngine, CompletionProcessor, ReservationService, StagingManager};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub reservations: Arc<ReservationService>,
    pub staging: Arc<StagingManager>,
    pub completion: Arc<CompletionProcessor>,
    pub sync: Arc<BatchSyncEngine>,
    pub gateway: Arc<dyn PaymentGateway>,
}
