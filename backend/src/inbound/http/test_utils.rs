//! Shared fixtures for HTTP handler tests.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use uuid::Uuid;

use crate::domain::ports::{
    MockCategoryRepository, MockDiscountUsageRepository, MockEmailDispatcher, MockLedgerApi,
    MockPaymentGateway, MockReservationRepository, MockStagingRepository, PaymentGateway,
};
use crate::domain::staging::{InvoiceStatus, StagingInvoice, StagingMetadata, SyncStatus};
use crate::domain::sync_engine::MockSleeper;
use crate::domain::{
    BatchSyncEngine, BatchSyncEngineConfig, CompletionProcessor, ReservationService, StagingManager,
};
use crate::inbound::http::state::HttpState;

pub(crate) struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

pub(crate) fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().expect("valid fixture timestamp")
}

/// All mock ports a handler test may set expectations on. Unused mocks panic
/// on any call, so a test only configures the collaborators it exercises.
#[derive(Default)]
pub(crate) struct TestPorts {
    pub reservations: MockReservationRepository,
    pub categories: MockCategoryRepository,
    pub gateway: MockPaymentGateway,
    pub staging: MockStagingRepository,
    pub discounts: MockDiscountUsageRepository,
    pub emails: MockEmailDispatcher,
    pub ledger: MockLedgerApi,
}

pub(crate) fn build_state(ports: TestPorts) -> HttpState {
    let clock: Arc<dyn Clock> = Arc::new(FixtureClock {
        utc_now: fixture_now(),
    });
    let reservations = Arc::new(ports.reservations);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(ports.gateway);
    let staging_repo = Arc::new(ports.staging);
    let staging_manager = Arc::new(StagingManager::new(
        staging_repo.clone(),
        Arc::clone(&clock),
    ));
    let completion = Arc::new(CompletionProcessor::new(
        staging_repo.clone(),
        Arc::clone(&staging_manager),
        Arc::new(ports.discounts),
        Arc::new(ports.emails),
        reservations.clone(),
        Arc::clone(&clock),
    ));
    let reservation_service = Arc::new(ReservationService::new(
        reservations,
        Arc::new(ports.categories),
        Arc::clone(&gateway),
        Arc::clone(&clock),
    ));
    let sync = Arc::new(BatchSyncEngine::new(
        staging_repo,
        Arc::new(ports.ledger),
        Arc::new(MockSleeper::new()),
        clock,
        BatchSyncEngineConfig::default(),
    ));
    HttpState {
        reservations: reservation_service,
        staging: staging_manager,
        completion,
        sync,
        gateway,
    }
}

/// A pending paid-purchase staging invoice awaiting completion.
pub(crate) fn fixture_invoice(id: Uuid, user_id: Uuid) -> StagingInvoice {
    StagingInvoice {
        id,
        user_id,
        registration_id: None,
        total_minor: 10_000,
        discount_minor: 0,
        net_minor: 10_000,
        invoice_status: InvoiceStatus::Authorised,
        sync_status: SyncStatus::Pending,
        metadata: StagingMetadata {
            contact_name: "Ada Lovelace".to_owned(),
            contact_email: Some("ada@example.org".to_owned()),
            ..StagingMetadata::default()
        },
        payment_id: None,
        external_invoice_id: None,
        external_invoice_number: None,
        sync_error: None,
        created_at: fixture_now(),
    }
}
