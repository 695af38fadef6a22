//! Behaviour tests for the staging manager.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use rstest::{fixture, rstest};
use uuid::Uuid;

use crate::domain::ports::MockStagingRepository;
use crate::domain::purchase::{
    ContactDetails, DiscountApplication, ProductSelection, PurchaseStagingRequest, StagingOptions,
};
use crate::domain::staging::{InvoiceStatus, NewStagingRecord, PaymentShellStatus, SyncStatus};
use crate::domain::StagingManager;

struct FixtureClock {
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

fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

const USER_ID: Uuid = Uuid::from_u128(0x11);
const CATEGORY_ID: Uuid = Uuid::from_u128(0x22);

#[fixture]
fn request() -> PurchaseStagingRequest {
    PurchaseStagingRequest {
        user_id: USER_ID,
        product: ProductSelection::Registration {
            category_id: CATEGORY_ID,
            reservation_id: Some(Uuid::from_u128(0x33)),
        },
        contact: ContactDetails {
            name: "Ada Lovelace".to_owned(),
            email: Some("ada@example.org".to_owned()),
        },
        total_minor: 10_000,
        discount: Some(DiscountApplication {
            code: "EARLYBIRD".to_owned(),
            amount_saved_minor: 2_500,
            registration_id: CATEGORY_ID,
        }),
    }
}

/// Staging repository mock that records every inserted record, whether it
/// arrived alone or as part of a plan.
fn capturing_repository() -> (MockStagingRepository, Arc<Mutex<Vec<NewStagingRecord>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let mut staging = MockStagingRepository::new();
    let sink = Arc::clone(&captured);
    staging.expect_create_record().returning(move |record| {
        sink.lock().expect("capture lock").push(record.clone());
        Ok(())
    });
    let sink = Arc::clone(&captured);
    staging.expect_create_records().returning(move |records| {
        sink.lock()
            .expect("capture lock")
            .extend_from_slice(records);
        Ok(())
    });
    (staging, captured)
}

fn manager(staging: MockStagingRepository) -> StagingManager {
    StagingManager::new(
        Arc::new(staging),
        Arc::new(FixtureClock {
            utc_now: fixture_now(),
        }),
    )
}

#[rstest]
#[tokio::test]
async fn paid_purchase_stages_draft_record_with_discount_line(request: PurchaseStagingRequest) {
    let (staging, captured) = capturing_repository();
    let invoice = manager(staging)
        .create_immediate_staging(&request, StagingOptions::default())
        .await
        .expect("staging succeeds");

    assert_eq!(invoice.invoice_status, InvoiceStatus::Draft);
    assert_eq!(invoice.sync_status, SyncStatus::Staged);
    assert_eq!(invoice.total_minor, 10_000);
    assert_eq!(invoice.discount_minor, 2_500);
    assert_eq!(invoice.net_minor, 7_500);
    assert_eq!(invoice.metadata.contact_name, "Ada Lovelace");

    let records = captured.lock().expect("capture lock");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.line_items.len(), 2);
    assert_eq!(record.line_items[0].amount_minor, 10_000);
    assert_eq!(record.line_items[1].amount_minor, -2_500);
    assert!(record.line_items[1].description.contains("EARLYBIRD"));
    assert_eq!(record.payment.amount_minor, 7_500);
    assert_eq!(record.payment.status, PaymentShellStatus::Staged);
    assert_eq!(record.payment.sync_status, SyncStatus::Staged);
}

#[rstest]
#[tokio::test]
async fn free_purchase_is_authorised_without_payment_to_push(mut request: PurchaseStagingRequest) {
    request.total_minor = 0;
    request.discount = None;

    let (staging, captured) = capturing_repository();
    let invoice = manager(staging)
        .create_free_purchase_staging(&request)
        .await
        .expect("staging succeeds");

    assert_eq!(invoice.invoice_status, InvoiceStatus::Authorised);
    assert_eq!(invoice.sync_status, SyncStatus::Pending);

    let records = captured.lock().expect("capture lock");
    assert_eq!(records[0].payment.status, PaymentShellStatus::Completed);
    assert_eq!(records[0].payment.sync_status, SyncStatus::Synced);
}

#[rstest]
#[tokio::test]
async fn fully_discounted_purchase_routes_to_free_path(mut request: PurchaseStagingRequest) {
    // A 100% discount leaves nothing to charge even though no free flag was
    // passed; the record must never wait on a gateway charge.
    request.discount = Some(DiscountApplication {
        code: "COMP".to_owned(),
        amount_saved_minor: 10_000,
        registration_id: CATEGORY_ID,
    });

    let (staging, captured) = capturing_repository();
    let invoice = manager(staging)
        .create_immediate_staging(&request, StagingOptions::default())
        .await
        .expect("staging succeeds");

    assert_eq!(invoice.invoice_status, InvoiceStatus::Authorised);
    assert_eq!(invoice.net_minor, 0);
    let records = captured.lock().expect("capture lock");
    assert_eq!(records[0].payment.sync_status, SyncStatus::Synced);
}

#[rstest]
#[tokio::test]
async fn payment_plan_stages_every_instalment_up_front(mut request: PurchaseStagingRequest) {
    request.total_minor = 10_000;
    request.discount = None;

    let (staging, captured) = capturing_repository();
    let first = manager(staging)
        .create_immediate_staging(
            &request,
            StagingOptions {
                is_payment_plan: true,
                installments: 3,
                ..StagingOptions::default()
            },
        )
        .await
        .expect("staging succeeds");

    let records = captured.lock().expect("capture lock");
    assert_eq!(records.len(), 3);

    // Remainder lands on the first instalment so the plan sums exactly.
    assert_eq!(records[0].invoice.net_minor, 3_334);
    assert_eq!(records[1].invoice.net_minor, 3_333);
    assert_eq!(records[2].invoice.net_minor, 3_333);
    let staged_total: i64 = records.iter().map(|record| record.invoice.net_minor).sum();
    assert_eq!(staged_total, 10_000);

    assert_eq!(first.id, records[0].invoice.id);
    assert_eq!(records[0].invoice.metadata.installment, Some(1));
    assert_eq!(records[2].invoice.metadata.installment, Some(3));
    assert!(records.iter().all(|record| record.invoice.metadata.payment_plan));

    // Only the first instalment is live; the rest wait their turn.
    assert_eq!(records[0].invoice.sync_status, SyncStatus::Staged);
    assert_eq!(records[1].invoice.sync_status, SyncStatus::Staged);
    assert!(records[0]
        .line_items
        .iter()
        .any(|item| item.description.contains("instalment 1 of 3")));
}

#[rstest]
#[tokio::test]
async fn post_hoc_record_is_born_settled(mut request: PurchaseStagingRequest) {
    request.discount = None;

    let (staging, captured) = capturing_repository();
    let invoice = manager(staging)
        .create_paid_purchase_staging(&request, Some("ch_recovered"))
        .await
        .expect("staging succeeds");

    assert_eq!(invoice.invoice_status, InvoiceStatus::Authorised);
    assert_eq!(invoice.sync_status, SyncStatus::Pending);

    let records = captured.lock().expect("capture lock");
    assert_eq!(records[0].payment.status, PaymentShellStatus::Completed);
    assert_eq!(records[0].payment.sync_status, SyncStatus::Pending);
    assert_eq!(records[0].payment.charge_ref.as_deref(), Some("ch_recovered"));
}

#[rstest]
#[tokio::test]
async fn instalment_store_failure_leaves_no_partial_plan(mut request: PurchaseStagingRequest) {
    use crate::domain::ports::StagingRepositoryError;
    request.discount = None;

    let mut staging = MockStagingRepository::new();
    staging
        .expect_create_records()
        .withf(|records| records.len() == 4)
        .times(1)
        .returning(|_| Err(StagingRepositoryError::query("insert failed")));
    // No create_record expectation: instalments never land one at a time.

    let result = manager(staging)
        .create_immediate_staging(
            &request,
            StagingOptions {
                is_payment_plan: true,
                installments: 4,
                ..StagingOptions::default()
            },
        )
        .await;
    assert!(result.is_none());
}

#[rstest]
#[tokio::test]
async fn store_failure_yields_none(request: PurchaseStagingRequest) {
    use crate::domain::ports::StagingRepositoryError;

    let mut staging = MockStagingRepository::new();
    staging
        .expect_create_record()
        .returning(|_| Err(StagingRepositoryError::query("insert failed")));

    let result = manager(staging)
        .create_immediate_staging(&request, StagingOptions::default())
        .await;
    assert!(result.is_none());
}
