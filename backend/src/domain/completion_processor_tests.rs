//! Behaviour tests for the completion processor.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use rstest::rstest;
use uuid::Uuid;

use crate::domain::completion::{
    CompletionOutcome, FailedPayment, PaymentCompletionEvent, SettledPayment, ZeroValuePurchase,
};
use crate::domain::ports::{
    DiscountUsageOutcome, MockDiscountUsageRepository, MockEmailDispatcher,
    MockReservationRepository, MockStagingRepository,
};
use crate::domain::purchase::{
    ContactDetails, DiscountApplication, ProductSelection, PurchaseStagingRequest,
};
use crate::domain::reservation::{Reservation, ReservationStatus};
use crate::domain::staging::{InvoiceStatus, StagingInvoice, StagingMetadata, SyncStatus};
use crate::domain::{CompletionProcessor, ErrorCode, StagingManager};

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
const RECORD_ID: Uuid = Uuid::from_u128(0x44);
const RESERVATION_ID: Uuid = Uuid::from_u128(0x33);

fn processor(
    staging: MockStagingRepository,
    manager_staging: MockStagingRepository,
    discounts: MockDiscountUsageRepository,
    emails: MockEmailDispatcher,
    reservations: MockReservationRepository,
) -> CompletionProcessor {
    let clock: Arc<dyn Clock> = Arc::new(FixtureClock {
        utc_now: fixture_now(),
    });
    CompletionProcessor::new(
        Arc::new(staging),
        Arc::new(StagingManager::new(
            Arc::new(manager_staging),
            Arc::clone(&clock),
        )),
        Arc::new(discounts),
        Arc::new(emails),
        Arc::new(reservations),
        clock,
    )
}

fn pending_invoice(id: Uuid) -> StagingInvoice {
    StagingInvoice {
        id,
        user_id: USER_ID,
        registration_id: None,
        total_minor: 10_000,
        discount_minor: 0,
        net_minor: 10_000,
        invoice_status: InvoiceStatus::Draft,
        sync_status: SyncStatus::Staged,
        metadata: StagingMetadata {
            contact_name: "Ada Lovelace".to_owned(),
            ..StagingMetadata::default()
        },
        payment_id: None,
        external_invoice_id: None,
        external_invoice_number: None,
        sync_error: None,
        created_at: fixture_now() - Duration::minutes(1),
    }
}

fn settled(staging_record_id: Option<Uuid>) -> SettledPayment {
    SettledPayment {
        user_id: USER_ID,
        charge_id: "ch_1".to_owned(),
        amount_minor: 10_000,
        staging_record_id,
        reservation_id: None,
        discount: None,
        bank_account_ref: Some("ba_main".to_owned()),
        payment_plan: false,
        occurred_at: fixture_now(),
    }
}

fn processing_reservation() -> Reservation {
    Reservation {
        id: RESERVATION_ID,
        user_id: USER_ID,
        category_id: Uuid::from_u128(0x22),
        status: ReservationStatus::Processing,
        charge_id: Some("ch_1".to_owned()),
        expires_at: fixture_now() + Duration::minutes(3),
        created_at: fixture_now() - Duration::minutes(2),
    }
}

fn free_request() -> PurchaseStagingRequest {
    PurchaseStagingRequest {
        user_id: USER_ID,
        product: ProductSelection::Membership { duration_months: 12 },
        contact: ContactDetails {
            name: "Ada Lovelace".to_owned(),
            email: Some("ada@example.org".to_owned()),
        },
        total_minor: 0,
        discount: None,
    }
}

#[rstest]
#[tokio::test]
async fn settled_charge_completes_record_and_follow_ups() {
    let mut event = settled(Some(RECORD_ID));
    event.reservation_id = Some(RESERVATION_ID);
    event.discount = Some(DiscountApplication {
        code: "EARLYBIRD".to_owned(),
        amount_saved_minor: 2_500,
        registration_id: Uuid::from_u128(0x22),
    });

    let mut staging = MockStagingRepository::new();
    staging
        .expect_find_invoice()
        .returning(|id| Ok(Some(pending_invoice(id))));
    staging
        .expect_mark_invoice_completed()
        .withf(|id, linkage| {
            *id == RECORD_ID
                && linkage.charge_ref == "ch_1"
                && linkage.bank_account_ref.as_deref() == Some("ba_main")
        })
        .times(1)
        .returning(|id, _| Ok(pending_invoice(id)));

    let mut emails = MockEmailDispatcher::new();
    emails
        .expect_stage_confirmation_email()
        .times(1)
        .returning(|_| Ok(()));

    let mut discounts = MockDiscountUsageRepository::new();
    discounts
        .expect_record_usage()
        .withf(|usage| usage.discount_code == "EARLYBIRD" && usage.amount_saved_minor == 2_500)
        .times(1)
        .returning(|_| Ok(DiscountUsageOutcome::Recorded));

    let mut reservations = MockReservationRepository::new();
    reservations
        .expect_find_by_id()
        .returning(|_| Ok(Some(processing_reservation())));
    reservations
        .expect_update()
        .withf(|updated| {
            updated.status == ReservationStatus::Paid
                && updated.charge_id.as_deref() == Some("ch_1")
        })
        .times(1)
        .returning(|_| Ok(()));

    let outcome = processor(
        staging,
        MockStagingRepository::new(),
        discounts,
        emails,
        reservations,
    )
    .process_payment_completion(PaymentCompletionEvent::Settled(event))
    .await
    .expect("completion succeeds");

    assert_eq!(
        outcome,
        CompletionOutcome::Completed {
            staging_record_id: RECORD_ID
        }
    );
}

#[rstest]
#[tokio::test]
async fn settled_charge_without_record_id_fails_with_no_side_effects() {
    // Every mock is expectation-free: any call would panic the test.
    let error = processor(
        MockStagingRepository::new(),
        MockStagingRepository::new(),
        MockDiscountUsageRepository::new(),
        MockEmailDispatcher::new(),
        MockReservationRepository::new(),
    )
    .process_payment_completion(PaymentCompletionEvent::Settled(settled(None)))
    .await
    .expect_err("missing id is fatal");

    assert_eq!(error.code, ErrorCode::StagingRecordNotFound);
}

#[rstest]
#[tokio::test]
async fn settled_charge_with_missing_record_never_guesses() {
    let mut staging = MockStagingRepository::new();
    staging.expect_find_invoice().returning(|_| Ok(None));

    let error = processor(
        staging,
        MockStagingRepository::new(),
        MockDiscountUsageRepository::new(),
        MockEmailDispatcher::new(),
        MockReservationRepository::new(),
    )
    .process_payment_completion(PaymentCompletionEvent::Settled(settled(Some(RECORD_ID))))
    .await
    .expect_err("missing record is fatal");

    assert_eq!(error.code, ErrorCode::StagingRecordNotFound);
}

#[rstest]
#[tokio::test]
async fn redelivered_settlement_is_idempotent() {
    let mut event = settled(Some(RECORD_ID));
    event.discount = Some(DiscountApplication {
        code: "EARLYBIRD".to_owned(),
        amount_saved_minor: 2_500,
        registration_id: Uuid::from_u128(0x22),
    });

    let mut staging = MockStagingRepository::new();
    staging
        .expect_find_invoice()
        .returning(|id| Ok(Some(pending_invoice(id))));
    staging
        .expect_mark_invoice_completed()
        .times(2)
        .returning(|id, _| Ok(pending_invoice(id)));

    let mut emails = MockEmailDispatcher::new();
    emails
        .expect_stage_confirmation_email()
        .returning(|_| Ok(()));

    let mut discounts = MockDiscountUsageRepository::new();
    let mut usage_calls = 0_u32;
    discounts.expect_record_usage().returning(move |_| {
        usage_calls += 1;
        if usage_calls == 1 {
            Ok(DiscountUsageOutcome::Recorded)
        } else {
            // The unique (user, code, registration) key absorbs the retry.
            Ok(DiscountUsageOutcome::AlreadyRecorded)
        }
    });

    let processor = processor(
        staging,
        MockStagingRepository::new(),
        discounts,
        emails,
        MockReservationRepository::new(),
    );
    let first = processor
        .process_payment_completion(PaymentCompletionEvent::Settled(event.clone()))
        .await
        .expect("first delivery succeeds");
    let second = processor
        .process_payment_completion(PaymentCompletionEvent::Settled(event))
        .await
        .expect("redelivery succeeds");
    assert_eq!(first, second);
}

#[rstest]
#[tokio::test]
async fn email_failure_never_fails_the_completion() {
    let mut staging = MockStagingRepository::new();
    staging
        .expect_find_invoice()
        .returning(|id| Ok(Some(pending_invoice(id))));
    staging
        .expect_mark_invoice_completed()
        .returning(|id, _| Ok(pending_invoice(id)));

    let mut emails = MockEmailDispatcher::new();
    emails.expect_stage_confirmation_email().returning(|_| {
        Err(crate::domain::ports::EmailDispatchError::staging(
            "outbox unavailable",
        ))
    });

    let outcome = processor(
        staging,
        MockStagingRepository::new(),
        MockDiscountUsageRepository::new(),
        emails,
        MockReservationRepository::new(),
    )
    .process_payment_completion(PaymentCompletionEvent::Settled(settled(Some(RECORD_ID))))
    .await
    .expect("completion survives email failure");

    assert_eq!(
        outcome,
        CompletionOutcome::Completed {
            staging_record_id: RECORD_ID
        }
    );
}

#[rstest]
#[tokio::test]
async fn failed_payment_stages_notice_and_marks_row_reusable() {
    let mut emails = MockEmailDispatcher::new();
    emails
        .expect_stage_failed_payment_email()
        .withf(|failure| failure.failure_reason == "card_declined")
        .times(1)
        .returning(|_| Ok(()));

    let mut reservations = MockReservationRepository::new();
    reservations
        .expect_find_by_id()
        .returning(|_| Ok(Some(processing_reservation())));
    reservations
        .expect_update()
        .withf(|updated| updated.status == ReservationStatus::Failed)
        .times(1)
        .returning(|_| Ok(()));

    let outcome = processor(
        MockStagingRepository::new(),
        MockStagingRepository::new(),
        MockDiscountUsageRepository::new(),
        emails,
        reservations,
    )
    .process_payment_completion(PaymentCompletionEvent::Failed(FailedPayment {
        user_id: USER_ID,
        charge_id: Some("ch_1".to_owned()),
        reservation_id: Some(RESERVATION_ID),
        failure_reason: "card_declined".to_owned(),
        occurred_at: fixture_now(),
    }))
    .await
    .expect("failure handling never errors");

    assert_eq!(outcome, CompletionOutcome::FailureRecorded);
}

#[rstest]
#[tokio::test]
async fn zero_value_purchase_with_existing_record_completes_without_mutation() {
    let mut staging = MockStagingRepository::new();
    staging.expect_find_invoice().returning(|id| {
        let mut invoice = pending_invoice(id);
        invoice.invoice_status = InvoiceStatus::Authorised;
        invoice.sync_status = SyncStatus::Pending;
        invoice.net_minor = 0;
        Ok(Some(invoice))
    });

    let mut emails = MockEmailDispatcher::new();
    emails
        .expect_stage_confirmation_email()
        .times(1)
        .returning(|_| Ok(()));

    let outcome = processor(
        staging,
        MockStagingRepository::new(),
        MockDiscountUsageRepository::new(),
        emails,
        MockReservationRepository::new(),
    )
    .process_payment_completion(PaymentCompletionEvent::ZeroValue(ZeroValuePurchase {
        staging_record_id: Some(RECORD_ID),
        staging_request: free_request(),
        reservation_id: None,
        occurred_at: fixture_now(),
    }))
    .await
    .expect("zero-value completion succeeds");

    assert_eq!(
        outcome,
        CompletionOutcome::Completed {
            staging_record_id: RECORD_ID
        }
    );
}

#[rstest]
#[tokio::test]
async fn zero_value_purchase_without_record_creates_one() {
    let mut manager_staging = MockStagingRepository::new();
    manager_staging
        .expect_create_record()
        .times(1)
        .returning(|record| {
            assert_eq!(record.invoice.net_minor, 0);
            Ok(())
        });

    let mut emails = MockEmailDispatcher::new();
    emails
        .expect_stage_confirmation_email()
        .returning(|_| Ok(()));

    let outcome = processor(
        MockStagingRepository::new(),
        manager_staging,
        MockDiscountUsageRepository::new(),
        emails,
        MockReservationRepository::new(),
    )
    .process_payment_completion(PaymentCompletionEvent::ZeroValue(ZeroValuePurchase {
        staging_record_id: None,
        staging_request: free_request(),
        reservation_id: None,
        occurred_at: fixture_now(),
    }))
    .await
    .expect("fresh staging succeeds");

    assert!(matches!(outcome, CompletionOutcome::Completed { .. }));
}
