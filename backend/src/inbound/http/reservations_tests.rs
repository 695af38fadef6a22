//! Handler tests for the reservation endpoints.

use actix_web::http::StatusCode;
use actix_web::{test as actix_test, web, App};
use chrono::Duration;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{release_slot, reserve_slot};
use crate::domain::reservation::{
    RegistrationCategory, Reservation, ReservationStatus, DEFAULT_RESERVATION_TTL_MINUTES,
};
use crate::inbound::http::test_utils::{build_state, fixture_now, TestPorts};
use crate::inbound::http::state::HttpState;

const USER_ID: Uuid = Uuid::from_u128(0x11);
const CATEGORY_ID: Uuid = Uuid::from_u128(0x22);
const RESERVATION_ID: Uuid = Uuid::from_u128(0x33);

fn category(max_capacity: Option<i32>) -> RegistrationCategory {
    RegistrationCategory {
        id: CATEGORY_ID,
        name: "Early bird".to_owned(),
        max_capacity,
        price_minor: 12_500,
    }
}

fn existing_hold(status: ReservationStatus) -> Reservation {
    Reservation {
        id: RESERVATION_ID,
        user_id: USER_ID,
        category_id: CATEGORY_ID,
        status,
        charge_id: None,
        expires_at: fixture_now() + Duration::minutes(DEFAULT_RESERVATION_TTL_MINUTES),
        created_at: fixture_now(),
    }
}

fn test_app(
    state: HttpState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new().app_data(web::Data::new(state)).service(
        web::scope("/api/v1")
            .service(reserve_slot)
            .service(release_slot),
    )
}

#[actix_web::test]
async fn reserve_returns_fresh_hold() {
    let mut ports = TestPorts::default();
    ports
        .categories
        .expect_find_by_id()
        .return_once(|_| Ok(Some(category(Some(10)))));
    ports
        .reservations
        .expect_find_for_user()
        .return_once(|_, _| Ok(None));
    ports
        .reservations
        .expect_count_occupancy()
        .return_once(|_, _| Ok(3));
    ports.reservations.expect_insert().return_once(|_| Ok(()));
    let app = actix_test::init_service(test_app(build_state(ports))).await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/reservations")
        .set_json(json!({ "userId": USER_ID, "categoryId": CATEGORY_ID }))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(
        body.get("status").and_then(Value::as_str),
        Some("awaiting_payment")
    );
    assert!(body.get("id").is_some());
    assert!(body.get("expiresAt").is_some());
}

#[actix_web::test]
async fn reserve_at_capacity_offers_waitlist() {
    let mut ports = TestPorts::default();
    ports
        .categories
        .expect_find_by_id()
        .return_once(|_| Ok(Some(category(Some(2)))));
    ports
        .reservations
        .expect_find_for_user()
        .return_once(|_, _| Ok(None));
    ports
        .reservations
        .expect_count_occupancy()
        .return_once(|_, _| Ok(2));
    let app = actix_test::init_service(test_app(build_state(ports))).await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/reservations")
        .set_json(json!({ "userId": USER_ID, "categoryId": CATEGORY_ID }))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["code"], "capacity_exceeded");
    assert_eq!(body["details"]["shouldOfferWaitlist"], true);
}

#[actix_web::test]
async fn reserve_rejects_malformed_user_id() {
    let app = actix_test::init_service(test_app(build_state(TestPorts::default()))).await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/reservations")
        .set_json(json!({ "userId": "not-a-uuid", "categoryId": CATEGORY_ID }))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["details"]["field"], "userId");
}

#[actix_web::test]
async fn renew_resets_expiry_of_existing_hold() {
    let mut ports = TestPorts::default();
    ports
        .reservations
        .expect_find_by_id()
        .return_once(|_| Ok(Some(existing_hold(ReservationStatus::AwaitingPayment))));
    ports
        .reservations
        .expect_update()
        .withf(|reservation| {
            reservation.status == ReservationStatus::AwaitingPayment
                && reservation.charge_id.is_none()
        })
        .return_once(|_| Ok(()));
    let app = actix_test::init_service(test_app(build_state(ports))).await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/reservations")
        .set_json(json!({
            "userId": USER_ID,
            "categoryId": CATEGORY_ID,
            "reservationId": RESERVATION_ID,
        }))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(
        body.get("id").and_then(Value::as_str),
        Some(RESERVATION_ID.to_string().as_str())
    );
}

#[actix_web::test]
async fn release_deletes_live_hold() {
    let mut ports = TestPorts::default();
    ports
        .reservations
        .expect_find_by_id()
        .return_once(|_| Ok(Some(existing_hold(ReservationStatus::AwaitingPayment))));
    ports
        .reservations
        .expect_delete()
        .return_once(|_| Ok(true));
    let app = actix_test::init_service(test_app(build_state(ports))).await;

    let request = actix_test::TestRequest::delete()
        .uri(&format!("/api/v1/reservations/{RESERVATION_ID}"))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn release_refuses_settled_reservation() {
    let mut ports = TestPorts::default();
    ports
        .reservations
        .expect_find_by_id()
        .return_once(|_| Ok(Some(existing_hold(ReservationStatus::Paid))));
    let app = actix_test::init_service(test_app(build_state(ports))).await;

    let request = actix_test::TestRequest::delete()
        .uri(&format!("/api/v1/reservations/{RESERVATION_ID}"))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
