//! Server construction and wiring.
//!
//! Builds every outbound adapter from configuration, assembles the domain
//! services over them, and exposes the REST surface.

mod config;

pub use config::ServerConfig;

use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App, HttpServer};
use mockable::{Clock, DefaultClock};

use crate::domain::ports::{LedgerApi, PaymentGateway, StagingRepository};
use crate::domain::sync_engine::TokioSleeper;
use crate::domain::{BatchSyncEngine, CompletionProcessor, ReservationService, StagingManager};
use crate::inbound::http::health::{live, ready, HealthState};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{checkout, reservations, sync, webhooks};
use crate::outbound::gateway::HttpPaymentGateway;
use crate::outbound::ledger::HttpLedgerClient;
use crate::outbound::persistence::{
    DieselCategoryRepository, DieselDiscountUsageRepository, DieselEmailOutbox,
    DieselReservationRepository, DieselStagingRepository,
};

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
#[cfg(debug_assertions)]
use utoipa::OpenApi;

fn build_http_state(config: &ServerConfig) -> std::io::Result<HttpState> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let pool = config.db_pool.clone();

    let reservations_repo = Arc::new(DieselReservationRepository::new(pool.clone()));
    let categories = Arc::new(DieselCategoryRepository::new(pool.clone()));
    let staging_repo: Arc<dyn StagingRepository> =
        Arc::new(DieselStagingRepository::new(pool.clone()));
    let discounts = Arc::new(DieselDiscountUsageRepository::new(pool.clone()));
    let emails = Arc::new(DieselEmailOutbox::new(pool));

    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(HttpPaymentGateway::new(config.gateway.clone()).map_err(|err| {
            std::io::Error::other(format!("payment gateway client construction failed: {err}"))
        })?);
    let ledger: Arc<dyn LedgerApi> =
        Arc::new(HttpLedgerClient::new(config.ledger.clone()).map_err(|err| {
            std::io::Error::other(format!("ledger client construction failed: {err}"))
        })?);

    let staging_manager = Arc::new(StagingManager::new(
        Arc::clone(&staging_repo),
        Arc::clone(&clock),
    ));
    let completion = Arc::new(CompletionProcessor::new(
        Arc::clone(&staging_repo),
        Arc::clone(&staging_manager),
        discounts,
        emails,
        reservations_repo.clone(),
        Arc::clone(&clock),
    ));
    let reservation_service = Arc::new(ReservationService::new(
        reservations_repo,
        categories,
        Arc::clone(&gateway),
        Arc::clone(&clock),
    ));
    let sync_engine = Arc::new(BatchSyncEngine::new(
        staging_repo,
        ledger,
        Arc::new(TokioSleeper),
        clock,
        config.sync.clone(),
    ));

    Ok(HttpState {
        reservations: reservation_service,
        staging: staging_manager,
        completion,
        sync: sync_engine,
        gateway,
    })
}

fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let api = web::scope("/api/v1")
        .service(reservations::reserve_slot)
        .service(reservations::release_slot)
        .service(checkout::checkout)
        .service(webhooks::payment_webhook)
        .service(sync::sync_ledger);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .service(api)
        .service(live)
        .service(ready);

    #[cfg(debug_assertions)]
    let app = app.route(
        "/api-docs/openapi.json",
        web::get().to(|| async { web::Json(ApiDoc::openapi()) }),
    );
    #[cfg(not(debug_assertions))]
    let app = app;

    app
}

/// Construct an Actix HTTP server from the provided configuration.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when adapter construction or socket binding
/// fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let http_state = web::Data::new(build_http_state(&config)?);
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        build_app(server_health_state.clone(), http_state.clone())
    })
    .bind(config.bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
