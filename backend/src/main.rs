//! Backend entry-point: wires adapters, domain services, and REST endpoints.

use std::env;
use std::net::SocketAddr;

use actix_web::web;
use reqwest::Url;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use rollcall::inbound::http::health::HealthState;
use rollcall::outbound::gateway::HttpPaymentGatewayConfig;
use rollcall::outbound::ledger::HttpLedgerClientConfig;
use rollcall::outbound::persistence::{DbPool, PoolConfig};
use rollcall::server::{create_server, ServerConfig};

fn required_env(name: &str) -> std::io::Result<String> {
    env::var(name).map_err(|_| std::io::Error::other(format!("{name} must be set")))
}

fn parse_url(name: &str, value: &str) -> std::io::Result<Url> {
    Url::parse(value).map_err(|err| std::io::Error::other(format!("{name} is not a URL: {err}")))
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let bind_addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_owned())
        .parse()
        .map_err(|err| std::io::Error::other(format!("BIND_ADDR is not a socket address: {err}")))?;

    let database_url = required_env("DATABASE_URL")?;
    let db_pool = DbPool::new(PoolConfig::new(database_url))
        .await
        .map_err(|err| std::io::Error::other(format!("database pool construction failed: {err}")))?;

    let gateway_base = parse_url(
        "PAYMENT_GATEWAY_URL",
        &env::var("PAYMENT_GATEWAY_URL")
            .unwrap_or_else(|_| "https://api.stripe.com/".to_owned()),
    )?;
    let gateway = HttpPaymentGatewayConfig::new(gateway_base, required_env("PAYMENT_GATEWAY_SECRET")?);

    let ledger_base = parse_url("LEDGER_API_URL", &required_env("LEDGER_API_URL")?)?;
    let mut ledger = HttpLedgerClientConfig::new(ledger_base, required_env("LEDGER_ACCESS_TOKEN")?);
    ledger.tenant_id = env::var("LEDGER_TENANT_ID").ok();

    let health_state = web::Data::new(HealthState::new());
    let config = ServerConfig::new(bind_addr, db_pool, gateway, ledger);
    let server = create_server(health_state, config)?;
    server.await
}
