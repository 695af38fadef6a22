//! Rollcall backend library modules.
//!
//! Hexagonal layout: `domain/` holds the reconciliation core and its ports,
//! `inbound/` the REST adapter, `outbound/` the PostgreSQL, payment gateway,
//! and ledger adapters, and `server/` the wiring.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod server;

/// Public OpenAPI surface used by tooling.
pub use doc::ApiDoc;
