//! Outbound adapters for external systems.
//!
//! Each submodule implements one or more domain ports against a concrete
//! backing service: PostgreSQL persistence, the card payment gateway, and
//! the external accounting ledger.

pub mod gateway;
pub mod ledger;
pub mod persistence;
