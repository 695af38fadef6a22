//! External ledger adapters.

mod dto;
mod http_ledger_client;

pub use http_ledger_client::{HttpLedgerClient, HttpLedgerClientConfig};
