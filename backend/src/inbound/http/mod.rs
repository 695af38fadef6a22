//! HTTP inbound adapter exposing REST endpoints.

pub mod checkout;
pub mod error;
pub mod health;
pub mod reservations;
pub mod state;
pub mod sync;
#[cfg(test)]
pub mod test_utils;
pub mod validation;
pub mod webhooks;

pub use error::ApiResult;
