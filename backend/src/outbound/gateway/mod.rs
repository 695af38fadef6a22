//! Payment gateway adapters.

mod http_payment_gateway;

pub use http_payment_gateway::{HttpPaymentGateway, HttpPaymentGatewayConfig};
