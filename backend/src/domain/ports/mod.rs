//! Domain ports and supporting types for the hexagonal boundary.

mod discount_usage_repository;
mod email_dispatcher;
mod ledger;
mod payment_gateway;
mod reservation_repository;
mod staging_repository;

#[cfg(test)]
pub use discount_usage_repository::MockDiscountUsageRepository;
pub use discount_usage_repository::{
    DiscountUsageOutcome, DiscountUsageRepository, DiscountUsageRepositoryError,
};
#[cfg(test)]
pub use email_dispatcher::MockEmailDispatcher;
pub use email_dispatcher::{ConfirmationEmail, EmailDispatchError, EmailDispatcher};
#[cfg(test)]
pub use ledger::MockLedgerApi;
pub use ledger::{
    ContactFilter, ContactUpsert, LedgerApi, LedgerApiError, LedgerContact, LedgerInvoiceDraft,
    LedgerInvoiceState, LedgerInvoiceSummary, LedgerLineItem,
};
#[cfg(test)]
pub use payment_gateway::MockPaymentGateway;
pub use payment_gateway::{
    ChargeMetadata, ChargeStatus, CreatedCharge, PaymentGateway, PaymentGatewayError,
};
#[cfg(test)]
pub use reservation_repository::{MockCategoryRepository, MockReservationRepository};
pub use reservation_repository::{
    CategoryRepository, ReservationRepository, ReservationRepositoryError,
};
#[cfg(test)]
pub use staging_repository::MockStagingRepository;
pub use staging_repository::{CompletionLinkage, StagingRepository, StagingRepositoryError};
