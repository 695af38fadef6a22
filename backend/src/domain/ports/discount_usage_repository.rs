//! Port abstraction for discount usage accounting.

use async_trait::async_trait;

use crate::domain::completion::DiscountUsage;

/// Errors raised by discount usage repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscountUsageRepositoryError {
    /// Repository connection could not be established.
    #[error("discount usage repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("discount usage repository query failed: {message}")]
    Query { message: String },
}

impl DiscountUsageRepositoryError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Result of an idempotent usage insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountUsageOutcome {
    /// A new usage row was written.
    Recorded,
    /// A row already existed for this `(user, code, registration)` tuple.
    AlreadyRecorded,
}

/// Port for recording discount usages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscountUsageRepository: Send + Sync {
    /// Insert a usage row, keyed by `(user, code, registration)`.
    ///
    /// A retry with the same tuple must report
    /// [`DiscountUsageOutcome::AlreadyRecorded`] rather than double count.
    async fn record_usage(
        &self,
        usage: &DiscountUsage,
    ) -> Result<DiscountUsageOutcome, DiscountUsageRepositoryError>;
}
