//! Timing seam for the sync engine.
//!
//! Sleeps go through a trait so pacing behaviour is testable without real
//! delays.

use std::time::Duration;

use async_trait::async_trait;

/// Port for pacing delays between batches and runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
