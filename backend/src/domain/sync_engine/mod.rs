//! Batch synchronisation of staging rows into the external ledger.
//!
//! A run claims pending invoices and payments in batches, pushes them with
//! bounded concurrency, and records per-row outcomes. Runs are single-flight:
//! a trigger arriving while a run is in progress joins that run and receives
//! the same report instead of starting a competitor. Invoices sync strictly
//! before payments within a run, because a payment cannot be recorded against
//! an invoice the ledger has not seen.

mod invoices;
mod payments;
mod runtime;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::stream::{self, StreamExt};
use mockable::Clock;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::domain::ports::{LedgerApi, StagingRepository};

pub use runtime::{Sleeper, TokioSleeper};

/// Pacing and sizing knobs for a sync run.
#[derive(Debug, Clone)]
pub struct BatchSyncEngineConfig {
    /// Rows claimed per batch.
    pub batch_size: i64,
    /// Rows pushed concurrently within a batch.
    pub max_concurrency: usize,
    /// Pause between consecutive batches, for ledger rate-limit headroom.
    pub inter_batch_delay: Duration,
    /// Minimum gap between the start of consecutive runs.
    pub min_run_interval: Duration,
    /// Ledger bank account code used when a payment row carries none.
    pub default_bank_account_code: String,
}

impl Default for BatchSyncEngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrency: 10,
            inter_batch_delay: Duration::from_secs(2),
            min_run_interval: Duration::from_secs(30),
            default_bank_account_code: "090".to_owned(),
        }
    }
}

/// Per-kind outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncCounts {
    /// Rows pushed and recorded as synced.
    pub synced: u32,
    /// Rows permanently rejected and recorded for the admin sync log.
    pub failed: u32,
    /// Rows left pending for the next scheduled run.
    pub deferred: u32,
}

impl SyncCounts {
    fn absorb(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Synced => self.synced += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Deferred => self.deferred += 1,
        }
    }
}

/// Report returned to every caller that joined a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub invoices: SyncCounts,
    pub payments: SyncCounts,
    /// True when the run ended before claiming anything: nothing pending, or
    /// no live ledger connection.
    pub skipped: bool,
}

/// Terminal outcome for one pushed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemOutcome {
    Synced,
    Failed,
    Deferred,
}

/// Single-flight batch engine.
pub struct BatchSyncEngine {
    inner: Arc<EngineInner>,
    inflight: tokio::sync::Mutex<Option<Shared<BoxFuture<'static, SyncReport>>>>,
}

pub(crate) struct EngineInner {
    pub(crate) staging: Arc<dyn StagingRepository>,
    pub(crate) ledger: Arc<dyn LedgerApi>,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: BatchSyncEngineConfig,
    last_run_started: Mutex<Option<DateTime<Utc>>>,
}

impl BatchSyncEngine {
    pub fn new(
        staging: Arc<dyn StagingRepository>,
        ledger: Arc<dyn LedgerApi>,
        sleeper: Arc<dyn Sleeper>,
        clock: Arc<dyn Clock>,
        config: BatchSyncEngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                staging,
                ledger,
                sleeper,
                clock,
                config,
                last_run_started: Mutex::new(None),
            }),
            inflight: tokio::sync::Mutex::new(None),
        }
    }

    /// Run a sync pass, or join the pass already in flight.
    ///
    /// Every caller receives the report of the run it participated in.
    pub async fn run_sync(&self) -> SyncReport {
        let run = {
            let mut slot = self.inflight.lock().await;
            if let Some(existing) = slot.as_ref() {
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let fresh = async move { inner.run().await }.boxed().shared();
                *slot = Some(fresh.clone());
                fresh
            }
        };
        let report = run.clone().await;

        // Only the run we joined may clear the slot; a newer run may already
        // occupy it.
        let mut slot = self.inflight.lock().await;
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&run)) {
            *slot = None;
        }
        report
    }
}

impl EngineInner {
    async fn run(self: Arc<Self>) -> SyncReport {
        self.enforce_min_interval().await;
        self.record_run_start();

        let mut report = SyncReport::default();

        // A run with nothing to push makes zero external calls.
        match self.staging.count_pending().await {
            Ok(0) => {
                report.skipped = true;
                return report;
            }
            Ok(pending) => info!(pending, "ledger sync run starting"),
            Err(error) => {
                warn!(%error, "ledger sync skipped: pending count unavailable");
                report.skipped = true;
                return report;
            }
        }

        match self.ledger.has_live_connection().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("ledger sync skipped: no live ledger connection");
                report.skipped = true;
                return report;
            }
            Err(error) => {
                warn!(%error, "ledger sync skipped: connection check failed");
                report.skipped = true;
                return report;
            }
        }

        report.invoices = self.sync_claimed(ClaimKind::Invoices).await;
        report.payments = self.sync_claimed(ClaimKind::Payments).await;

        info!(
            invoices_synced = report.invoices.synced,
            invoices_failed = report.invoices.failed,
            payments_synced = report.payments.synced,
            payments_failed = report.payments.failed,
            "ledger sync run finished"
        );
        report
    }

    async fn sync_claimed(self: &Arc<Self>, kind: ClaimKind) -> SyncCounts {
        let mut counts = SyncCounts::default();
        loop {
            let outcomes = match kind {
                ClaimKind::Invoices => match self.staging.claim_pending_invoices(self.config.batch_size).await {
                    Ok(batch) if batch.is_empty() => break,
                    Ok(batch) => {
                        let size = batch.len();
                        let outcomes = stream::iter(batch)
                            .map(|invoice| invoices::sync_invoice(Arc::clone(self), invoice))
                            .buffer_unordered(self.config.max_concurrency)
                            .collect::<Vec<_>>()
                            .await;
                        (outcomes, size)
                    }
                    Err(error) => {
                        warn!(%error, "invoice claim failed; ending run early");
                        break;
                    }
                },
                ClaimKind::Payments => match self.staging.claim_pending_payments(self.config.batch_size).await {
                    Ok(batch) if batch.is_empty() => break,
                    Ok(batch) => {
                        let size = batch.len();
                        let outcomes = stream::iter(batch)
                            .map(|payment| payments::sync_payment(Arc::clone(self), payment))
                            .buffer_unordered(self.config.max_concurrency)
                            .collect::<Vec<_>>()
                            .await;
                        (outcomes, size)
                    }
                    Err(error) => {
                        warn!(%error, "payment claim failed; ending run early");
                        break;
                    }
                },
            };

            let (outcomes, batch_len) = outcomes;
            for outcome in outcomes {
                counts.absorb(outcome);
            }
            if i64::try_from(batch_len).unwrap_or(i64::MAX) < self.config.batch_size {
                break;
            }
            self.sleeper.sleep(self.config.inter_batch_delay).await;
        }
        counts
    }

    async fn enforce_min_interval(&self) {
        let last = *self
            .last_run_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(last) = last else { return };
        let elapsed = self.clock.utc() - last;
        let Ok(elapsed) = elapsed.to_std() else { return };
        if elapsed < self.config.min_run_interval {
            self.sleeper
                .sleep(self.config.min_run_interval - elapsed)
                .await;
        }
    }

    fn record_run_start(&self) {
        *self
            .last_run_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(self.clock.utc());
    }
}

#[derive(Debug, Clone, Copy)]
enum ClaimKind {
    Invoices,
    Payments,
}

/// Render a minor-unit amount as a major-unit decimal string, e.g. `12500`
/// becomes `"125.00"`.
pub(crate) fn format_major(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
pub(crate) use runtime::MockSleeper;

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
