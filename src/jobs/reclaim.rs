//! Expiry Reclaimer
//!
//! Periodic sweep returning the unclaimed stock of expired pools to their
//! owners. Only one instance in the cluster sweeps at a time; the others
//! skip the tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::envelope::{repository, Envelope, EnvelopeDistributor, RefundOutcome};
use crate::lock::{run_exclusive, LockProvider};

use super::JobError;

pub const RECLAIM_LOCK_NAME: &str = "lock:RefundExpired";

#[derive(Debug, Clone)]
pub struct ReclaimConfig {
    /// Time between ticks (default: 60 seconds)
    pub interval: Duration,
    pub lock_name: String,
    /// Lock lease, shorter than the interval (default: 50 seconds)
    pub lock_lease: Duration,
    /// Lock acquisition tries per tick (default: 3)
    pub lock_tries: u32,
    /// Delay between acquisition tries (default: 500 ms)
    pub lock_retry_delay: Duration,
    /// Pools per page (default: 100)
    pub page_size: i64,
    /// Pages per sweep (default: 50)
    pub max_pages: u32,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            lock_name: RECLAIM_LOCK_NAME.to_string(),
            lock_lease: Duration::from_secs(50),
            lock_tries: 3,
            lock_retry_delay: Duration::from_millis(500),
            page_size: 100,
            max_pages: 50,
        }
    }
}

/// Counts of one sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub pages: u32,
    pub scanned: u64,
    pub refunded: u64,
    /// Already handled by someone else
    pub skipped: u64,
    pub failed: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Another instance holds the lock
    Skipped,
    Swept(SweepReport),
}

#[derive(Clone)]
pub struct ExpiryReclaimer {
    pool: PgPool,
    distributor: EnvelopeDistributor,
    lock: Arc<dyn LockProvider>,
    config: ReclaimConfig,
}

impl ExpiryReclaimer {
    pub fn new(
        pool: PgPool,
        distributor: EnvelopeDistributor,
        lock: Arc<dyn LockProvider>,
        config: ReclaimConfig,
    ) -> Self {
        Self {
            pool,
            distributor,
            lock,
            config,
        }
    }

    pub fn config(&self) -> &ReclaimConfig {
        &self.config
    }

    /// One scheduled run: sweep if the cluster lock can be taken, else skip.
    pub async fn tick(&self) -> Result<TickOutcome, JobError> {
        let swept = run_exclusive(
            self.lock.as_ref(),
            &self.config.lock_name,
            self.config.lock_lease,
            self.config.lock_tries,
            self.sweep(),
        )
        .await?;

        match swept {
            None => {
                tracing::info!(lock = %self.config.lock_name, "Reclaim lock unavailable, skipping tick");
                Ok(TickOutcome::Skipped)
            }
            Some(report) => Ok(TickOutcome::Swept(report?)),
        }
    }

    /// Refund expired pools page by page.
    ///
    /// A failed refund is logged and counted; the pool stays eligible for
    /// the next sweep and the rest of the page is still processed.
    pub async fn sweep(&self) -> Result<SweepReport, JobError> {
        let mut report = SweepReport::default();
        let mut cursor = None;

        while report.pages < self.config.max_pages {
            let page = self.next_page(cursor).await?;
            report.pages += 1;

            let Some(last) = page.last() else {
                break;
            };
            cursor = Some((last.expired_at, last.id));
            let full_page = page.len() as i64 >= self.config.page_size;

            for envelope in &page {
                report.scanned += 1;
                match self.distributor.refund(envelope).await {
                    Ok(RefundOutcome::Refunded(_)) => report.refunded += 1,
                    Ok(RefundOutcome::Skipped) => report.skipped += 1,
                    Err(e) if e.is_business_outcome() => {
                        report.failed += 1;
                        tracing::warn!(
                            envelope_no = %envelope.envelope_no,
                            error = %e,
                            "Expired envelope not refunded"
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(
                            envelope_no = %envelope.envelope_no,
                            error = %e,
                            "Failed to refund expired envelope"
                        );
                    }
                }
            }

            if !full_page {
                break;
            }
        }

        report.completed_at = Some(Utc::now());

        if report.scanned > 0 {
            tracing::info!(
                pages = report.pages,
                scanned = report.scanned,
                refunded = report.refunded,
                skipped = report.skipped,
                failed = report.failed,
                "Reclaim sweep finished"
            );
        }

        Ok(report)
    }

    async fn next_page(
        &self,
        cursor: Option<(DateTime<Utc>, i64)>,
    ) -> Result<Vec<Envelope>, JobError> {
        let mut conn = self.pool.acquire().await?;
        Ok(repository::find_expired_page(&mut conn, cursor, self.config.page_size).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reclaim_config_default() {
        let config = ReclaimConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.lock_name, "lock:RefundExpired");
        assert!(config.lock_lease < config.interval);
        assert_eq!(config.lock_tries, 3);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_pages, 50);
    }

    #[test]
    fn test_sweep_report_default() {
        let report = SweepReport::default();
        assert_eq!(report.refunded, 0);
        assert!(report.completed_at.is_none());
    }
}
