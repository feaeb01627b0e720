//! Scheduled Jobs
//!
//! Background jobs run on a timer next to the HTTP server.

mod reclaim;

pub use reclaim::{
    ExpiryReclaimer, ReclaimConfig, SweepReport, TickOutcome, RECLAIM_LOCK_NAME,
};

use tokio::time::{interval, MissedTickBehavior};

use crate::lock::LockError;

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

/// Job Scheduler - runs the expiry reclaim on its interval
pub struct JobScheduler {
    reclaimer: ExpiryReclaimer,
}

impl JobScheduler {
    pub fn new(reclaimer: ExpiryReclaimer) -> Self {
        Self { reclaimer }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let period = self.reclaimer.config().interval;
        tracing::info!(interval_secs = period.as_secs(), "Job scheduler started");

        let mut reclaim_interval = interval(period);
        // A sweep that overruns its interval must not trigger a burst of catch-up ticks
        reclaim_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            reclaim_interval.tick().await;
            if let Err(e) = self.reclaimer.tick().await {
                tracing::error!(error = %e, "Expiry reclaim failed");
            }
        }
    }

    /// Run one reclaim tick now (for manual trigger or testing)
    pub async fn run_once(&self) -> Result<TickOutcome, JobError> {
        self.reclaimer.tick().await
    }
}
