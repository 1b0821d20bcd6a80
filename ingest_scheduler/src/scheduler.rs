//! Calendar-driven ingestion.
//!
//! A cron job evaluated in the exchange time zone triggers
//! [`Ingestor::run_cycle`]; optionally one cycle also runs right at start.
//! Cycles are independent: a failed one is logged and the next trigger runs
//! as usual. Overlapping cycles are not suppressed, since writes are
//! idempotent upserts.

use std::sync::Arc;

use market_data_ingestor::tz::MARKET_TZ;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cycle::Ingestor;

/// Weekdays at 16:30 exchange time.
pub const DEFAULT_CRON: &str = "0 30 16 * * Mon-Fri";

/// Errors raised while starting or stopping the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The cron expression was rejected.
    #[error("invalid cron expression {expr:?}: {source}")]
    InvalidCron {
        /// The rejected expression.
        expr: String,
        /// Parser error.
        #[source]
        source: JobSchedulerError,
    },

    /// The underlying job scheduler failed.
    #[error("job scheduler error: {0}")]
    Jobs(#[from] JobSchedulerError),
}

fn cycle_job(cron: &str, ingestor: Arc<Ingestor>) -> Result<Job, SchedulerError> {
    Job::new_async_tz(cron, MARKET_TZ, move |_id, _jobs| {
        let ingestor = Arc::clone(&ingestor);
        Box::pin(async move {
            // Outcome is logged by the cycle itself.
            let _ = ingestor.run_cycle().await;
        })
    })
    .map_err(|source| SchedulerError::InvalidCron {
        expr: cron.to_string(),
        source,
    })
}

/// Owns the cron job and the optional startup cycle.
pub struct Scheduler {
    jobs: JobScheduler,
    ingestor: Arc<Ingestor>,
    cron: String,
    run_on_start: bool,
    job: Option<Uuid>,
    startup: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Prepares a scheduler; nothing runs until [`Scheduler::start`].
    ///
    /// The cron expression is checked here so a typo fails at startup.
    pub async fn new(
        ingestor: Arc<Ingestor>,
        cron: impl Into<String>,
        run_on_start: bool,
    ) -> Result<Self, SchedulerError> {
        let cron = cron.into();
        cycle_job(&cron, Arc::clone(&ingestor))?;
        Ok(Self {
            jobs: JobScheduler::new().await?,
            ingestor,
            cron,
            run_on_start,
            job: None,
            startup: None,
        })
    }

    /// Registers the cron job, starts the timer and kicks off the startup cycle.
    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        let job = cycle_job(&self.cron, Arc::clone(&self.ingestor))?;
        let id = self.jobs.add(job).await?;
        self.jobs.start().await?;

        match self.jobs.next_tick_for_job(id).await {
            Ok(Some(next)) => info!(
                cron = %self.cron,
                next_run = %next.with_timezone(&MARKET_TZ),
                "scheduler started"
            ),
            _ => info!(cron = %self.cron, "scheduler started"),
        }
        self.job = Some(id);

        if self.run_on_start {
            let ingestor = Arc::clone(&self.ingestor);
            self.startup = Some(tokio::spawn(async move {
                let _ = ingestor.run_cycle().await;
            }));
        }
        Ok(())
    }

    /// Stops the timer. A cycle already in flight is allowed to finish.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        self.jobs.shutdown().await?;
        if let Some(startup) = self.startup.take() {
            if let Err(e) = startup.await {
                warn!(error = %e, "startup cycle did not finish cleanly");
            }
        }
        if let Some(job) = self.job.take() {
            info!(job = %job, "scheduler stopped");
        }
        Ok(())
    }
}
