//! Periodic removal of expired sessions
//!
//! Lazy expiry only deletes sessions that are read again; this job removes
//! the rest. Runs never overlap: a tick that finds the previous run still
//! going is skipped, not queued.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::rate_limiter::RateLimiter;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct SessionSweeper {
    sessions: SessionManager,
    limiter: Option<RateLimiter>,
    running: Arc<Mutex<()>>,
}

impl SessionSweeper {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions,
            limiter: None,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Also drop stale login limiter entries on each run.
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// One sweep. Returns `None` when skipped because a run is in progress
    /// or the store failed.
    pub async fn run_once(&self) -> Option<u64> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous session sweep still running, skipping this tick");
            return None;
        };

        if let Some(limiter) = &self.limiter {
            let pruned = limiter.prune().await;
            if pruned > 0 {
                info!("Pruned {} login limiter entries", pruned);
            }
        }

        // SessionManager::sweep logs the failure
        self.sessions.sweep().await.ok()
    }

    /// Register the sweep on a cron schedule and start the scheduler.
    ///
    /// The returned scheduler must be kept alive for the job to keep firing.
    pub async fn start(&self, schedule: &str) -> Result<JobScheduler> {
        let sweeper = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let sweeper = sweeper.clone();
            Box::pin(async move {
                sweeper.run_once().await;
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started session sweeper with schedule: {}", schedule);
        Ok(scheduler)
    }
}
