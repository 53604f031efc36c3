use crate::core::config::SchedulerConfig;
use crate::sync::{SyncCoordinator, SyncError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub misfire_grace: Duration,
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        SchedulerSettings {
            interval: config.interval(),
            misfire_grace: config.misfire_grace(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub at: DateTime<Utc>,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_seconds: u64,
    pub misfire_grace_seconds: u64,
    pub last_run: Option<LastRun>,
}

struct RunningJob {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodically runs today's daily sync.
///
/// Fires never overlap: a tick that comes due while a sync is running is
/// dropped, and a tick that is picked up later than the misfire grace is
/// skipped instead of run stale.
pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    settings: SchedulerSettings,
    job: Mutex<Option<RunningJob>>,
    last_run: Arc<Mutex<Option<LastRun>>>,
}

impl SyncScheduler {
    pub fn new(coordinator: Arc<SyncCoordinator>, settings: SchedulerSettings) -> Self {
        Self {
            coordinator,
            settings,
            job: Mutex::new(None),
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the periodic job. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        let mut job = self.job.lock().await;
        if job.is_some() {
            warn!("Scheduler is already running");
            return false;
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.coordinator),
            self.settings,
            Arc::clone(&self.last_run),
            shutdown_rx,
        ));
        *job = Some(RunningJob { shutdown, handle });
        info!(
            interval_seconds = self.settings.interval.as_secs(),
            misfire_grace_seconds = self.settings.misfire_grace.as_secs(),
            "Scheduler started"
        );
        true
    }

    /// Stops the periodic job, waiting for an in-flight sync to finish.
    /// Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let Some(job) = self.job.lock().await.take() else {
            warn!("Scheduler is not running");
            return false;
        };

        // The loop may already be gone; either way it is finished below
        let _ = job.shutdown.send(());
        if let Err(e) = job.handle.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
        info!("Scheduler stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.job.lock().await.is_some()
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running().await,
            interval_seconds: self.settings.interval.as_secs(),
            misfire_grace_seconds: self.settings.misfire_grace.as_secs(),
            last_run: self.last_run.lock().await.clone(),
        }
    }
}

async fn run_loop(
    coordinator: Arc<SyncCoordinator>,
    settings: SchedulerSettings,
    last_run: Arc<Mutex<Option<LastRun>>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            scheduled = ticker.tick() => {
                let now = Instant::now();
                if is_misfire(scheduled, now, settings.misfire_grace) {
                    warn!(
                        late_by_seconds = now.duration_since(scheduled).as_secs(),
                        "Skipping misfired scheduled sync"
                    );
                    continue;
                }

                debug!("Running scheduled daily sync");
                let outcome = match coordinator.daily_sync(None).await {
                    Ok(result) => format!(
                        "success: {} inserted, {} updated, {} total",
                        result.inserted, result.updated, result.total
                    ),
                    Err(SyncError::InProgress) => {
                        warn!("Scheduled sync dropped, another sync is running");
                        continue;
                    }
                    Err(e) => {
                        error!(error = %e, phase = e.phase(), "Scheduled sync failed");
                        format!("failed ({}): {}", e.phase(), e)
                    }
                };
                *last_run.lock().await = Some(LastRun {
                    at: Utc::now(),
                    outcome,
                });
            }
        }
    }
    debug!("Scheduler loop exited");
}

/// A fire picked up more than `grace` after it was due is stale.
fn is_misfire(scheduled: Instant, now: Instant, grace: Duration) -> bool {
    now.saturating_duration_since(scheduled) > grace
}
