//! Scheduled jobs for periodic maintenance tasks.

use std::sync::Arc;
use std::time::Duration;

use condo_common::{AppResult, config::SchedulerSettings};
use condo_core::VotingService;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval for the voting expiration sweep (default: 60 seconds).
    pub voting_expiration_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            voting_expiration_interval: Duration::from_secs(60),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            voting_expiration_interval: Duration::from_secs(
                settings.voting_expiration_interval_secs.max(1),
            ),
        }
    }
}

/// Job executor trait for scheduled jobs.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    /// Complete every open voting whose end time has passed.
    async fn expire_votings(&self) -> AppResult<u64>;
}

/// Runs scheduled jobs against the voting service.
#[derive(Clone)]
pub struct VotingJobExecutor {
    voting_service: VotingService,
}

impl VotingJobExecutor {
    /// Create an executor for the given voting service.
    #[must_use]
    pub const fn new(voting_service: VotingService) -> Self {
        Self { voting_service }
    }
}

#[async_trait::async_trait]
impl JobExecutor for VotingJobExecutor {
    async fn expire_votings(&self) -> AppResult<u64> {
        self.voting_service.expire_due_votings().await
    }
}

/// Spawn the scheduler; it runs until `shutdown` fires or its sender is
/// dropped.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(config.voting_expiration_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Voting expiration sweep stopped");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = executor.expire_votings().await {
                        tracing::error!(error = %e, "Failed to expire votings");
                    }
                }
            }
        }
    })
}
