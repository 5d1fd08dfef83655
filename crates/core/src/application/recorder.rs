//! Transition recorder.
//!
//! [`TransitionRecorder`] subscribes to the [`BroadcastNotifier`] and applies
//! every [`StateTransitionEvent`] to the [`JobRepository`]. This is the only
//! writer of job state; the dispatcher never touches the store directly.
//!
//! [`BroadcastNotifier`]: crate::port::BroadcastNotifier

use crate::application::worker::ShutdownToken;
use crate::domain::StateTransitionEvent;
use crate::error::{AppError, Result};
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Background service persisting transitions
pub struct TransitionRecorder {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl TransitionRecorder {
    pub fn new(job_repo: Arc<dyn JobRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            job_repo,
            time_provider,
        }
    }

    /// Run the recording loop.
    ///
    /// Events are applied one at a time in arrival order, which keeps each
    /// job's transitions ordered. Exits when the notifier is dropped or
    /// shutdown is signalled; events already buffered are applied first.
    pub async fn run(
        &self,
        mut receiver: broadcast::Receiver<StateTransitionEvent>,
        mut shutdown: ShutdownToken,
    ) {
        info!("Transition recorder started");
        loop {
            let received = tokio::select! {
                biased;
                received = receiver.recv() => received,
                _ = shutdown.wait() => {
                    self.drain(&mut receiver).await;
                    break;
                }
            };

            match received {
                Ok(event) => self.record(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Transition recorder lagged, some transitions were not recorded");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Notifier closed, transition recorder shutting down");
                    break;
                }
            }
        }
        info!("Transition recorder stopped");
    }

    async fn drain(&self, receiver: &mut broadcast::Receiver<StateTransitionEvent>) {
        while let Ok(event) = receiver.try_recv() {
            self.record(&event).await;
        }
    }

    async fn record(&self, event: &StateTransitionEvent) {
        if let Err(e) = self.apply(event).await {
            error!(
                job_id = %event.job_id,
                state = %event.state,
                error = %e,
                "Failed to record transition"
            );
        }
    }

    /// Apply a single transition to the stored job
    ///
    /// # Errors
    /// - AppError::NotFound if the job does not exist
    /// - AppError::Domain if the transition moves the job backward
    pub async fn apply(&self, event: &StateTransitionEvent) -> Result<()> {
        let mut job = self
            .job_repo
            .find_by_id(&event.job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", event.job_id)))?;

        let from = job.state;
        job.apply(event, self.time_provider.now_millis())?;
        self.job_repo.update(&job).await?;

        debug!(job_id = %job.id, from = %from, to = %job.state, "Transition recorded");
        Ok(())
    }
}
