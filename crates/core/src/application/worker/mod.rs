// Worker - dispatch request loop

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::dispatcher::{AttemptOutcome, JobDispatcher};
use crate::domain::JobId;
use crate::error::{AppError, Result};
use constants::*;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Inbound trigger: "process this job"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub job_id: JobId,
}

/// Handle for submitting dispatch requests to a [`DispatchWorker`]
#[derive(Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<DispatchRequest>,
}

impl DispatchSender {
    /// Queue a job for dispatch (waits while the buffer is full)
    pub async fn submit(&self, job_id: impl Into<JobId>) -> Result<()> {
        let request = DispatchRequest {
            job_id: job_id.into(),
        };
        self.tx
            .send(request)
            .await
            .map_err(|e| {
                AppError::Internal(format!("Dispatch worker stopped: job {}", e.0.job_id))
            })
    }
}

/// Create the request channel feeding a worker
pub fn dispatch_channel(buffer: usize) -> (DispatchSender, mpsc::Receiver<DispatchRequest>) {
    let (tx, rx) = mpsc::channel(buffer);
    (DispatchSender { tx }, rx)
}

/// Runs dispatch attempts for inbound requests.
///
/// Each attempt gets its own tokio task. At most `max_concurrent` attempts
/// run at once; further requests wait in the channel.
pub struct DispatchWorker {
    dispatcher: JobDispatcher,
    max_concurrent: usize,
}

impl DispatchWorker {
    pub fn new(dispatcher: JobDispatcher, max_concurrent: usize) -> Self {
        Self {
            dispatcher,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn with_defaults(dispatcher: JobDispatcher) -> Self {
        Self::new(dispatcher, DEFAULT_MAX_CONCURRENT_DISPATCHES)
    }

    /// Run until shutdown is signalled or every sender is dropped.
    ///
    /// In-flight attempts are drained before returning.
    pub async fn run(
        &self,
        mut requests: mpsc::Receiver<DispatchRequest>,
        mut shutdown: ShutdownToken,
    ) -> Result<()> {
        info!(max_concurrent = self.max_concurrent, "Dispatch worker started");
        let slots = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        loop {
            if shutdown.is_shutdown() {
                info!("Dispatch worker shutting down");
                break;
            }

            // Wait for a free slot first so requests stay queued under load
            let permit = tokio::select! {
                permit = Arc::clone(&slots).acquire_owned() => permit
                    .map_err(|e| AppError::Internal(format!("Dispatch slots closed: {}", e)))?,
                _ = shutdown.wait() => {
                    info!("Dispatch worker interrupted while saturated");
                    break;
                }
            };

            let request = tokio::select! {
                request = requests.recv() => request,
                _ = shutdown.wait() => {
                    info!("Dispatch worker interrupted while idle");
                    break;
                }
            };

            let Some(DispatchRequest { job_id }) = request else {
                info!("Dispatch request channel closed");
                break;
            };

            let dispatcher = self.dispatcher.clone();
            tasks.spawn(async move {
                let _permit = permit;
                dispatcher.dispatch(&job_id).await
            });

            // Reap whatever already finished
            while let Some(joined) = tasks.try_join_next() {
                Self::log_joined(joined);
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Draining in-flight dispatch attempts");
        }
        while let Some(joined) = tasks.join_next().await {
            Self::log_joined(joined);
        }

        info!("Dispatch worker stopped");
        Ok(())
    }

    fn log_joined(joined: std::result::Result<AttemptOutcome, JoinError>) {
        match joined {
            Ok(outcome) => debug!(outcome = ?outcome, "Dispatch task finished"),
            // dispatch() contains its own panics; this is the task being aborted
            Err(e) if e.is_cancelled() => warn!(error = %e, "Dispatch task cancelled"),
            Err(e) => error!(error = %e, "Dispatch task failed"),
        }
    }
}
