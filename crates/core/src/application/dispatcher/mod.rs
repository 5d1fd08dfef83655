//! Job dispatch core.
//!
//! One attempt drives a job through resolve, initialize, availability check
//! and execution, announcing each boundary through the [`StateNotifier`].
//! Every failure inside the attempt ends as exactly one `FAILED` transition;
//! nothing escapes to the caller.

mod in_flight;
mod panic_guard;

pub use in_flight::{AttemptToken, Claim, InFlight};
pub use panic_guard::{execute_guarded, panic_message, PanicGuardResult};

use crate::domain::{Identity, Job, JobId, JobState, StateTransitionEvent};
use crate::error::{AppError, Result};
use crate::port::{JobStore, StateNotifier};
use crate::provider::{ExecutionMode, ProviderInstance, ProviderRegistry, ResolvedProvider};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How a dispatch attempt ended, as seen by the trigger caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Synchronous provider reported success
    Completed,
    /// Synchronous provider reported failure
    ExecutionFailed,
    /// `initialize` returned false
    InitializationFailed,
    /// `is_available` returned false
    Unavailable,
    /// Asynchronous provider launched; the outcome arrives via the re-entry hook
    Launched,
    /// Contained error; the job was marked FAILED with this message
    Errored(String),
}

impl AttemptOutcome {
    /// Terminal state emitted by this attempt, if any
    pub fn terminal_state(&self) -> Option<JobState> {
        match self {
            AttemptOutcome::Completed => Some(JobState::Completed),
            AttemptOutcome::Unavailable => Some(JobState::Unavailable),
            AttemptOutcome::ExecutionFailed
            | AttemptOutcome::InitializationFailed
            | AttemptOutcome::Errored(_) => Some(JobState::Failed),
            AttemptOutcome::Launched => None,
        }
    }
}

/// Outcome reported for an asynchronous job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncOutcome {
    Completed,
    Failed(Option<String>),
}

/// Message recorded on jobs a restart interrupted
pub const INTERRUPTED_MESSAGE: &str = "Interrupted by daemon restart";

/// What happened to a job left mid-attempt by a previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Asynchronous job awaiting its outcome through the re-entry hook
    Awaiting,
    /// Marked FAILED
    Failed,
}

/// Dispatches jobs to providers.
///
/// Cheap to clone; clones share the registry, store, notifier and the set of
/// asynchronous jobs awaiting an outcome.
#[derive(Clone)]
pub struct JobDispatcher {
    store: Arc<dyn JobStore>,
    registry: Arc<ProviderRegistry>,
    notifier: Arc<dyn StateNotifier>,
    in_flight: Arc<InFlight>,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<ProviderRegistry>,
        notifier: Arc<dyn StateNotifier>,
    ) -> Self {
        Self {
            store,
            registry,
            notifier,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Run one dispatch attempt for `job_id`.
    ///
    /// Always returns normally. Errors and provider panics become a single
    /// `FAILED` transition and [`AttemptOutcome::Errored`].
    pub async fn dispatch(&self, job_id: &JobId) -> AttemptOutcome {
        info!(job_id = %job_id, "Job is being processed");

        let token = self.in_flight.next_attempt();
        let this = self.clone();
        let id = job_id.clone();
        let outcome = match execute_guarded(async move { this.attempt(&id, token).await }).await {
            PanicGuardResult::Success(Ok(outcome)) => outcome,
            PanicGuardResult::Success(Err(e)) => self.contain(job_id, token, e.to_string()),
            PanicGuardResult::Panicked(msg) => self.contain(job_id, token, msg),
        };

        debug!(job_id = %job_id, outcome = ?outcome, "Dispatch attempt finished");
        outcome
    }

    /// Re-entry hook for asynchronous providers.
    ///
    /// Emits exactly one terminal transition for a job this dispatcher
    /// launched. A second report, or a report for a job that was never
    /// launched here, is rejected and emits nothing.
    pub fn apply_async_outcome(&self, job_id: &JobId, outcome: AsyncOutcome) -> Result<()> {
        if self.in_flight.claim(job_id) == Claim::Rejected {
            warn!(job_id = %job_id, outcome = ?outcome, "Rejected outcome for job not awaiting one");
            return Err(AppError::InvalidState(format!(
                "Job {} is not awaiting an asynchronous outcome",
                job_id
            )));
        }

        let event = match outcome {
            AsyncOutcome::Completed => StateTransitionEvent::new(job_id.clone(), JobState::Completed),
            AsyncOutcome::Failed(message) => {
                let event = StateTransitionEvent::new(job_id.clone(), JobState::Failed);
                match message {
                    Some(message) => event.message(message),
                    None => event,
                }
            }
        };
        info!(job_id = %job_id, state = %event.state, "Asynchronous job finished");
        self.emit(event);
        Ok(())
    }

    /// Whether the job is launched and waiting for the re-entry hook
    pub fn is_awaiting_outcome(&self, job_id: &JobId) -> bool {
        self.in_flight.is_awaiting(job_id)
    }

    /// Take over a job a previous run left mid-attempt.
    ///
    /// An `IN_PROGRESS` job of an asynchronous provider is awaited again, so
    /// the re-entry hook can still settle it. Any other interrupted job is
    /// failed.
    pub fn restore_interrupted(&self, job: &Job) -> RestoreOutcome {
        let asynchronous = matches!(
            self.registry.describe(&job.provider),
            Ok(descriptor) if descriptor.mode == ExecutionMode::Asynchronous
        );

        if job.state == JobState::InProgress && asynchronous {
            self.in_flight.adopt(&job.id);
            info!(job_id = %job.id, provider = %job.provider, "Awaiting outcome of asynchronous job from previous run");
            return RestoreOutcome::Awaiting;
        }

        warn!(job_id = %job.id, state = %job.state, "Failing job interrupted by restart");
        self.emit(
            StateTransitionEvent::new(job.id.clone(), JobState::Failed)
                .message(INTERRUPTED_MESSAGE),
        );
        RestoreOutcome::Failed
    }

    /// Ask the job's provider whether an in-flight run can be canceled.
    ///
    /// For external cancellation flows; builds a fresh provider instance.
    pub async fn is_cancelable(&self, job_id: &JobId) -> Result<bool> {
        let job = self.store.get(job_id, &Identity::System).await?;
        let resolved = self.registry.resolve(&job)?;
        Ok(resolved.instance.is_cancelable(&job).await?)
    }

    /// Steps 1-4 of an attempt. Any `Err` is turned into FAILED by the caller.
    async fn attempt(&self, job_id: &JobId, token: AttemptToken) -> Result<AttemptOutcome> {
        let job = self.store.get(job_id, &Identity::System).await?;

        let ResolvedProvider {
            descriptor,
            mut instance,
        } = self.registry.resolve(&job)?;
        let name = instance.name().to_string();
        debug!(
            job_id = %job_id,
            provider_id = %descriptor.id,
            implementation = %descriptor.implementation,
            mode = %descriptor.mode,
            "Resolved provider"
        );

        if !instance.initialize(&job).await? {
            warn!(job_id = %job_id, provider = %name, "Provider failed to initialize");
            self.emit(
                StateTransitionEvent::new(job_id.clone(), JobState::Failed)
                    .message(format!("Unable to initialize {}", name)),
            );
            return Ok(AttemptOutcome::InitializationFailed);
        }
        self.emit(
            StateTransitionEvent::new(job_id.clone(), JobState::Initializing)
                .message(format!("Initialized {}", name)),
        );

        if !instance.is_available(&job).await? {
            info!(job_id = %job_id, provider = %name, "Provider unavailable");
            self.emit(StateTransitionEvent::new(job_id.clone(), JobState::Unavailable));
            return Ok(AttemptOutcome::Unavailable);
        }
        self.emit(StateTransitionEvent::new(job_id.clone(), JobState::InProgress));

        match instance {
            ProviderInstance::Asynchronous(provider) => {
                self.in_flight.begin_launch(job_id, token);
                provider.process(&job).await?;
                self.in_flight.finish_launch(job_id, token);
                info!(job_id = %job_id, provider = %name, "Asynchronous job launched");
                Ok(AttemptOutcome::Launched)
            }
            ProviderInstance::Synchronous(provider) => {
                if provider.process(&job).await? {
                    info!(job_id = %job_id, provider = %name, "Job completed");
                    self.emit(StateTransitionEvent::new(job_id.clone(), JobState::Completed));
                    Ok(AttemptOutcome::Completed)
                } else {
                    warn!(job_id = %job_id, provider = %name, "Job failed");
                    self.emit(StateTransitionEvent::new(job_id.clone(), JobState::Failed));
                    Ok(AttemptOutcome::ExecutionFailed)
                }
            }
        }
    }

    /// The single error-containment point of the execution path
    fn contain(&self, job_id: &JobId, token: AttemptToken, message: String) -> AttemptOutcome {
        error!(job_id = %job_id, error = %message, "Job dispatch failed");
        // A failed async launch may already have been settled by the hook.
        if self.in_flight.abort_launch(job_id, token) {
            self.emit(StateTransitionEvent::new(job_id.clone(), JobState::Failed).message(message.clone()));
        }
        AttemptOutcome::Errored(message)
    }

    fn emit(&self, event: StateTransitionEvent) {
        debug!(job_id = %event.job_id, state = %event.state, message = ?event.message, "Publishing transition");
        self.notifier.publish(event);
    }
}
