// Startup resume: re-trigger jobs that never started, settle interrupted ones
use crate::application::dispatcher::{JobDispatcher, RestoreOutcome};
use crate::application::worker::DispatchSender;
use crate::domain::JobState;
use crate::error::Result;
use crate::port::JobRepository;
use std::sync::Arc;
use tracing::info;

/// Jobs a previous run left mid-attempt
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    /// Asynchronous jobs whose outcome is awaited again
    pub awaiting: usize,
    /// Interrupted jobs marked FAILED
    pub failed: usize,
}

/// Resume service
///
/// On daemon startup, first takes over jobs a previous run left in
/// INITIALIZING or IN_PROGRESS, then submits a dispatch request for every
/// job still in CREATED (submitted while the daemon was down, or never
/// triggered). Terminal jobs are left alone; retries are an external policy.
pub struct ResumeService {
    job_repo: Arc<dyn JobRepository>,
    sender: DispatchSender,
}

impl ResumeService {
    pub fn new(job_repo: Arc<dyn JobRepository>, sender: DispatchSender) -> Self {
        Self { job_repo, sender }
    }

    /// Hand jobs interrupted by the previous run to `dispatcher`.
    ///
    /// Run before the worker accepts requests.
    pub async fn restore_interrupted_jobs(&self, dispatcher: &JobDispatcher) -> Result<RestoreReport> {
        let mut interrupted = self.job_repo.find_by_state(JobState::Initializing).await?;
        interrupted.extend(self.job_repo.find_by_state(JobState::InProgress).await?);

        let mut report = RestoreReport::default();
        for job in &interrupted {
            match dispatcher.restore_interrupted(job) {
                RestoreOutcome::Awaiting => report.awaiting += 1,
                RestoreOutcome::Failed => report.failed += 1,
            }
        }
        info!(
            awaiting = report.awaiting,
            failed = report.failed,
            "Restored jobs interrupted by previous run"
        );
        Ok(report)
    }

    /// Submit every CREATED job, oldest first
    ///
    /// # Returns
    /// Number of jobs submitted
    pub async fn resume_created_jobs(&self) -> Result<usize> {
        let created = self.job_repo.find_by_state(JobState::Created).await?;
        info!(pending = created.len(), "Resuming jobs awaiting dispatch");

        let mut submitted = 0;
        for job in created {
            self.sender.submit(job.id).await?;
            submitted += 1;
        }
        Ok(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::INTERRUPTED_MESSAGE;
    use crate::application::worker::dispatch_channel;
    use crate::application::AsyncOutcome;
    use crate::domain::{Job, StateTransitionEvent};
    use crate::port::job_store::mocks::InMemoryJobRepository;
    use crate::port::state_notifier::mocks::RecordingNotifier;
    use crate::provider::mocks::{register_scripted_async, register_scripted_sync, Script};
    use crate::provider::ProviderRegistry;

    fn moved_to(mut job: Job, states: &[JobState]) -> Job {
        for (i, state) in states.iter().enumerate() {
            let event = StateTransitionEvent::new(job.id.clone(), *state);
            job.apply(&event, 10 + i as i64).unwrap();
        }
        job
    }

    #[tokio::test]
    async fn test_only_created_jobs_are_submitted() {
        let first = Job::new_test("scanner");
        let second = Job::new_test("scanner");
        let mut done = Job::new_test("scanner");
        done.apply(&StateTransitionEvent::new(done.id.clone(), JobState::Failed), 1)
            .unwrap();

        let repo = Arc::new(InMemoryJobRepository::with_jobs([
            second.clone(),
            done,
            first.clone(),
        ]));
        let (sender, mut rx) = dispatch_channel(8);

        let count = ResumeService::new(repo, sender).resume_created_jobs().await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(rx.recv().await.unwrap().job_id, first.id);
        assert_eq!(rx.recv().await.unwrap().job_id, second.id);
    }

    #[tokio::test]
    async fn test_interrupted_jobs_are_restored() {
        let mut registry = ProviderRegistry::new();
        register_scripted_sync(&mut registry, "scanner", Script::default());
        register_scripted_async(&mut registry, "remote-scan", Script::default());

        let remote = moved_to(
            Job::new_test("remote-scan"),
            &[JobState::Initializing, JobState::InProgress],
        );
        let local = moved_to(
            Job::new_test("scanner"),
            &[JobState::Initializing, JobState::InProgress],
        );
        let half_started = moved_to(Job::new_test("remote-scan"), &[JobState::Initializing]);
        let finished = moved_to(
            Job::new_test("scanner"),
            &[JobState::Initializing, JobState::InProgress, JobState::Completed],
        );

        let repo = Arc::new(InMemoryJobRepository::with_jobs([
            remote.clone(),
            local.clone(),
            half_started.clone(),
            finished.clone(),
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = JobDispatcher::new(repo.clone(), Arc::new(registry), notifier.clone());
        let (sender, _rx) = dispatch_channel(8);

        let report = ResumeService::new(repo, sender)
            .restore_interrupted_jobs(&dispatcher)
            .await
            .unwrap();

        assert_eq!(report, RestoreReport { awaiting: 1, failed: 2 });
        assert!(dispatcher.is_awaiting_outcome(&remote.id));
        assert!(notifier.events_for(&remote.id).is_empty());
        assert!(notifier.events_for(&finished.id).is_empty());
        for job in [&local, &half_started] {
            let events = notifier.events_for(&job.id);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].state, JobState::Failed);
            assert_eq!(events[0].message.as_deref(), Some(INTERRUPTED_MESSAGE));
        }

        dispatcher
            .apply_async_outcome(&remote.id, AsyncOutcome::Completed)
            .unwrap();
        assert_eq!(notifier.states_for(&remote.id), vec![JobState::Completed]);
        assert!(dispatcher
            .apply_async_outcome(&remote.id, AsyncOutcome::Completed)
            .is_err());
    }
}
