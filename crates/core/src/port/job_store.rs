// Job Store Port (Interface)

use crate::domain::{Identity, Job, JobId, JobState};
use crate::error::{AppError, Result};
use async_trait::async_trait;

/// Read-only view of the Job Store used by the dispatcher
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a job on behalf of `identity`
    ///
    /// # Errors
    /// - AppError::NotFound if no job has this ID
    /// - AppError::PermissionDenied if `identity` may not read the job
    async fn get(&self, id: &JobId, identity: &Identity) -> Result<Job>;
}

/// Full persistence interface, used by the transition recorder and the host
#[async_trait]
pub trait JobRepository: JobStore {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID (no identity check)
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Update job
    async fn update(&self, job: &Job) -> Result<()>;

    /// Find all jobs in a state, oldest first
    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>>;
}

/// Shared `get` semantics for adapters: existence then identity check
pub fn authorize(id: &JobId, job: Option<Job>, identity: &Identity) -> Result<Job> {
    let job = job.ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
    if !identity.can_read(job.owner.as_deref()) {
        return Err(AppError::PermissionDenied(format!(
            "{} may not read job {}",
            identity, id
        )));
    }
    Ok(job)
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory job repository for testing
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<HashMap<JobId, Job>>,
        fail_reads: AtomicBool,
        get_count: AtomicUsize,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Repository pre-populated with jobs
        pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
            let repo = Self::new();
            {
                let mut map = repo.jobs.lock().unwrap();
                for job in jobs {
                    map.insert(job.id.clone(), job);
                }
            }
            repo
        }

        /// Make every `get` fail with a database error
        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        pub fn get_count(&self) -> usize {
            self.get_count.load(Ordering::SeqCst)
        }

        pub fn snapshot(&self, id: &str) -> Option<Job> {
            self.jobs.lock().unwrap().get(id).cloned()
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobRepository {
        async fn get(&self, id: &JobId, identity: &Identity) -> Result<Job> {
            self.get_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::Database("store unavailable".to_string()));
            }
            let job = self.jobs.lock().unwrap().get(id).cloned();
            authorize(id, job, identity)
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.contains_key(&job.id) {
                return Err(AppError::Database(format!(
                    "Unique constraint violation: job {}",
                    job.id
                )));
            }
            jobs.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn update(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(&job.id) {
                Some(existing) => {
                    *existing = job.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("Job {} not found", job.id))),
            }
        }

        async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
            let mut jobs: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|job| job.state == state)
                .cloned()
                .collect();
            jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(jobs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::InMemoryJobRepository;
    use super::*;

    #[tokio::test]
    async fn test_get_missing_job_is_not_found() {
        let repo = InMemoryJobRepository::new();
        let err = repo
            .get(&"missing".to_string(), &Identity::System)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_checks_identity() {
        let job = Job::new_test("sync").with_owner("alice");
        let id = job.id.clone();
        let repo = InMemoryJobRepository::with_jobs([job]);

        assert!(repo.get(&id, &Identity::System).await.is_ok());
        assert!(repo
            .get(&id, &Identity::Account("alice".to_string()))
            .await
            .is_ok());

        let err = repo
            .get(&id, &Identity::Account("mallory".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_find_by_state_orders_by_creation() {
        let first = Job::new_test("sync");
        let second = Job::new_test("sync");
        let repo = InMemoryJobRepository::with_jobs([second.clone(), first.clone()]);

        let created = repo.find_by_state(JobState::Created).await.unwrap();
        let ids: Vec<_> = created.iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }
}
