//! Shared helpers for the end-to-end dispatch tests

#![allow(dead_code)]

use jobrelay_core::domain::{Job, JobId, JobPayload, JobState};
use jobrelay_core::port::JobRepository;
use jobrelay_daemon::{DaemonConfig, LogFormat};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// In-memory store, small buffers
pub fn memory_config() -> DaemonConfig {
    DaemonConfig {
        db_path: "sqlite::memory:".to_string(),
        max_concurrent_dispatches: 4,
        event_buffer: 256,
        log_format: LogFormat::Pretty,
    }
}

pub fn job(id: &str, created_at: i64, provider: &str) -> Job {
    Job::new(
        id,
        created_at,
        provider,
        JobPayload::new(serde_json::json!({"target": format!("{}.tar.gz", id)})),
    )
}

/// Poll the store until the job reaches `state`
pub async fn wait_for_state(repo: &dyn JobRepository, id: &JobId, state: JobState) -> Job {
    let polled = tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            if let Some(job) = repo.find_by_id(id).await.unwrap() {
                if job.state == state {
                    return job;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await;

    match polled {
        Ok(job) => job,
        Err(_) => {
            let current = repo.find_by_id(id).await.unwrap().map(|j| j.state);
            panic!("job {} never reached {}, last seen {:?}", id, state, current);
        }
    }
}

/// Let background tasks settle, for asserting that nothing else happens
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
