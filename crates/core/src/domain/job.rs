// Job Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::event::StateTransitionEvent;
use serde::{Deserialize, Serialize};

/// Job ID (assigned by the submitting host)
pub type JobId = String;

/// Job lifecycle state
///
/// CREATED -> INITIALIZING -> IN_PROGRESS -> COMPLETED | FAILED
/// INITIALIZING -> UNAVAILABLE | FAILED
/// CREATED -> FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    Initializing,
    InProgress,
    Completed,
    Failed,
    Unavailable,
}

impl JobState {
    /// Terminal states never change once reached
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Unavailable
        )
    }

    /// Whether `next` is a forward move from `self` in the lifecycle graph.
    ///
    /// A non-terminal state may be re-announced (message-only refresh).
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (current, next) if *current == next => !current.is_terminal(),
            (Created, Initializing) | (Created, Failed) => true,
            (Initializing, InProgress) | (Initializing, Unavailable) | (Initializing, Failed) => {
                true
            }
            (InProgress, Completed) | (InProgress, Failed) => true,
            _ => false,
        }
    }

    /// Parse the persisted SCREAMING_SNAKE_CASE form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(JobState::Created),
            "INITIALIZING" => Some(JobState::Initializing),
            "IN_PROGRESS" => Some(JobState::InProgress),
            "COMPLETED" => Some(JobState::Completed),
            "FAILED" => Some(JobState::Failed),
            "UNAVAILABLE" => Some(JobState::Unavailable),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Created => write!(f, "CREATED"),
            JobState::Initializing => write!(f, "INITIALIZING"),
            JobState::InProgress => write!(f, "IN_PROGRESS"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Unavailable => write!(f, "UNAVAILABLE"),
        }
    }
}

/// Job Payload (JSON handed to the provider)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(serde_json::json!({}))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Declared provider identifier (registry key)
    pub provider: String,
    pub state: JobState,
    pub message: Option<String>,
    /// Owning account, None for system-submitted jobs
    pub owner: Option<String>,
    pub payload: JobPayload,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl Job {
    /// Create a new job in CREATED state
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `provider` - Declared provider identifier
    /// * `payload` - Job payload
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        provider: impl Into<String>,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            state: JobState::Created,
            message: None,
            owner: None,
            payload,
            created_at,
            updated_at: created_at,
            started_at: None,
            finished_at: None,
        }
    }

    /// Create a test job with deterministic ID and timestamp.
    ///
    /// Uses a simple counter for deterministic test IDs (test-1, test-2, ...).
    ///
    /// **Note**: Production code should inject ID and time via providers.
    pub fn new_test(provider: impl Into<String>) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(id, created_at, provider, JobPayload::empty())
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Apply a transition event with explicit timestamp.
    ///
    /// Rejects backward moves and any change to a terminal state. A missing
    /// event message keeps the current one.
    pub fn apply(&mut self, event: &StateTransitionEvent, now_millis: i64) -> Result<()> {
        if event.job_id != self.id {
            return Err(DomainError::ValidationError(format!(
                "event for job {} applied to job {}",
                event.job_id, self.id
            )));
        }
        if !self.state.can_transition_to(event.state) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: event.state.to_string(),
            });
        }

        self.state = event.state;
        if let Some(message) = &event.message {
            self.message = Some(message.clone());
        }
        if event.state == JobState::InProgress && self.started_at.is_none() {
            self.started_at = Some(now_millis);
        }
        if event.state.is_terminal() {
            self.finished_at = Some(now_millis);
        }
        self.updated_at = now_millis;
        Ok(())
    }
}
