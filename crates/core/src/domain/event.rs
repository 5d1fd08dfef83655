// State transition events emitted by the dispatcher

use crate::domain::job::{JobId, JobState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single job-state transition.
///
/// Constructed via [`StateTransitionEvent::new`] and enriched with
/// [`message`](StateTransitionEvent::message). Ownership passes to the
/// [`StateNotifier`](crate::port::StateNotifier) on publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionEvent {
    pub job_id: JobId,
    pub state: JobState,
    pub message: Option<String>,
    pub emitted_at: DateTime<Utc>,
}

impl StateTransitionEvent {
    pub fn new(job_id: impl Into<JobId>, state: JobState) -> Self {
        Self {
            job_id: job_id.into(),
            state,
            message: None,
            emitted_at: Utc::now(),
        }
    }

    /// Attach a human-readable message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
