//! State Notifier port.
//!
//! The dispatcher announces every job-state transition through a
//! [`StateNotifier`]. Delivery is fire-and-forget: `publish` returns nothing,
//! so transport failures stay inside the notifier.

use crate::domain::StateTransitionEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Fire-and-forget transition sink
pub trait StateNotifier: Send + Sync {
    /// Publish a transition. Must not panic or block on delivery.
    fn publish(&self, event: StateTransitionEvent);
}

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out notifier backed by a `tokio::sync::broadcast` channel.
///
/// Every subscriber independently receives every event. When the buffer is
/// full the oldest un-consumed events are dropped and slow receivers observe
/// `RecvError::Lagged`.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<StateTransitionEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StateTransitionEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StateNotifier for BroadcastNotifier {
    fn publish(&self, event: StateTransitionEvent) {
        let job_id = event.job_id.clone();
        // SendError only means there are zero receivers.
        if self.sender.send(event).is_err() {
            trace!(job_id = %job_id, "No subscribers, transition dropped");
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{JobId, JobState};
    use std::sync::Mutex;

    /// Notifier that records every event in publish order
    #[derive(Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<StateTransitionEvent>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<StateTransitionEvent> {
            self.events.lock().unwrap().clone()
        }

        /// Events for one job
        pub fn events_for(&self, job_id: &JobId) -> Vec<StateTransitionEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| &e.job_id == job_id)
                .cloned()
                .collect()
        }

        /// State sequence for one job
        pub fn states_for(&self, job_id: &JobId) -> Vec<JobState> {
            self.events_for(job_id).into_iter().map(|e| e.state).collect()
        }

        pub fn terminal_count(&self, job_id: &JobId) -> usize {
            self.events_for(job_id)
                .iter()
                .filter(|e| e.is_terminal())
                .count()
        }
    }

    impl StateNotifier for RecordingNotifier {
        fn publish(&self, event: StateTransitionEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
