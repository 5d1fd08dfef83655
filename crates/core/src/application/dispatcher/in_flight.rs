// Tracking of asynchronous jobs awaiting their outcome

use crate::domain::JobId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Identifies one dispatch attempt.
///
/// Launch bookkeeping only ever touches the slot its own attempt created, so
/// an early failure in a later attempt cannot disturb an earlier launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// `process` has been called and has not returned yet
    Launching,
    /// `process` returned; waiting for the re-entry hook
    Launched,
    /// The hook fired before `process` returned
    SettledWhileLaunching,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    /// None for jobs adopted from a previous run
    owner: Option<AttemptToken>,
    slot: Slot,
}

/// What the re-entry hook is allowed to do
#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    /// Emit the terminal transition
    Granted,
    /// Unknown job or already settled
    Rejected,
}

/// Per-dispatcher registry of asynchronous jobs.
///
/// Guarantees at most one terminal transition per launched job, whether it
/// comes from the re-entry hook or from a failed launch.
#[derive(Debug, Default)]
pub struct InFlight {
    slots: Mutex<HashMap<JobId, Entry>>,
    next_token: AtomicU64,
}

impl InFlight {
    /// Token for a new dispatch attempt
    pub fn next_attempt(&self) -> AttemptToken {
        AttemptToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Record a job before its provider's `process` is called
    pub fn begin_launch(&self, job_id: &JobId, token: AttemptToken) {
        self.lock().insert(
            job_id.clone(),
            Entry {
                owner: Some(token),
                slot: Slot::Launching,
            },
        );
    }

    /// `process` returned normally
    pub fn finish_launch(&self, job_id: &JobId, token: AttemptToken) {
        let mut slots = self.lock();
        let Some(entry) = slots.get_mut(job_id) else {
            return;
        };
        if entry.owner != Some(token) {
            return;
        }
        match entry.slot {
            Slot::SettledWhileLaunching => {
                slots.remove(job_id);
            }
            _ => entry.slot = Slot::Launched,
        }
    }

    /// Attempt `token` failed. Returns true when the failure should be
    /// announced, false when the hook already settled this attempt's launch.
    ///
    /// Slots owned by other attempts are left alone.
    pub fn abort_launch(&self, job_id: &JobId, token: AttemptToken) -> bool {
        let mut slots = self.lock();
        match slots.get(job_id) {
            Some(entry) if entry.owner == Some(token) => {
                let settled = entry.slot == Slot::SettledWhileLaunching;
                slots.remove(job_id);
                !settled
            }
            _ => true,
        }
    }

    /// Await the outcome of a job launched by a previous run.
    ///
    /// Returns false if the job is already tracked.
    pub fn adopt(&self, job_id: &JobId) -> bool {
        let mut slots = self.lock();
        if slots.contains_key(job_id) {
            return false;
        }
        slots.insert(
            job_id.clone(),
            Entry {
                owner: None,
                slot: Slot::Launched,
            },
        );
        true
    }

    /// Claim the right to emit the terminal transition for a job
    pub fn claim(&self, job_id: &JobId) -> Claim {
        let mut slots = self.lock();
        let Some(entry) = slots.get_mut(job_id) else {
            return Claim::Rejected;
        };
        match entry.slot {
            Slot::Launched => {
                slots.remove(job_id);
                Claim::Granted
            }
            Slot::Launching => {
                entry.slot = Slot::SettledWhileLaunching;
                Claim::Granted
            }
            Slot::SettledWhileLaunching => Claim::Rejected,
        }
    }

    pub fn is_awaiting(&self, job_id: &JobId) -> bool {
        matches!(
            self.lock().get(job_id).map(|e| e.slot),
            Some(Slot::Launching) | Some(Slot::Launched)
        )
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, Entry>> {
        // Slots stay consistent even if a holder panicked: every update is a single insert/remove.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
