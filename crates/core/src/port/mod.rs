// Port Layer - Interfaces for external dependencies

pub mod job_store;
pub mod state_notifier;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use job_store::{JobRepository, JobStore};
pub use state_notifier::{BroadcastNotifier, StateNotifier};
pub use time_provider::TimeProvider;
