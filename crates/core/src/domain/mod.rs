// Domain Layer - Jobs, states and transition events

pub mod error;
pub mod event;
pub mod identity;
pub mod job;

// Re-exports
pub use error::DomainError;
pub use event::StateTransitionEvent;
pub use identity::Identity;
pub use job::{Job, JobId, JobPayload, JobState};
