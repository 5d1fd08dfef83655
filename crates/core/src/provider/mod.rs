//! Provider capability model.
//!
//! Every execution backend implements [`Provider`] plus exactly one of the
//! two execution-mode traits. The mode is carried as a tag on
//! [`ProviderInstance`], so the dispatcher branches on it once instead of
//! probing types at runtime.

pub mod mocks;
pub mod registry;

pub use registry::{MisconfiguredProviderError, ProviderRegistry, ResolutionError};

use crate::domain::Job;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by provider code
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0}")]
    Failed(String),
}

/// Capabilities shared by every provider.
///
/// The defaults succeed: a provider only overrides what it needs. Expected
/// "not ready" conditions are reported as `Ok(false)`, never as errors.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable name used in job messages
    fn name(&self) -> &str;

    /// One-time setup for this job, called before anything else
    async fn initialize(&mut self, _job: &Job) -> Result<bool, ProviderError> {
        Ok(true)
    }

    /// Whether capacity and preconditions currently permit running this job
    async fn is_available(&self, _job: &Job) -> Result<bool, ProviderError> {
        Ok(true)
    }

    /// Whether an in-flight job of this provider can be canceled
    async fn is_cancelable(&self, _job: &Job) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Provider that runs the job to completion inside `process`.
///
/// The returned boolean is the only success signal.
#[async_trait]
pub trait SynchronousProvider: Provider {
    async fn process(&self, job: &Job) -> Result<bool, ProviderError>;
}

/// Provider that launches work and returns immediately.
///
/// The outcome is reported later through
/// [`JobDispatcher::apply_async_outcome`](crate::application::JobDispatcher::apply_async_outcome).
#[async_trait]
pub trait AsynchronousProvider: Provider {
    async fn process(&self, job: &Job) -> Result<(), ProviderError>;
}

/// Execution mode of a provider implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    Synchronous,
    Asynchronous,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Synchronous => write!(f, "SYNCHRONOUS"),
            ExecutionMode::Asynchronous => write!(f, "ASYNCHRONOUS"),
        }
    }
}

/// Resolution metadata for a declared provider identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    /// Concrete implementation type name
    pub implementation: String,
    pub mode: ExecutionMode,
}

/// A constructed provider tagged with its execution mode
pub enum ProviderInstance {
    Synchronous(Box<dyn SynchronousProvider>),
    Asynchronous(Box<dyn AsynchronousProvider>),
}

impl ProviderInstance {
    pub fn mode(&self) -> ExecutionMode {
        match self {
            ProviderInstance::Synchronous(_) => ExecutionMode::Synchronous,
            ProviderInstance::Asynchronous(_) => ExecutionMode::Asynchronous,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ProviderInstance::Synchronous(p) => p.name(),
            ProviderInstance::Asynchronous(p) => p.name(),
        }
    }

    pub async fn initialize(&mut self, job: &Job) -> Result<bool, ProviderError> {
        match self {
            ProviderInstance::Synchronous(p) => p.initialize(job).await,
            ProviderInstance::Asynchronous(p) => p.initialize(job).await,
        }
    }

    pub async fn is_available(&self, job: &Job) -> Result<bool, ProviderError> {
        match self {
            ProviderInstance::Synchronous(p) => p.is_available(job).await,
            ProviderInstance::Asynchronous(p) => p.is_available(job).await,
        }
    }

    pub async fn is_cancelable(&self, job: &Job) -> Result<bool, ProviderError> {
        match self {
            ProviderInstance::Synchronous(p) => p.is_cancelable(job).await,
            ProviderInstance::Asynchronous(p) => p.is_cancelable(job).await,
        }
    }
}

impl std::fmt::Debug for ProviderInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderInstance")
            .field("mode", &self.mode())
            .field("name", &self.name())
            .finish()
    }
}

/// Output of the resolver: metadata plus a fresh instance
#[derive(Debug)]
pub struct ResolvedProvider {
    pub descriptor: ProviderDescriptor,
    pub instance: ProviderInstance,
}
