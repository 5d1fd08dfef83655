// ============================================================================
// Mock Providers for Testing
// ============================================================================

use super::{
    AsynchronousProvider, ExecutionMode, Provider, ProviderError, ProviderInstance,
    ProviderRegistry, SynchronousProvider,
};
use crate::domain::Job;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted outcome of one capability call
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return this value
    Return(bool),
    /// Return a ProviderError with message
    Fail(String),
    /// Panic with message (for containment testing)
    Panic(String),
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Return(true)
    }
}

impl Behavior {
    fn run(&self) -> Result<bool, ProviderError> {
        match self {
            Behavior::Return(value) => Ok(*value),
            Behavior::Fail(msg) => Err(ProviderError::Failed(msg.clone())),
            Behavior::Panic(msg) => panic!("{}", msg),
        }
    }
}

/// Behavior for each capability; everything succeeds by default
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub initialize: Behavior,
    pub is_available: Behavior,
    pub is_cancelable: Behavior,
    /// For asynchronous providers `Return(_)` means "launched"
    pub process: Behavior,
}

/// Call counters shared between a test and every instance a factory builds
#[derive(Debug, Default)]
pub struct CallCounts {
    constructed: AtomicUsize,
    initialize: AtomicUsize,
    is_available: AtomicUsize,
    is_cancelable: AtomicUsize,
    process: AtomicUsize,
}

impl CallCounts {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
    pub fn initialize(&self) -> usize {
        self.initialize.load(Ordering::SeqCst)
    }
    pub fn is_available(&self) -> usize {
        self.is_available.load(Ordering::SeqCst)
    }
    pub fn is_cancelable(&self) -> usize {
        self.is_cancelable.load(Ordering::SeqCst)
    }
    pub fn process(&self) -> usize {
        self.process.load(Ordering::SeqCst)
    }
}

/// Shared scripted capability implementation
struct Scripted {
    name: String,
    script: Script,
    calls: Arc<CallCounts>,
}

impl Scripted {
    fn new(name: impl Into<String>, script: Script, calls: Arc<CallCounts>) -> Self {
        calls.constructed.fetch_add(1, Ordering::SeqCst);
        Self {
            name: name.into(),
            script,
            calls,
        }
    }

    fn initialize(&self) -> Result<bool, ProviderError> {
        self.calls.initialize.fetch_add(1, Ordering::SeqCst);
        self.script.initialize.run()
    }

    fn is_available(&self) -> Result<bool, ProviderError> {
        self.calls.is_available.fetch_add(1, Ordering::SeqCst);
        self.script.is_available.run()
    }

    fn is_cancelable(&self) -> Result<bool, ProviderError> {
        self.calls.is_cancelable.fetch_add(1, Ordering::SeqCst);
        self.script.is_cancelable.run()
    }

    fn process(&self) -> Result<bool, ProviderError> {
        self.calls.process.fetch_add(1, Ordering::SeqCst);
        self.script.process.run()
    }
}

/// Synchronous provider driven by a [`Script`]
pub struct ScriptedSyncProvider(Scripted);

impl ScriptedSyncProvider {
    pub fn new(name: impl Into<String>, script: Script) -> Self {
        Self::with_counts(name, script, Arc::default())
    }

    pub fn with_counts(name: impl Into<String>, script: Script, calls: Arc<CallCounts>) -> Self {
        Self(Scripted::new(name, script, calls))
    }
}

#[async_trait]
impl Provider for ScriptedSyncProvider {
    fn name(&self) -> &str {
        &self.0.name
    }
    async fn initialize(&mut self, _job: &Job) -> Result<bool, ProviderError> {
        self.0.initialize()
    }
    async fn is_available(&self, _job: &Job) -> Result<bool, ProviderError> {
        self.0.is_available()
    }
    async fn is_cancelable(&self, _job: &Job) -> Result<bool, ProviderError> {
        self.0.is_cancelable()
    }
}

#[async_trait]
impl SynchronousProvider for ScriptedSyncProvider {
    async fn process(&self, _job: &Job) -> Result<bool, ProviderError> {
        self.0.process()
    }
}

/// Asynchronous provider driven by a [`Script`]
pub struct ScriptedAsyncProvider(Scripted);

impl ScriptedAsyncProvider {
    pub fn new(name: impl Into<String>, script: Script) -> Self {
        Self::with_counts(name, script, Arc::default())
    }

    pub fn with_counts(name: impl Into<String>, script: Script, calls: Arc<CallCounts>) -> Self {
        Self(Scripted::new(name, script, calls))
    }
}

#[async_trait]
impl Provider for ScriptedAsyncProvider {
    fn name(&self) -> &str {
        &self.0.name
    }
    async fn initialize(&mut self, _job: &Job) -> Result<bool, ProviderError> {
        self.0.initialize()
    }
    async fn is_available(&self, _job: &Job) -> Result<bool, ProviderError> {
        self.0.is_available()
    }
    async fn is_cancelable(&self, _job: &Job) -> Result<bool, ProviderError> {
        self.0.is_cancelable()
    }
}

#[async_trait]
impl AsynchronousProvider for ScriptedAsyncProvider {
    async fn process(&self, _job: &Job) -> Result<(), ProviderError> {
        self.0.process().map(|_| ())
    }
}

/// Register a scripted synchronous provider under `id`, named after it
pub fn register_scripted_sync(
    registry: &mut ProviderRegistry,
    id: &str,
    script: Script,
) -> Arc<CallCounts> {
    let calls = Arc::new(CallCounts::default());
    let name = id.to_string();
    let shared = Arc::clone(&calls);
    registry.register_factory(
        id.to_string(),
        "ScriptedSyncProvider",
        ExecutionMode::Synchronous,
        move || {
            ProviderInstance::Synchronous(Box::new(ScriptedSyncProvider::with_counts(
                name.clone(),
                script.clone(),
                Arc::clone(&shared),
            )))
        },
    );
    calls
}

/// Register a scripted asynchronous provider under `id`, named after it
pub fn register_scripted_async(
    registry: &mut ProviderRegistry,
    id: &str,
    script: Script,
) -> Arc<CallCounts> {
    let calls = Arc::new(CallCounts::default());
    let name = id.to_string();
    let shared = Arc::clone(&calls);
    registry.register_factory(
        id.to_string(),
        "ScriptedAsyncProvider",
        ExecutionMode::Asynchronous,
        move || {
            ProviderInstance::Asynchronous(Box::new(ScriptedAsyncProvider::with_counts(
                name.clone(),
                script.clone(),
                Arc::clone(&shared),
            )))
        },
    );
    calls
}
