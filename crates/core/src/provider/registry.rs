// Provider Registry & Resolver
// Identifier -> zero-argument factory, populated once at startup

use super::{
    AsynchronousProvider, ExecutionMode, ProviderDescriptor, ProviderInstance, ResolvedProvider,
    SynchronousProvider,
};
use crate::domain::Job;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Provider implementation violates the execution-mode contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Provider '{id}' ({implementation}) is misconfigured: {reason}")]
pub struct MisconfiguredProviderError {
    pub id: String,
    pub implementation: String,
    pub reason: String,
}

/// Resolution failures (fatal for a dispatch attempt)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unable to resolve provider for job {job_id}: no provider declared")]
    MissingProvider { job_id: String },

    #[error("Unable to resolve provider '{0}': no registered implementation")]
    Unknown(String),

    #[error("Unable to resolve provider '{id}': {count} registered implementations")]
    Ambiguous { id: String, count: usize },

    #[error(transparent)]
    Misconfigured(#[from] MisconfiguredProviderError),
}

type Factory = Box<dyn Fn() -> ProviderInstance + Send + Sync>;

struct Registration {
    id: String,
    implementation: &'static str,
    mode: ExecutionMode,
    factory: Factory,
}

impl Registration {
    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: self.id.clone(),
            implementation: self.implementation.to_string(),
            mode: self.mode,
        }
    }

    fn misconfigured(&self, reason: impl Into<String>) -> MisconfiguredProviderError {
        MisconfiguredProviderError {
            id: self.id.clone(),
            implementation: self.implementation.to_string(),
            reason: reason.into(),
        }
    }
}

/// Registry of provider implementations.
///
/// Read-only once built; share it behind an `Arc`. Duplicate identifiers are
/// accepted at registration time and reported by [`validate`](Self::validate)
/// or by [`resolve`](Self::resolve) as ambiguous.
#[derive(Default)]
pub struct ProviderRegistry {
    registrations: Vec<Registration>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous provider built with `Default`
    pub fn register_synchronous<P>(&mut self, id: impl Into<String>) -> &mut Self
    where
        P: SynchronousProvider + Default + 'static,
    {
        self.push(
            id.into(),
            std::any::type_name::<P>(),
            ExecutionMode::Synchronous,
            Box::new(|| ProviderInstance::Synchronous(Box::new(P::default()))),
        )
    }

    /// Register an asynchronous provider built with `Default`
    pub fn register_asynchronous<P>(&mut self, id: impl Into<String>) -> &mut Self
    where
        P: AsynchronousProvider + Default + 'static,
    {
        self.push(
            id.into(),
            std::any::type_name::<P>(),
            ExecutionMode::Asynchronous,
            Box::new(|| ProviderInstance::Asynchronous(Box::new(P::default()))),
        )
    }

    /// Register an explicit factory with a declared mode.
    ///
    /// The instance the factory builds must match `mode`; a mismatch is
    /// reported as misconfiguration on resolve.
    pub fn register_factory<F>(
        &mut self,
        id: impl Into<String>,
        implementation: &'static str,
        mode: ExecutionMode,
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> ProviderInstance + Send + Sync + 'static,
    {
        self.push(id.into(), implementation, mode, Box::new(factory))
    }

    fn push(
        &mut self,
        id: String,
        implementation: &'static str,
        mode: ExecutionMode,
        factory: Factory,
    ) -> &mut Self {
        debug!(provider_id = %id, implementation, mode = %mode, "Registering provider");
        self.registrations.push(Registration {
            id,
            implementation,
            mode,
            factory,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Descriptors of every registration, in registration order
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.registrations.iter().map(|r| r.descriptor()).collect()
    }

    /// Check the whole registry for ambiguity and mode conflicts.
    ///
    /// Intended for startup, before the first dispatch.
    pub fn validate(&self) -> Result<(), Vec<ResolutionError>> {
        let mut problems: Vec<ResolutionError> = Vec::new();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for registration in &self.registrations {
            if registration.id.trim().is_empty() {
                problems.push(registration.misconfigured("empty identifier").into());
            }
            *counts.entry(registration.id.as_str()).or_default() += 1;
        }

        let mut ambiguous: Vec<_> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
        ambiguous.sort();
        for (id, count) in ambiguous {
            problems.push(ResolutionError::Ambiguous {
                id: id.to_string(),
                count,
            });
        }

        let mut reported = Vec::new();
        for registration in &self.registrations {
            if reported.contains(&registration.implementation) {
                continue;
            }
            if let Some(err) = self.mode_conflict(registration) {
                reported.push(registration.implementation);
                problems.push(err.into());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Metadata for a declared identifier without constructing anything
    pub fn describe(&self, id: &str) -> Result<ProviderDescriptor, ResolutionError> {
        Ok(self.find_unique(id)?.descriptor())
    }

    /// Resolve and construct the provider for `job`.
    ///
    /// Never consults or mutates job state.
    pub fn resolve(&self, job: &Job) -> Result<ResolvedProvider, ResolutionError> {
        if job.provider.trim().is_empty() {
            return Err(ResolutionError::MissingProvider {
                job_id: job.id.clone(),
            });
        }

        let registration = self.find_unique(&job.provider)?;
        if let Some(err) = self.mode_conflict(registration) {
            return Err(err.into());
        }

        let instance = (registration.factory)();
        if instance.mode() != registration.mode {
            return Err(registration
                .misconfigured(format!(
                    "declared {} but factory built a {} instance",
                    registration.mode,
                    instance.mode()
                ))
                .into());
        }

        Ok(ResolvedProvider {
            descriptor: registration.descriptor(),
            instance,
        })
    }

    fn find_unique(&self, id: &str) -> Result<&Registration, ResolutionError> {
        let mut matches = self.registrations.iter().filter(|r| r.id == id);
        match (matches.next(), matches.count()) {
            (None, _) => Err(ResolutionError::Unknown(id.to_string())),
            (Some(registration), 0) => Ok(registration),
            (Some(_), rest) => Err(ResolutionError::Ambiguous {
                id: id.to_string(),
                count: rest + 1,
            }),
        }
    }

    /// Same implementation type registered under both execution modes
    fn mode_conflict(&self, registration: &Registration) -> Option<MisconfiguredProviderError> {
        self.registrations
            .iter()
            .any(|other| {
                other.implementation == registration.implementation
                    && other.mode != registration.mode
            })
            .then(|| registration.misconfigured("registered as both synchronous and asynchronous"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mocks::{Behavior, ScriptedAsyncProvider, ScriptedSyncProvider};
    use crate::provider::{Provider, ProviderError};
    use async_trait::async_trait;

    #[derive(Default)]
    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "Echo"
        }
    }

    #[async_trait]
    impl SynchronousProvider for EchoProvider {
        async fn process(&self, _job: &Job) -> Result<bool, ProviderError> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct LaunchProvider;

    #[async_trait]
    impl Provider for LaunchProvider {
        fn name(&self) -> &str {
            "Launch"
        }
    }

    #[async_trait]
    impl AsynchronousProvider for LaunchProvider {
        async fn process(&self, _job: &Job) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry
            .register_synchronous::<EchoProvider>("echo")
            .register_asynchronous::<LaunchProvider>("launch");
        registry
    }

    #[test]
    fn test_resolve_synchronous_and_asynchronous() {
        let registry = registry();

        let sync = registry.resolve(&Job::new_test("echo")).unwrap();
        assert_eq!(sync.descriptor.mode, ExecutionMode::Synchronous);
        assert!(sync.descriptor.implementation.ends_with("EchoProvider"));
        assert_eq!(sync.instance.name(), "Echo");

        let r#async = registry.resolve(&Job::new_test("launch")).unwrap();
        assert_eq!(r#async.descriptor.mode, ExecutionMode::Asynchronous);
        assert_eq!(r#async.instance.mode(), ExecutionMode::Asynchronous);
    }

    #[test]
    fn test_unknown_provider_names_identifier() {
        let err = registry()
            .resolve(&Job::new_test("acme-scanner"))
            .unwrap_err();
        assert_eq!(err, ResolutionError::Unknown("acme-scanner".to_string()));
        let msg = err.to_string();
        assert!(msg.contains("acme-scanner"));
        assert!(msg.contains("resolve"));
    }

    #[test]
    fn test_missing_provider_identifier() {
        let err = registry().resolve(&Job::new_test("  ")).unwrap_err();
        assert!(matches!(err, ResolutionError::MissingProvider { .. }));
    }

    #[test]
    fn test_duplicate_identifier_is_ambiguous() {
        let mut registry = registry();
        registry.register_synchronous::<EchoProvider>("launch");

        let err = registry.resolve(&Job::new_test("launch")).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::Ambiguous {
                id: "launch".to_string(),
                count: 2
            }
        );
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_factory_mode_mismatch_is_misconfigured() {
        let mut registry = ProviderRegistry::new();
        registry.register_factory("liar", "LiarProvider", ExecutionMode::Synchronous, || {
            ProviderInstance::Asynchronous(Box::new(ScriptedAsyncProvider::new(
                "Liar",
                Default::default(),
            )))
        });

        let err = registry.resolve(&Job::new_test("liar")).unwrap_err();
        match err {
            ResolutionError::Misconfigured(e) => {
                assert_eq!(e.id, "liar");
                assert!(e.reason.contains("SYNCHRONOUS"));
            }
            other => panic!("expected misconfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_implementation_in_both_modes_is_misconfigured() {
        let mut registry = ProviderRegistry::new();
        registry
            .register_factory("both-sync", "DualProvider", ExecutionMode::Synchronous, || {
                ProviderInstance::Synchronous(Box::new(ScriptedSyncProvider::new(
                    "Dual",
                    Default::default(),
                )))
            })
            .register_factory("both-async", "DualProvider", ExecutionMode::Asynchronous, || {
                ProviderInstance::Asynchronous(Box::new(ScriptedAsyncProvider::new(
                    "Dual",
                    Default::default(),
                )))
            });

        assert!(matches!(
            registry.resolve(&Job::new_test("both-sync")),
            Err(ResolutionError::Misconfigured(_))
        ));
        let problems = registry.validate().unwrap_err();
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn test_validate_clean_registry() {
        assert!(registry().validate().is_ok());
        assert_eq!(registry().len(), 2);
    }

    #[test]
    fn test_validate_reports_empty_identifier() {
        let mut registry = ProviderRegistry::new();
        registry.register_synchronous::<EchoProvider>("");
        let problems = registry.validate().unwrap_err();
        assert!(matches!(problems[0], ResolutionError::Misconfigured(_)));
    }

    #[test]
    fn test_describe_does_not_construct() {
        let mut registry = ProviderRegistry::new();
        registry.register_factory("boom", "BoomProvider", ExecutionMode::Synchronous, || {
            panic!("factory must not run")
        });
        let descriptor = registry.describe("boom").unwrap();
        assert_eq!(descriptor.implementation, "BoomProvider");
    }

    #[test]
    fn test_resolve_builds_fresh_instance_each_time() {
        let (registry, calls) = {
            let mut registry = ProviderRegistry::new();
            let calls = crate::provider::mocks::register_scripted_sync(
                &mut registry,
                "counted",
                crate::provider::mocks::Script {
                    process: Behavior::Return(true),
                    ..Default::default()
                },
            );
            (registry, calls)
        };
        registry.resolve(&Job::new_test("counted")).unwrap();
        registry.resolve(&Job::new_test("counted")).unwrap();
        assert_eq!(calls.constructed(), 2);
    }
}
