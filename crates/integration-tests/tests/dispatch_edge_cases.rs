//! Dispatch edge cases against the full daemon wiring
//!
//! Resolution failures, provider errors and panics must each end in exactly
//! one persisted terminal state without stopping the worker.

mod common;

use common::{job, memory_config, settle, wait_for_state};
use jobrelay_core::application::AsyncOutcome;
use jobrelay_core::domain::{JobState, StateTransitionEvent};
use jobrelay_core::port::JobRepository;
use jobrelay_core::provider::mocks::{
    register_scripted_async, register_scripted_sync, Behavior, Script,
};
use jobrelay_core::provider::ProviderRegistry;
use jobrelay_daemon::Daemon;
use tokio::sync::broadcast;

fn terminal_count(receiver: &mut broadcast::Receiver<StateTransitionEvent>, job_id: &str) -> usize {
    let mut count = 0;
    while let Ok(event) = receiver.try_recv() {
        if event.job_id == job_id && event.is_terminal() {
            count += 1;
        }
    }
    count
}

/// Unknown provider identifier: FAILED with the resolution message
#[tokio::test]
async fn test_unknown_provider_fails_job() {
    let mut registry = ProviderRegistry::new();
    register_scripted_sync(&mut registry, "scanner", Script::default());

    let daemon = Daemon::new(memory_config(), registry).start().await.unwrap();
    let submitted = job("unknown", 1_000, "acme-scanner");
    daemon.submit(&submitted).await.unwrap();

    let failed = wait_for_state(daemon.store().as_ref(), &submitted.id, JobState::Failed).await;
    assert_eq!(
        failed.message.as_deref(),
        Some("Unable to resolve provider 'acme-scanner': no registered implementation")
    );
    assert!(failed.started_at.is_none());

    daemon.shutdown().await.unwrap();
}

/// The same identifier registered twice refuses to start; nothing is constructed
#[tokio::test]
async fn test_ambiguous_registration_rejected_at_startup() {
    let mut registry = ProviderRegistry::new();
    let first = register_scripted_sync(&mut registry, "scanner", Script::default());
    let second = register_scripted_sync(&mut registry, "scanner", Script::default());

    let Err(err) = Daemon::new(memory_config(), registry).start().await else {
        panic!("daemon started with an ambiguous registry");
    };
    let message = err.to_string();
    assert!(message.starts_with("Invalid provider registry"));
    assert!(message.contains("'scanner': 2 registered implementations"));
    assert_eq!(first.constructed() + second.constructed(), 0);
}

/// A panicking provider fails its job and the worker keeps serving others
#[tokio::test]
async fn test_provider_panic_is_contained() {
    let mut registry = ProviderRegistry::new();
    register_scripted_sync(
        &mut registry,
        "crashy",
        Script {
            process: Behavior::Panic("analyzer segfaulted".into()),
            ..Script::default()
        },
    );
    let healthy = register_scripted_sync(&mut registry, "scanner", Script::default());

    let daemon = Daemon::new(memory_config(), registry).start().await.unwrap();
    let mut events = daemon.notifier().subscribe();
    let store = daemon.store();

    let crashing = job("crash", 1_000, "crashy");
    daemon.submit(&crashing).await.unwrap();
    let failed = wait_for_state(store.as_ref(), &crashing.id, JobState::Failed).await;
    assert!(failed
        .message
        .as_deref()
        .is_some_and(|m| m.contains("analyzer segfaulted")));

    let follow_up = job("after-crash", 2_000, "scanner");
    daemon.submit(&follow_up).await.unwrap();
    wait_for_state(store.as_ref(), &follow_up.id, JobState::Completed).await;
    assert_eq!(healthy.process(), 1);

    assert_eq!(terminal_count(&mut events, &crashing.id), 1);

    daemon.shutdown().await.unwrap();
}

/// initialize() returning false: FAILED with the synthesized message
#[tokio::test]
async fn test_initialization_refused() {
    let mut registry = ProviderRegistry::new();
    let calls = register_scripted_sync(
        &mut registry,
        "scanner",
        Script {
            initialize: Behavior::Return(false),
            ..Script::default()
        },
    );

    let daemon = Daemon::new(memory_config(), registry).start().await.unwrap();
    let submitted = job("no-init", 1_000, "scanner");
    daemon.submit(&submitted).await.unwrap();

    let failed = wait_for_state(daemon.store().as_ref(), &submitted.id, JobState::Failed).await;
    assert_eq!(failed.message.as_deref(), Some("Unable to initialize scanner"));
    assert_eq!(calls.is_available(), 0);
    assert_eq!(calls.process(), 0);

    daemon.shutdown().await.unwrap();
}

/// initialize() raising an error: FAILED with the provider's message
#[tokio::test]
async fn test_initialization_error() {
    let mut registry = ProviderRegistry::new();
    register_scripted_sync(
        &mut registry,
        "scanner",
        Script {
            initialize: Behavior::Fail("license file missing".into()),
            ..Script::default()
        },
    );

    let daemon = Daemon::new(memory_config(), registry).start().await.unwrap();
    let submitted = job("init-error", 1_000, "scanner");
    daemon.submit(&submitted).await.unwrap();

    let failed = wait_for_state(daemon.store().as_ref(), &submitted.id, JobState::Failed).await;
    assert!(failed
        .message
        .as_deref()
        .is_some_and(|m| m.contains("license file missing")));

    daemon.shutdown().await.unwrap();
}

/// Unavailable provider: UNAVAILABLE is terminal and process never runs
#[tokio::test]
async fn test_unavailable_provider() {
    let mut registry = ProviderRegistry::new();
    let calls = register_scripted_sync(
        &mut registry,
        "scanner",
        Script {
            is_available: Behavior::Return(false),
            ..Script::default()
        },
    );

    let daemon = Daemon::new(memory_config(), registry).start().await.unwrap();
    let store = daemon.store();
    let submitted = job("busy", 1_000, "scanner");
    daemon.submit(&submitted).await.unwrap();

    let unavailable = wait_for_state(store.as_ref(), &submitted.id, JobState::Unavailable).await;
    assert!(unavailable.finished_at.is_some());
    assert!(unavailable.started_at.is_none());
    assert_eq!(calls.process(), 0);

    settle().await;
    let after = store.find_by_id(&submitted.id).await.unwrap().unwrap();
    assert_eq!(after.state, JobState::Unavailable);

    daemon.shutdown().await.unwrap();
}

/// Failed asynchronous launch is reported once; a later hook call is rejected
#[tokio::test]
async fn test_async_launch_failure() {
    let mut registry = ProviderRegistry::new();
    register_scripted_async(
        &mut registry,
        "remote-scan",
        Script {
            process: Behavior::Fail("upload refused".into()),
            ..Script::default()
        },
    );

    let daemon = Daemon::new(memory_config(), registry).start().await.unwrap();
    let mut events = daemon.notifier().subscribe();
    let submitted = job("launch-fail", 1_000, "remote-scan");
    daemon.submit(&submitted).await.unwrap();

    let failed = wait_for_state(daemon.store().as_ref(), &submitted.id, JobState::Failed).await;
    assert!(failed
        .message
        .as_deref()
        .is_some_and(|m| m.contains("upload refused")));

    assert!(!daemon.dispatcher().is_awaiting_outcome(&submitted.id));
    assert!(daemon
        .dispatcher()
        .apply_async_outcome(&submitted.id, AsyncOutcome::Completed)
        .is_err());
    assert_eq!(terminal_count(&mut events, &submitted.id), 1);

    daemon.shutdown().await.unwrap();
}

/// Dispatching an id with no stored job leaves the store untouched
#[tokio::test]
async fn test_trigger_for_missing_job() {
    let mut registry = ProviderRegistry::new();
    let calls = register_scripted_sync(&mut registry, "scanner", Script::default());

    let daemon = Daemon::new(memory_config(), registry).start().await.unwrap();
    let store = daemon.store();
    daemon.sender().submit("ghost").await.unwrap();

    // The worker must still be serving afterwards
    let submitted = job("real", 1_000, "scanner");
    daemon.submit(&submitted).await.unwrap();
    wait_for_state(store.as_ref(), &submitted.id, JobState::Completed).await;

    assert!(store.find_by_id(&"ghost".to_string()).await.unwrap().is_none());
    assert_eq!(calls.constructed(), 1);

    daemon.shutdown().await.unwrap();
}

/// is_cancelable consults a fresh provider instance for the stored job
#[tokio::test]
async fn test_is_cancelable_query() {
    let mut registry = ProviderRegistry::new();
    register_scripted_async(
        &mut registry,
        "remote-scan",
        Script {
            is_cancelable: Behavior::Return(false),
            ..Script::default()
        },
    );

    let daemon = Daemon::new(memory_config(), registry).start().await.unwrap();
    let submitted = job("cancel-query", 1_000, "remote-scan");
    daemon.submit(&submitted).await.unwrap();
    wait_for_state(daemon.store().as_ref(), &submitted.id, JobState::InProgress).await;

    assert!(!daemon.dispatcher().is_cancelable(&submitted.id).await.unwrap());
    assert!(daemon
        .dispatcher()
        .is_cancelable(&"ghost".to_string())
        .await
        .is_err());

    daemon.shutdown().await.unwrap();
}
