// Composition root: wires store, notifier, recorder, dispatcher and worker

use crate::config::DaemonConfig;
use anyhow::{bail, Context, Result};
use jobrelay_core::application::worker::constants::{DEFAULT_REQUEST_BUFFER, SHUTDOWN_DRAIN_TIMEOUT};
use jobrelay_core::application::{
    dispatch_channel, shutdown_channel, DispatchSender, DispatchWorker, JobDispatcher,
    ResumeService, ShutdownSender, TransitionRecorder,
};
use jobrelay_core::domain::{Job, JobId, JobPayload};
use jobrelay_core::port::time_provider::SystemTimeProvider;
use jobrelay_core::port::{BroadcastNotifier, JobRepository, TimeProvider};
use jobrelay_core::provider::ProviderRegistry;
use jobrelay_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Daemon builder
pub struct Daemon {
    config: DaemonConfig,
    registry: ProviderRegistry,
}

impl Daemon {
    pub fn new(config: DaemonConfig, registry: ProviderRegistry) -> Self {
        Self { config, registry }
    }

    /// Open the Job Store, start background services and resume unfinished jobs
    ///
    /// Fails if the provider registry has ambiguous or conflicting entries.
    pub async fn start(self) -> Result<DaemonHandle> {
        let Daemon { config, registry } = self;

        if let Err(problems) = registry.validate() {
            for problem in &problems {
                error!(error = %problem, "Provider registration problem");
            }
            let summary: Vec<String> = problems.iter().map(ToString::to_string).collect();
            bail!("Invalid provider registry: {}", summary.join("; "));
        }
        if registry.is_empty() {
            warn!("No providers registered; every dispatched job will fail to resolve");
        } else {
            for descriptor in registry.descriptors() {
                info!(
                    provider = %descriptor.id,
                    implementation = %descriptor.implementation,
                    mode = %descriptor.mode,
                    "Provider registered"
                );
            }
        }

        info!(db_path = %config.db_path, "Initializing database...");
        let pool = create_pool(&config.db_path)
            .await
            .context("DB pool creation failed")?;
        run_migrations(&pool).await.context("Migration failed")?;

        // DI wiring
        let store = Arc::new(SqliteJobStore::new(pool));
        let notifier = Arc::new(BroadcastNotifier::new(config.event_buffer));
        let dispatcher = JobDispatcher::new(store.clone(), Arc::new(registry), notifier.clone());

        // Subscribe before anything can publish
        let (recorder_shutdown, recorder_token) = shutdown_channel();
        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let recorder = TransitionRecorder::new(store.clone(), time_provider.clone());
        let receiver = notifier.subscribe();
        let recorder_task = tokio::spawn(async move {
            recorder.run(receiver, recorder_token).await;
        });

        let (sender, requests) = dispatch_channel(DEFAULT_REQUEST_BUFFER);
        let resume = ResumeService::new(store.clone(), sender.clone());
        // Before the worker runs, so no new attempt races the takeover
        if let Err(e) = resume.restore_interrupted_jobs(&dispatcher).await {
            error!(error = %e, "Restoring interrupted jobs failed");
        }

        let (worker_shutdown, worker_token) = shutdown_channel();
        let worker = DispatchWorker::new(dispatcher.clone(), config.max_concurrent_dispatches);
        let worker_task = tokio::spawn(async move {
            if let Err(e) = worker.run(requests, worker_token).await {
                error!(error = %e, "Dispatch worker failed");
            }
        });

        match resume.resume_created_jobs().await {
            Ok(count) => info!(resumed_jobs = count, "Startup resume completed"),
            Err(e) => error!(error = %e, "Startup resume failed"),
        }

        info!("System ready. Waiting for jobs...");
        Ok(DaemonHandle {
            store,
            time_provider,
            notifier,
            dispatcher,
            sender,
            worker_shutdown,
            recorder_shutdown,
            worker_task,
            recorder_task,
        })
    }
}

/// Running daemon
pub struct DaemonHandle {
    store: Arc<SqliteJobStore>,
    time_provider: Arc<dyn TimeProvider>,
    notifier: Arc<BroadcastNotifier>,
    dispatcher: JobDispatcher,
    sender: DispatchSender,
    worker_shutdown: ShutdownSender,
    recorder_shutdown: ShutdownSender,
    worker_task: JoinHandle<()>,
    recorder_task: JoinHandle<()>,
}

impl DaemonHandle {
    /// Create a CREATED job with a fresh UUID v4 and trigger its dispatch
    pub async fn create_job(
        &self,
        provider: impl Into<String>,
        payload: serde_json::Value,
        owner: Option<String>,
    ) -> Result<JobId> {
        let mut job = Job::new(
            uuid::Uuid::new_v4().to_string(),
            self.time_provider.now_millis(),
            provider,
            JobPayload::new(payload),
        );
        job.owner = owner;
        self.submit(&job).await?;
        Ok(job.id)
    }

    /// Store a new job and trigger its dispatch
    pub async fn submit(&self, job: &Job) -> Result<()> {
        self.store.insert(job).await?;
        self.sender.submit(job.id.clone()).await?;
        Ok(())
    }

    pub fn store(&self) -> Arc<SqliteJobStore> {
        self.store.clone()
    }

    /// Dispatcher, for the async re-entry hook and cancelability queries
    pub fn dispatcher(&self) -> &JobDispatcher {
        &self.dispatcher
    }

    pub fn notifier(&self) -> Arc<BroadcastNotifier> {
        self.notifier.clone()
    }

    pub fn sender(&self) -> DispatchSender {
        self.sender.clone()
    }

    /// Stop accepting requests, drain in-flight attempts, then flush the recorder
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down...");

        self.worker_shutdown.shutdown();
        if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, self.worker_task)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = SHUTDOWN_DRAIN_TIMEOUT.as_secs(),
                "Dispatch worker did not drain in time"
            );
        }

        self.recorder_shutdown.shutdown();
        if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, self.recorder_task)
            .await
            .is_err()
        {
            warn!("Transition recorder did not drain in time");
        }

        info!("Shutdown complete.");
        Ok(())
    }
}
