// Application Layer - Dispatch use cases

pub mod dispatcher;
pub mod recorder;
pub mod resume;
pub mod worker;

// Re-exports
pub use dispatcher::{
    AsyncOutcome, AttemptOutcome, JobDispatcher, RestoreOutcome, INTERRUPTED_MESSAGE,
};
pub use recorder::TransitionRecorder;
pub use resume::{RestoreReport, ResumeService};
pub use worker::{
    dispatch_channel, shutdown_channel, DispatchRequest, DispatchSender, DispatchWorker,
    ShutdownSender, ShutdownToken,
};
