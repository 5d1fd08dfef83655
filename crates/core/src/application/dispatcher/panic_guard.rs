// Panic isolation for dispatch attempts
use std::any::Any;
use std::future::Future;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed (successfully or with its own error)
    Success(T),
    /// Execution panicked or its task was aborted
    Panicked(String),
}

/// Run a future on its own tokio task so a provider panic cannot unwind
/// into the caller.
///
/// The panic payload is turned into a message; an aborted task is reported
/// the same way.
pub async fn execute_guarded<F, T>(future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn(future).await {
        Ok(result) => PanicGuardResult::Success(result),
        Err(join_err) if join_err.is_panic() => {
            let panic_msg = panic_message(join_err.into_panic().as_ref());
            error!(panic_msg = %panic_msg, "Dispatch task panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
        Err(join_err) => {
            error!(error = %join_err, "Dispatch task cancelled");
            PanicGuardResult::Panicked(join_err.to_string())
        }
    }
}

/// Extract the message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
