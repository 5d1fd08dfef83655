// Worker constants (no magic values)
use std::time::Duration;

/// Default number of dispatch attempts running at once.
/// Synchronous providers hold a slot for their whole run.
pub const DEFAULT_MAX_CONCURRENT_DISPATCHES: usize = 8;

/// Default capacity of the inbound dispatch request channel
pub const DEFAULT_REQUEST_BUFFER: usize = 256;

/// How long shutdown waits for in-flight attempts before giving up (30s)
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
