//! Process-wide tunables set during startup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default upper bound on API request duration.
pub const DEFAULT_MAX_REQUEST_DURATION: Duration = Duration::from_secs(90);

static MAX_REQUEST_DURATION_MS: AtomicU64 =
    AtomicU64::new(DEFAULT_MAX_REQUEST_DURATION.as_millis() as u64);

pub fn default_max_request_duration() -> Duration {
    Duration::from_millis(MAX_REQUEST_DURATION_MS.load(Ordering::Relaxed))
}

/// Override the request duration applied to API listeners built afterwards.
pub fn set_default_max_request_duration(duration: Duration) {
    MAX_REQUEST_DURATION_MS.store(duration.as_millis() as u64, Ordering::Relaxed);
}
