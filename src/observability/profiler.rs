//! Best-effort memory profiler.
//!
//! Samples resident memory on an interval and reports it through logs and the
//! RSS gauge. Nothing here can fail startup.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;

/// Resident set size of this process in bytes, where the platform exposes it.
#[cfg(target_os = "linux")]
pub fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

#[cfg(not(target_os = "linux"))]
pub fn resident_memory_bytes() -> Option<u64> {
    None
}

/// Spawn the sampling task. It exits when `cancel` fires.
pub fn start_mem_profiler(interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if resident_memory_bytes().is_none() {
            tracing::warn!("Memory profiling is not supported on this platform");
            return;
        }

        tracing::info!(interval_secs = interval.as_secs(), "Memory profiler starting");
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(rss) = resident_memory_bytes() {
                        tracing::debug!(rss_bytes = rss, "Memory sample");
                        metrics::set_memory_rss(rss);
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("Memory profiler stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn reads_resident_memory() {
        assert!(resident_memory_bytes().unwrap() > 0);
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let cancel = CancellationToken::new();
        let task = start_mem_profiler(Duration::from_millis(10), cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("profiler did not stop")
            .unwrap();
    }
}
