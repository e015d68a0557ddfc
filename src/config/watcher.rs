//! Configuration file watcher for hot reload.
//!
//! The watcher never loads the file. It only pushes a reload request onto the
//! supervisor's queue; the reload handler reads and validates the config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::lifecycle::signals::ControlHandle;

/// Watches one config file and requests a reload whenever it changes.
pub struct ConfigWatcher {
    path: PathBuf,
    handle: ControlHandle,
}

/// A running watcher. Dropping it, or calling `stop`, ends the watch.
pub struct WatcherGuard {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl WatcherGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stop(self) {
        tracing::info!(path = ?self.path, "Config watcher stopped");
    }
}

impl ConfigWatcher {
    pub fn new(path: &Path, handle: ControlHandle) -> Self {
        Self {
            path: path.to_path_buf(),
            handle,
        }
    }

    /// Start watching the file in the background.
    pub fn run(self) -> Result<WatcherGuard, notify::Error> {
        let handle = self.handle;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, requesting reload");
                        if !handle.reload() {
                            tracing::debug!("Event loop gone, dropping reload request");
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(WatcherGuard {
            path: self.path,
            _watcher: watcher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::signals::control_channel;
    use std::io::Write;

    #[tokio::test]
    async fn file_change_requests_reload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"info\"").unwrap();

        let (handle, mut events) = control_channel();
        let guard = ConfigWatcher::new(file.path(), handle).run().unwrap();

        writeln!(file, "log_level = \"debug\"").unwrap();
        file.as_file().sync_all().unwrap();

        let received = tokio::time::timeout(Duration::from_secs(10), events.reload_rx.recv()).await;
        assert!(matches!(received, Ok(Some(()))));
        guard.stop();
    }

    #[test]
    fn missing_file_fails_to_watch() {
        let (handle, _events) = control_channel();
        let result = ConfigWatcher::new(Path::new("/nonexistent/controller.toml"), handle).run();
        assert!(result.is_err());
    }
}
