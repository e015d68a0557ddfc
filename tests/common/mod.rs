//! Shared fakes and fixtures for supervisor integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use broker_controller::cli::Args;
use broker_controller::config::validation::ListenerSpec;
use broker_controller::error::StartupError;
use broker_controller::lifecycle::reload::{listener_key, ReloadRegistry};
use broker_controller::lifecycle::{Collaborators, Supervisor, SupervisorState};
use broker_controller::net::{ListenerError, ListenerSubsystem};
use broker_controller::security::mlock::{MemoryLocker, MlockError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Two distinct 32 byte keys, one per required KMS purpose.
pub const KMS_BLOCKS: &str = r#"
[[kms]]
purpose = "root"
key_id = "test-root"
key = "1111111111111111111111111111111111111111111111111111111111111111"

[[kms]]
purpose = "worker-auth"
key_id = "test-worker-auth"
key = "2222222222222222222222222222222222222222222222222222222222222222"
"#;

pub const API_LISTENER: &str = r#"
[[listeners]]
address = "127.0.0.1:0"
purpose = ["api"]
tls_disable = true
"#;

pub const CLUSTER_LISTENER: &str = r#"
[[listeners]]
address = "127.0.0.1:0"
purpose = ["cluster"]
tls_disable = true
"#;

/// Write a controller config with KMS keys, mlock and profiler disabled.
///
/// `top_level` holds plain keys; `listeners` holds `[[listeners]]` tables.
pub fn write_config(dir: &Path, top_level: &str, listeners: &str) -> PathBuf {
    let body = format!(
        "disable_mlock = true\n{}\n\n[profiler]\nenabled = false\n{}\n{}",
        top_level, listeners, KMS_BLOCKS
    );
    let path = dir.join("controller.toml");
    std::fs::write(&path, body).unwrap();
    path
}

pub fn config_args(path: &Path) -> Args {
    Args {
        config: Some(path.to_path_buf()),
        ..Default::default()
    }
}

/// Listener subsystem that binds nothing and counts lifecycle calls.
#[derive(Default)]
pub struct FakeListeners {
    pub setups: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub reloads: Arc<AtomicUsize>,
    pub fail_start: bool,
    pub fail_stop: bool,
    /// Path whose existence is recorded when `setup` runs.
    pub observe_path: Option<PathBuf>,
    pub observed_at_setup: AtomicBool,
}

impl FakeListeners {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl ListenerSubsystem for FakeListeners {
    fn setup(&self, listeners: &[ListenerSpec], registry: &ReloadRegistry) -> Result<(), ListenerError> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        if let Some(path) = &self.observe_path {
            self.observed_at_setup.store(path.exists(), Ordering::SeqCst);
        }
        for index in 0..listeners.len() {
            let reloads = Arc::clone(&self.reloads);
            registry.register(listener_key(index), move || {
                reloads.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        Ok(())
    }

    fn start(&self) -> Result<(), ListenerError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(ListenerError::Start("127.0.0.1:0".into(), "address in use".into()));
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), ListenerError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(ListenerError::Stop("127.0.0.1:0".into(), "still draining".into()));
        }
        Ok(())
    }
}

/// A host without memory locking support.
pub struct NoMlock;

impl MemoryLocker for NoMlock {
    fn supported(&self) -> bool {
        false
    }

    fn lock_all(&self) -> Result<(), MlockError> {
        Err(MlockError::Unsupported("memory locking unavailable in tests"))
    }
}

pub fn collaborators(listeners: Arc<FakeListeners>) -> Collaborators {
    Collaborators {
        listeners,
        locker: Arc::new(NoMlock),
    }
}

pub fn spawn(supervisor: Supervisor) -> JoinHandle<Result<(), StartupError>> {
    tokio::spawn(supervisor.run())
}

/// Wait until the supervisor reaches `state`, failing after a few seconds.
pub async fn wait_for_state(state: &mut watch::Receiver<SupervisorState>, wanted: SupervisorState) {
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == wanted))
        .await
        .expect("timed out waiting for supervisor state")
        .expect("supervisor dropped its state");
}

pub async fn join(task: JoinHandle<Result<(), StartupError>>) -> Result<(), StartupError> {
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("supervisor did not exit")
        .expect("supervisor task panicked")
}
