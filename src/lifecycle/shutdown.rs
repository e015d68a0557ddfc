//! Shutdown coordination.
//!
//! # Responsibilities
//! - `ShutdownGuard`: teardown runs at most once, however many signals arrive
//! - `ShutdownActions`: scoped teardown closures run on every exit path
//! - `Shutdown`: an external channel whose trigger or closure stops the loop

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use crate::lifecycle::reload::BoxError;

/// One-shot marker for the teardown sequence. Never reset.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    fired: AtomicBool,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `teardown` if no earlier call did. Returns `None` for later calls.
    pub fn run_once<T>(&self, teardown: impl FnOnce() -> T) -> Option<T> {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(teardown())
        } else {
            None
        }
    }

    /// Whether teardown has started.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

type ShutdownAction = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// Teardown steps registered during startup.
///
/// They run in registration order when `run` is called or the value is dropped,
/// so leaving the startup scope by any path tears them down.
#[derive(Default)]
pub struct ShutdownActions {
    actions: Vec<(String, ShutdownAction)>,
}

impl ShutdownActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named action to run after those already pushed.
    pub fn push<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.actions.push((name.into(), Box::new(action)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run and forget every pending action. Failures are logged.
    pub fn run(&mut self) {
        for (name, action) in self.actions.drain(..) {
            match action() {
                Ok(()) => tracing::debug!(action = %name, "Shutdown action complete"),
                Err(e) => tracing::error!(action = %name, error = %e, "Shutdown action failed"),
            }
        }
    }
}

impl Drop for ShutdownActions {
    fn drop(&mut self) {
        self.run();
    }
}

/// External shutdown channel.
///
/// Triggering it, or dropping it, makes a subscribed supervisor shut down.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for a supervisor's `with_external_shutdown`.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask every subscriber to shut down.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    #[test]
    fn guard_runs_teardown_once() {
        let guard = ShutdownGuard::new();
        let runs = AtomicUsize::new(0);

        assert_eq!(guard.run_once(|| runs.fetch_add(1, Ordering::SeqCst)), Some(0));
        assert_eq!(guard.run_once(|| runs.fetch_add(1, Ordering::SeqCst)), None);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(guard.has_fired());
    }

    #[test]
    fn guard_holds_across_threads() {
        let guard = Arc::new(ShutdownGuard::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || {
                    guard.run_once(|| runs.fetch_add(1, Ordering::SeqCst));
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn actions_run_in_order_on_drop() {
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let mut actions = ShutdownActions::new();
            for name in ["pid", "dev-store"] {
                let order = Arc::clone(&order);
                actions.push(name, move || {
                    order.lock().unwrap().push(name);
                    Ok(())
                });
            }
            actions.push("failing", || Err("boom".into()));
            assert_eq!(actions.len(), 3);
        }
        assert_eq!(*order.lock().unwrap(), vec!["pid", "dev-store"]);
    }

    #[test]
    fn explicit_run_empties_actions() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut actions = ShutdownActions::new();
        let counter = Arc::clone(&runs);
        actions.push("once", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        actions.run();
        assert!(actions.is_empty());
        drop(actions);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_external_shutdown_closes_receivers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        drop(shutdown);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
