//! Diagnostic dump of concurrently running work.
//!
//! The dump holds a backtrace of the control thread, tokio runtime counters and
//! the state of every named task handed in: supervisor background work and the
//! listener servers. It is bounded to [`MAX_DUMP_BYTES`].

use std::backtrace::Backtrace;
use std::fmt::Write;
use std::sync::Mutex;

use tokio::task::JoinHandle;

/// Upper bound on the size of a single dump.
pub const MAX_DUMP_BYTES: usize = 32 * 1024 * 1024;

/// Named background tasks started by the supervisor.
#[derive(Default)]
pub struct BackgroundTasks {
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `handle` under `name` until the set is dropped.
    pub fn track(&self, name: impl Into<String>, handle: JoinHandle<()>) {
        self.tasks
            .lock()
            .expect("background task mutex poisoned")
            .push((name.into(), handle));
    }

    /// `(name, finished)` for every tracked task, in start order.
    pub fn snapshot(&self) -> Vec<(String, bool)> {
        self.tasks
            .lock()
            .expect("background task mutex poisoned")
            .iter()
            .map(|(name, handle)| (name.clone(), handle.is_finished()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().expect("background task mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the dump text from `(name, finished)` task entries.
pub fn capture_dump(tasks: &[(String, bool)]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "control thread:\n{}", Backtrace::force_capture());

    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        let runtime = handle.metrics();
        let _ = writeln!(
            out,
            "runtime: workers={} alive_tasks={}",
            runtime.num_workers(),
            runtime.num_alive_tasks()
        );
    }

    for (name, finished) in tasks {
        let state = if *finished { "finished" } else { "running" };
        let _ = writeln!(out, "task {}: {}", name, state);
    }

    truncate_on_char_boundary(out, MAX_DUMP_BYTES)
}

fn truncate_on_char_boundary(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}
