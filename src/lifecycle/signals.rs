//! Control events and OS signal translation.
//!
//! # Responsibilities
//! - Typed queues for shutdown, reload and diagnostic-dump requests
//! - Translate OS signals into pushes onto those queues
//!
//! # Signals
//! - SIGTERM / SIGINT → Shutdown
//! - SIGHUP → Reload
//! - SIGUSR2 → Dump
//!
//! The event loop only ever sees the queues, so tests drive it with
//! synthetic events through a `ControlHandle`.

use tokio::sync::mpsc;

/// A request to the supervisor's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Shutdown,
    Reload,
    Dump,
}

/// Sending side of the control queues. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    shutdown_tx: mpsc::UnboundedSender<()>,
    reload_tx: mpsc::UnboundedSender<()>,
    dump_tx: mpsc::UnboundedSender<()>,
}

impl ControlHandle {
    /// Queue an event. Returns false once the event loop is gone.
    pub fn send(&self, event: ControlEvent) -> bool {
        let tx = match event {
            ControlEvent::Shutdown => &self.shutdown_tx,
            ControlEvent::Reload => &self.reload_tx,
            ControlEvent::Dump => &self.dump_tx,
        };
        tx.send(()).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.send(ControlEvent::Shutdown)
    }

    pub fn reload(&self) -> bool {
        self.send(ControlEvent::Reload)
    }

    pub fn dump(&self) -> bool {
        self.send(ControlEvent::Dump)
    }
}

/// Receiving side of the control queues, owned by the event loop.
#[derive(Debug)]
pub struct ControlEvents {
    pub(crate) shutdown_rx: mpsc::UnboundedReceiver<()>,
    pub(crate) reload_rx: mpsc::UnboundedReceiver<()>,
    pub(crate) dump_rx: mpsc::UnboundedReceiver<()>,
}

pub fn control_channel() -> (ControlHandle, ControlEvents) {
    let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();
    let (dump_tx, dump_rx) = mpsc::unbounded_channel();
    (
        ControlHandle {
            shutdown_tx,
            reload_tx,
            dump_tx,
        },
        ControlEvents {
            shutdown_rx,
            reload_rx,
            dump_rx,
        },
    )
}

/// Forward OS signals onto the control queues until the event loop goes away.
#[cfg(unix)]
pub async fn forward_os_signals(handle: ControlHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let registrations = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::hangup()),
        signal(SignalKind::user_defined2()),
    );
    let (mut sigterm, mut sigint, mut sighup, mut sigusr2) = match registrations {
        (Ok(term), Ok(int), Ok(hup), Ok(usr2)) => (term, int, hup, usr2),
        _ => {
            tracing::warn!("Failed to register signal handlers, falling back to Ctrl+C");
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.shutdown();
            }
            return;
        }
    };

    tracing::info!("Signal forwarding started (SIGTERM, SIGINT, SIGHUP, SIGUSR2)");

    loop {
        let event = tokio::select! {
            _ = sigterm.recv() => ControlEvent::Shutdown,
            _ = sigint.recv() => ControlEvent::Shutdown,
            _ = sighup.recv() => ControlEvent::Reload,
            _ = sigusr2.recv() => ControlEvent::Dump,
        };
        tracing::debug!(event = ?event, "Signal received");
        if !handle.send(event) {
            break;
        }
    }

    tracing::debug!("Signal forwarding stopped");
}

/// Fallback for non-Unix systems
#[cfg(not(unix))]
pub async fn forward_os_signals(handle: ControlHandle) {
    tracing::info!("Signal forwarding started (Ctrl+C only on this platform)");

    while tokio::signal::ctrl_c().await.is_ok() {
        if !handle.shutdown() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_land_on_their_own_queue() {
        let (handle, mut events) = control_channel();

        assert!(handle.reload());
        assert!(handle.dump());
        assert!(handle.shutdown());

        assert!(events.reload_rx.recv().await.is_some());
        assert!(events.dump_rx.recv().await.is_some());
        assert!(events.shutdown_rx.recv().await.is_some());
        assert!(events.reload_rx.try_recv().is_err());
    }

    #[test]
    fn send_fails_after_loop_is_gone() {
        let (handle, events) = control_channel();
        drop(events);
        assert!(!handle.send(ControlEvent::Reload));
    }
}
