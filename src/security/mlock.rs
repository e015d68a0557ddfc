//! Locking process memory into physical RAM.
//!
//! # Responsibilities
//! - Probe whether memory locking is available on this host
//! - Lock all current and future pages so secrets are never swapped out
//!
//! The probe result is driven by the `disable_mlock` setting plus the locker's
//! declared support, never by inspecting the environment ad hoc.

use thiserror::Error;

const LOCK_HELP: &str = "This usually means that the mlock syscall is not available. \
The controller uses mlock to prevent memory from being swapped to disk. This requires \
root privileges (or CAP_IPC_LOCK) as well as a machine that supports mlock. Enable mlock \
on your system or set `disable_mlock = true` in the configuration file.";

/// Error type for memory locking.
#[derive(Debug, Error)]
pub enum MlockError {
    #[error("failed to lock memory: {reason}. {help}")]
    Lock { reason: String, help: &'static str },

    #[error("memory locking is not supported on this system. {0}")]
    Unsupported(&'static str),
}

/// Something that can lock the process address space.
pub trait MemoryLocker: Send + Sync {
    fn supported(&self) -> bool;
    fn lock_all(&self) -> Result<(), MlockError>;
}

/// The host's `mlockall(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemoryLocker;

#[cfg(target_os = "linux")]
impl MemoryLocker for SystemMemoryLocker {
    fn supported(&self) -> bool {
        true
    }

    fn lock_all(&self) -> Result<(), MlockError> {
        use nix::sys::mman::{mlockall, MlockAllFlags};

        mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE).map_err(|errno| {
            MlockError::Lock {
                reason: errno.to_string(),
                help: LOCK_HELP,
            }
        })
    }
}

#[cfg(not(target_os = "linux"))]
impl MemoryLocker for SystemMemoryLocker {
    fn supported(&self) -> bool {
        false
    }

    fn lock_all(&self) -> Result<(), MlockError> {
        Err(MlockError::Unsupported(LOCK_HELP))
    }
}

/// Outcome of probing the memory locking capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlockCapability {
    /// Locking is enabled and available. It will be enforced.
    Supported,
    /// Locking is disabled by configuration. Nothing is attempted.
    Tolerated,
    /// Locking is enabled but unavailable. Service construction will fail.
    Fatal,
}

pub fn probe(locker: &dyn MemoryLocker, disable_mlock: bool) -> MlockCapability {
    if disable_mlock {
        MlockCapability::Tolerated
    } else if locker.supported() {
        MlockCapability::Supported
    } else {
        MlockCapability::Fatal
    }
}

/// Lock memory unless the capability says to skip it.
pub fn enforce(locker: &dyn MemoryLocker, disable_mlock: bool) -> Result<MlockCapability, MlockError> {
    let capability = probe(locker, disable_mlock);
    match capability {
        MlockCapability::Tolerated => {}
        MlockCapability::Supported | MlockCapability::Fatal => locker.lock_all()?,
    }
    Ok(capability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLocker {
        supported: bool,
        calls: AtomicUsize,
    }

    impl MemoryLocker for FakeLocker {
        fn supported(&self) -> bool {
            self.supported
        }

        fn lock_all(&self) -> Result<(), MlockError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.supported {
                Ok(())
            } else {
                Err(MlockError::Unsupported(LOCK_HELP))
            }
        }
    }

    fn locker(supported: bool) -> FakeLocker {
        FakeLocker {
            supported,
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn probe_is_tri_state() {
        assert_eq!(probe(&locker(true), false), MlockCapability::Supported);
        assert_eq!(probe(&locker(false), false), MlockCapability::Fatal);
        assert_eq!(probe(&locker(false), true), MlockCapability::Tolerated);
        assert_eq!(probe(&locker(true), true), MlockCapability::Tolerated);
    }

    #[test]
    fn disabled_skips_locking() {
        let l = locker(false);
        assert_eq!(enforce(&l, true).unwrap(), MlockCapability::Tolerated);
        assert_eq!(l.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsupported_and_enabled_fails() {
        let l = locker(false);
        assert!(enforce(&l, false).is_err());
        assert_eq!(l.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn supported_locks_once() {
        let l = locker(true);
        assert_eq!(enforce(&l, false).unwrap(), MlockCapability::Supported);
        assert_eq!(l.calls.load(Ordering::SeqCst), 1);
    }
}
