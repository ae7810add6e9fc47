//! CPU pinning for the worker threads.
//!
//! Pinning is a cache-locality hint only. If the platform refuses it the
//! thread keeps running wherever the scheduler puts it.

use tracing::{debug, warn};

/// Where a worker thread should run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CorePin {
    /// Leave placement to the OS scheduler
    #[default]
    Unpinned,
    /// Pin to the core with this id
    Core(usize),
    /// Pin to the last available core (typically isolated from OS interrupts)
    Last,
}

/// Something able to place the calling thread on a core.
pub trait ThreadPlacement {
    /// Returns `true` if the current thread is now running where requested.
    fn place_current(&self, pin: CorePin) -> bool;
}

/// Placement through the `core_affinity` crate
#[derive(Clone, Copy, Debug, Default)]
pub struct OsPlacement;

impl ThreadPlacement for OsPlacement {
    fn place_current(&self, pin: CorePin) -> bool {
        let core_ids = match pin {
            CorePin::Unpinned => return true,
            _ => core_affinity::get_core_ids().unwrap_or_default(),
        };

        let target = match pin {
            CorePin::Core(id) => core_ids.into_iter().find(|c| c.id == id),
            CorePin::Last => core_ids.last().copied(),
            CorePin::Unpinned => None,
        };

        match target {
            Some(core) => core_affinity::set_for_current(core),
            None => false,
        }
    }
}

impl CorePin {
    /// Apply this pin to the calling thread via the OS.
    ///
    /// A refusal is logged and otherwise ignored.
    pub fn apply(self) -> bool {
        self.apply_with(&OsPlacement)
    }

    pub fn apply_with<P: ThreadPlacement + ?Sized>(self, placement: &P) -> bool {
        let pinned = placement.place_current(self);
        if pinned {
            debug!(pin = ?self, "thread placed");
        } else {
            warn!(pin = ?self, "core pinning unavailable, running unpinned");
        }
        pinned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refuse;

    impl ThreadPlacement for Refuse {
        fn place_current(&self, _pin: CorePin) -> bool {
            false
        }
    }

    #[test]
    fn test_unpinned_always_succeeds() {
        assert!(CorePin::Unpinned.apply());
    }

    #[test]
    fn test_unknown_core_is_refused() {
        assert!(!CorePin::Core(usize::MAX).apply());
    }

    #[test]
    fn test_refusal_is_not_fatal() {
        assert!(!CorePin::Core(0).apply_with(&Refuse));
    }
}
