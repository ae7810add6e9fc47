//! What a worker does while the ring is full (producer) or empty (consumer).

use std::time::Duration;

/// Wait policy for the spin-retry loops.
///
/// Every variant returns to the caller after a bounded pause so the loop
/// can re-check the shutdown token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdleStrategy {
    /// Spin-loop hint only; burns the core for the lowest hand-off latency
    #[default]
    BusySpin,
    /// Give the time slice back to the scheduler
    Yield,
    /// Spin `spins` times, then sleep for `sleep` on every further idle round
    Backoff { spins: u32, sleep: Duration },
}

impl IdleStrategy {
    /// Wait once. `rounds` counts consecutive idle rounds and is reset by
    /// the caller whenever work was found.
    #[inline]
    pub fn idle(&self, rounds: &mut u32) {
        match *self {
            IdleStrategy::BusySpin => std::hint::spin_loop(),
            IdleStrategy::Yield => std::thread::yield_now(),
            IdleStrategy::Backoff { spins, sleep } => {
                if *rounds < spins {
                    std::hint::spin_loop();
                } else {
                    std::thread::sleep(sleep);
                }
            }
        }
        *rounds = rounds.saturating_add(1);
    }
}
