//! Pipeline configuration.

use std::time::Duration;

use crate::affinity::CorePin;
use crate::error::{PipelineError, Result};
use crate::idle::IdleStrategy;

/// Slot count used when none is given
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Ring buffer slot count (holds `capacity - 1` orders)
    pub capacity: usize,
    /// Placement of the producer thread
    pub producer_core: CorePin,
    /// Placement of the consumer thread
    pub consumer_core: CorePin,
    /// Wait policy while the ring is full or empty
    pub idle: IdleStrategy,
    /// Pause after each produced order, bounding the production rate
    pub produce_interval: Option<Duration>,
    /// Keep popping after shutdown until the producer is gone and the ring is empty
    pub drain_on_shutdown: bool,
    /// Levels per side kept in the final report
    pub report_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            producer_core: CorePin::Core(0),
            consumer_core: CorePin::Core(1),
            idle: IdleStrategy::BusySpin,
            produce_interval: Some(Duration::from_micros(1)),
            drain_on_shutdown: false,
            report_depth: 5,
        }
    }
}

impl PipelineConfig {
    /// Same as the default, but leaves both threads unpinned.
    pub fn unpinned() -> Self {
        Self {
            producer_core: CorePin::Unpinned,
            consumer_core: CorePin::Unpinned,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity < 2 {
            return Err(PipelineError::InvalidCapacity(self.capacity));
        }
        if let (CorePin::Core(p), CorePin::Core(c)) = (self.producer_core, self.consumer_core) {
            if p == c {
                return Err(PipelineError::SharedCore(p));
            }
        }
        Ok(())
    }
}
