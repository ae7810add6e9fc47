//! Run summary handed to the reporting sink at shutdown.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::book::{BookSnapshot, MatchStats};
use crate::order::Price;

#[derive(Clone, Debug)]
pub struct RunReport {
    /// Wall-clock time the pipeline was started
    pub started_at: DateTime<Utc>,
    /// Time the consumer loop ran
    pub elapsed: Duration,
    /// Orders successfully pushed into the ring
    pub produced: u64,
    /// Orders popped and applied to the book
    pub processed: u64,
    /// Push attempts refused because the ring was full
    pub backpressure_retries: u64,
    /// Orders built but never pushed because shutdown arrived first
    pub abandoned: u64,
    pub match_stats: MatchStats,
    /// Top of book when the consumer stopped
    pub book: BookSnapshot,
}

impl RunReport {
    /// Processed orders per second of consumer run time
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    /// Orders pushed but never popped (left in the ring at shutdown)
    pub fn undelivered(&self) -> u64 {
        self.produced.saturating_sub(self.processed)
    }
}

fn fmt_level(level: Option<&(Price, u64)>) -> String {
    match level {
        Some((price, qty)) => format!("{} x {}", qty, price),
        None => "-".to_string(),
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== SIMULATION ENDED ===")?;
        writeln!(
            f,
            "Started:          {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
        )?;
        writeln!(f, "Orders Produced:  {}", self.produced)?;
        writeln!(f, "Orders Processed: {}", self.processed)?;
        writeln!(f, "Time Elapsed:     {} ms", self.elapsed.as_millis())?;
        writeln!(f, "Throughput:       {:.0} orders/sec", self.throughput())?;
        writeln!(
            f,
            "Backpressure:     {} retries, {} abandoned",
            self.backpressure_retries, self.abandoned
        )?;
        writeln!(
            f,
            "Matching:         {} levels consumed, {} rested, {} ignored",
            self.match_stats.levels_consumed,
            self.match_stats.orders_rested,
            self.match_stats.orders_ignored
        )?;
        writeln!(f, "Best Bid:         {}", fmt_level(self.book.bids.first()))?;
        write!(f, "Best Ask:         {}", fmt_level(self.book.asks.first()))
    }
}
