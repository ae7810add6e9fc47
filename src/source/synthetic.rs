//! Synthetic order flow from a seeded PRNG.
//!
//! Prices cluster in a narrow band above a base price so that both sides
//! keep crossing, which exercises the consumption path as much as resting.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::order::{NewOrder, Price, Qty, Side};
use crate::source::{OrderSource, SourcePoll};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    /// Lowest generated price, in ticks. Prices past `Price::MAX` saturate.
    pub base_price: Price,
    /// Number of distinct prices above `base_price` (must be > 0)
    pub price_levels: u32,
    /// Quantity of every generated order
    pub quantity: Qty,
    /// PRNG seed; the same seed always yields the same flow
    pub seed: u64,
    /// Stop after this many orders
    pub limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            base_price: 10_000, // $100.00 at a scale of 100
            price_levels: 5,
            quantity: 10,
            seed: 0xDEAD_BEEF,
            limit: None,
        }
    }
}

#[derive(Debug)]
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: ChaCha8Rng,
    generated: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            generated: 0,
        }
    }

    /// Orders generated so far
    pub fn generated(&self) -> u64 {
        self.generated
    }

    fn next_order(&mut self) -> NewOrder {
        let offset = self.rng.gen_range(0..self.config.price_levels.max(1));
        let side = if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };

        NewOrder::new(
            side,
            self.config.base_price.saturating_add(Price::from(offset)),
            self.config.quantity,
        )
    }
}

impl OrderSource for SyntheticSource {
    fn poll_next(&mut self) -> SourcePoll {
        if self.config.limit.is_some_and(|limit| self.generated >= limit) {
            return SourcePoll::Exhausted;
        }
        self.generated += 1;
        SourcePoll::Ready(self.next_order())
    }
}
