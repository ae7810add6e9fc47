//! Matching Core - Aggregated price-level book driven one order at a time.
//!
//! Each side is an ordered map from price to resting aggregate quantity:
//! bids are keyed by `Reverse(price)` so the best (highest) bid sorts first,
//! asks are keyed by price so the best (lowest) ask sorts first.
//!
//! ## Level consumption
//!
//! An incoming order that reaches the best opposite level removes that
//! **whole** level, whatever the relationship between its own quantity and
//! the level's aggregate. Quantity is not conserved across the touch and the
//! incoming order never rests afterwards. Replace [`MatchingCore::process`]
//! with decrement-and-maybe-remove logic before using this as a real book.
//!
//! The core owns its maps outright and is only ever touched by the consumer
//! thread, so there is no locking here.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::order::{Order, Price, Side};

/// Result of applying one order to the book
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The best opposite level crossed and was removed entirely
    LevelConsumed {
        /// Side of the removed level
        side: Side,
        price: Price,
        /// Aggregate quantity the level held when it was removed
        qty: u64,
    },
    /// No qualifying opposite level; the order's quantity was added to its own side
    Rested {
        side: Side,
        price: Price,
        /// Aggregate at this price after the order was added
        level_qty: u64,
    },
    /// A zero-quantity order with nothing to cross; no level was created
    Ignored,
}

/// Running counters kept by the core
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub orders: u64,
    pub levels_consumed: u64,
    pub orders_rested: u64,
    pub orders_ignored: u64,
}

/// Top-of-book view, best level first on each side
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookSnapshot {
    pub bids: Vec<(Price, u64)>,
    pub asks: Vec<(Price, u64)>,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|&(p, _)| p)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|&(p, _)| p)
    }
}

/// Price-level matching core
#[derive(Clone, Debug, Default)]
pub struct MatchingCore {
    /// Bid levels, highest price first
    bids: BTreeMap<Reverse<Price>, u64>,
    /// Ask levels, lowest price first
    asks: BTreeMap<Price, u64>,
    stats: MatchStats,
}

impl MatchingCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one order to the book.
    ///
    /// Degenerate input (zero quantity) is not rejected: it still consumes
    /// a crossing level, but never creates an empty one.
    pub fn process(&mut self, order: &Order) -> MatchOutcome {
        self.stats.orders += 1;

        let outcome = match order.side {
            // Buyer crosses when the lowest ask is at or below its limit
            Side::Buy => match self.best_ask() {
                Some(ask) if ask <= order.price => {
                    let qty = self.asks.remove(&ask).unwrap_or_default();
                    MatchOutcome::LevelConsumed {
                        side: Side::Sell,
                        price: ask,
                        qty,
                    }
                }
                _ => self.rest(order),
            },
            // Seller crosses when the highest bid is at or above its limit
            Side::Sell => match self.best_bid() {
                Some(bid) if bid >= order.price => {
                    let qty = self.bids.remove(&Reverse(bid)).unwrap_or_default();
                    MatchOutcome::LevelConsumed {
                        side: Side::Buy,
                        price: bid,
                        qty,
                    }
                }
                _ => self.rest(order),
            },
        };

        match outcome {
            MatchOutcome::LevelConsumed { .. } => self.stats.levels_consumed += 1,
            MatchOutcome::Rested { .. } => self.stats.orders_rested += 1,
            MatchOutcome::Ignored => self.stats.orders_ignored += 1,
        }
        outcome
    }

    /// Add the order's quantity to its own side, creating the level if absent.
    fn rest(&mut self, order: &Order) -> MatchOutcome {
        if order.qty == 0 {
            return MatchOutcome::Ignored;
        }

        let level = match order.side {
            Side::Buy => self.bids.entry(Reverse(order.price)).or_insert(0),
            Side::Sell => self.asks.entry(order.price).or_insert(0),
        };
        *level += u64::from(order.qty);

        MatchOutcome::Rested {
            side: order.side,
            price: order.price,
            level_qty: *level,
        }
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Highest resting buy price
    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first_key_value().map(|(&Reverse(p), _)| p)
    }

    /// Lowest resting sell price
    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first_key_value().map(|(&p, _)| p)
    }

    /// Calculate spread (best_ask - best_bid). A spread only exists when
    /// both sides are present and the difference fits in a `Price`.
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.checked_sub(bid),
            _ => None,
        }
    }

    // ========================================================================
    // Level Access
    // ========================================================================

    /// Aggregate quantity resting at a price (0 if there is no level)
    pub fn depth_at(&self, side: Side, price: Price) -> u64 {
        match side {
            Side::Buy => self.bids.get(&Reverse(price)).copied(),
            Side::Sell => self.asks.get(&price).copied(),
        }
        .unwrap_or(0)
    }

    /// Bid levels, best (highest) first
    pub fn bid_levels(&self) -> impl Iterator<Item = (Price, u64)> + '_ {
        self.bids.iter().map(|(&Reverse(p), &q)| (p, q))
    }

    /// Ask levels, best (lowest) first
    pub fn ask_levels(&self) -> impl Iterator<Item = (Price, u64)> + '_ {
        self.asks.iter().map(|(&p, &q)| (p, q))
    }

    pub fn bid_level_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_level_count(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Top `depth` levels of each side
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            bids: self.bid_levels().take(depth).collect(),
            asks: self.ask_levels().take(depth).collect(),
        }
    }

    pub fn stats(&self) -> MatchStats {
        self.stats
    }

    /// Drop every level and reset counters
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.stats = MatchStats::default();
    }

    /// Hash of every resting level (for determinism testing)
    pub fn state_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();

        self.bids.len().hash(&mut hasher);
        for (price, qty) in self.bid_levels() {
            price.hash(&mut hasher);
            qty.hash(&mut hasher);
        }
        self.asks.len().hash(&mut hasher);
        for (price, qty) in self.ask_levels() {
            price.hash(&mut hasher);
            qty.hash(&mut hasher);
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy(id: u64, price: Price, qty: u32) -> Order {
        Order::new(id, Side::Buy, price, qty)
    }

    fn sell(id: u64, price: Price, qty: u32) -> Order {
        Order::new(id, Side::Sell, price, qty)
    }

    #[test]
    fn test_empty_core() {
        let core = MatchingCore::new();
        assert!(core.is_empty());
        assert_eq!(core.best_bid(), None);
        assert_eq!(core.best_ask(), None);
        assert_eq!(core.spread(), None);
    }

    #[test]
    fn test_buy_consumes_whole_ask_level() {
        let mut core = MatchingCore::new();

        let rested = core.process(&sell(1, 101, 500));
        assert_eq!(
            rested,
            MatchOutcome::Rested {
                side: Side::Sell,
                price: 101,
                level_qty: 500
            }
        );

        // Quantity 1 still removes all 500 resting
        let outcome = core.process(&buy(2, 102, 1));
        assert_eq!(
            outcome,
            MatchOutcome::LevelConsumed {
                side: Side::Sell,
                price: 101,
                qty: 500
            }
        );
        assert_eq!(core.ask_level_count(), 0);
        assert_eq!(core.bid_level_count(), 0);
    }

    #[test]
    fn test_resting_buys_aggregate() {
        let mut core = MatchingCore::new();

        core.process(&buy(1, 99, 10));
        let outcome = core.process(&buy(2, 99, 25));

        assert_eq!(
            outcome,
            MatchOutcome::Rested {
                side: Side::Buy,
                price: 99,
                level_qty: 35
            }
        );
        assert_eq!(core.depth_at(Side::Buy, 99), 35);
        assert_eq!(core.bid_level_count(), 1);
    }

    #[test]
    fn test_sell_crosses_higher_bid() {
        let mut core = MatchingCore::new();

        core.process(&buy(1, 100, 50));
        let outcome = core.process(&sell(2, 99, 30));

        assert_eq!(
            outcome,
            MatchOutcome::LevelConsumed {
                side: Side::Buy,
                price: 100,
                qty: 50
            }
        );
        assert!(core.is_empty());
    }

    #[test]
    fn test_equal_prices_cross() {
        let mut core = MatchingCore::new();

        core.process(&sell(1, 100, 10));
        assert!(matches!(
            core.process(&buy(2, 100, 10)),
            MatchOutcome::LevelConsumed { price: 100, .. }
        ));

        core.process(&buy(3, 100, 10));
        assert!(matches!(
            core.process(&sell(4, 100, 10)),
            MatchOutcome::LevelConsumed { price: 100, .. }
        ));
        assert!(core.is_empty());
    }

    #[test]
    fn test_spread_at_extreme_prices() {
        let mut core = MatchingCore::new();

        core.process(&sell(1, Price::MAX, 10));
        core.process(&buy(2, Price::MIN, 10));
        assert_eq!(core.best_ask(), Some(Price::MAX));
        assert_eq!(core.best_bid(), Some(Price::MIN));
        assert_eq!(core.spread(), None);

        core.process(&buy(3, 0, 10));
        assert_eq!(core.spread(), Some(Price::MAX));
    }

    #[test]
    fn test_non_crossing_orders_rest() {
        let mut core = MatchingCore::new();

        core.process(&sell(1, 105, 10));
        core.process(&buy(2, 104, 10));

        assert_eq!(core.best_bid(), Some(104));
        assert_eq!(core.best_ask(), Some(105));
        assert_eq!(core.spread(), Some(1));
    }

    #[test]
    fn test_only_best_level_is_consumed() {
        let mut core = MatchingCore::new();

        core.process(&sell(1, 103, 10));
        core.process(&sell(2, 101, 20));
        core.process(&sell(3, 102, 30));

        // Buy at 104 crosses every level but only the best one is removed
        core.process(&buy(4, 104, 1000));

        let asks: Vec<_> = core.ask_levels().collect();
        assert_eq!(asks, vec![(102, 30), (103, 10)]);
        assert_eq!(core.bid_level_count(), 0);
    }

    #[test]
    fn test_levels_are_ordered_best_first() {
        let mut core = MatchingCore::new();

        for (id, price) in [(1, 98), (2, 100), (3, 99)] {
            core.process(&buy(id, price, 10));
        }
        for (id, price) in [(4, 103), (5, 101), (6, 102)] {
            core.process(&sell(id, price, 10));
        }

        let bids: Vec<_> = core.bid_levels().map(|(p, _)| p).collect();
        let asks: Vec<_> = core.ask_levels().map(|(p, _)| p).collect();
        assert_eq!(bids, vec![100, 99, 98]);
        assert_eq!(asks, vec![101, 102, 103]);
    }

    #[test]
    fn test_zero_quantity_never_creates_level() {
        let mut core = MatchingCore::new();

        assert_eq!(core.process(&buy(1, 100, 0)), MatchOutcome::Ignored);
        assert!(core.is_empty());

        // ...but it still consumes a crossing level
        core.process(&sell(2, 100, 40));
        assert!(matches!(
            core.process(&buy(3, 100, 0)),
            MatchOutcome::LevelConsumed { qty: 40, .. }
        ));
        assert!(core.is_empty());
    }

    #[test]
    fn test_negative_prices() {
        let mut core = MatchingCore::new();

        core.process(&sell(1, -5, 10));
        core.process(&buy(2, -10, 10));
        assert_eq!(core.best_ask(), Some(-5));
        assert_eq!(core.best_bid(), Some(-10));

        core.process(&buy(3, -5, 10));
        assert_eq!(core.best_ask(), None);
    }

    #[test]
    fn test_stats_and_snapshot() {
        let mut core = MatchingCore::new();

        core.process(&buy(1, 100, 10));
        core.process(&buy(2, 99, 20));
        core.process(&sell(3, 102, 5));
        core.process(&sell(4, 100, 5));
        core.process(&sell(5, 101, 0));

        let stats = core.stats();
        assert_eq!(stats.orders, 5);
        assert_eq!(stats.orders_rested, 3);
        assert_eq!(stats.levels_consumed, 1);
        assert_eq!(stats.orders_ignored, 1);

        let snap = core.snapshot(1);
        assert_eq!(snap.bids, vec![(99, 20)]);
        assert_eq!(snap.asks, vec![(102, 5)]);
        assert_eq!(snap.best_bid(), Some(99));
        assert_eq!(snap.best_ask(), Some(102));

        core.clear();
        assert!(core.is_empty());
        assert_eq!(core.stats(), MatchStats::default());
    }

    #[test]
    fn test_state_hash_tracks_levels() {
        let mut a = MatchingCore::new();
        let mut b = MatchingCore::new();

        for core in [&mut a, &mut b] {
            core.process(&buy(1, 100, 10));
            core.process(&sell(2, 105, 10));
        }
        assert_eq!(a.state_hash(), b.state_hash());

        b.process(&buy(3, 100, 1));
        assert_ne!(a.state_hash(), b.state_hash());
    }
}
