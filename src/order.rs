//! Order types flowing through the pipeline.
//!
//! Sources yield [`NewOrder`]s; the producer loop stamps them with an id
//! and the resulting [`Order`] is copied by value through the ring buffer.

use std::fmt;

/// Fixed-point price in venue ticks (e.g., $100.50 -> 10050 at a scale of 100)
pub type Price = i64;

/// Order quantity
pub type Qty = u32;

/// Producer-assigned order identity
pub type OrderId = u64;

/// Order side
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (rests as a bid)
    #[default]
    Buy = 0,
    /// Sell side (rests as an ask)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// An order as offered by a source, before the producer assigns its id.
///
/// Sources are responsible for rejecting malformed input before yielding
/// one of these; the matching core does not validate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub price: Price,
    pub qty: Qty,
    pub side: Side,
}

impl NewOrder {
    #[inline]
    pub const fn new(side: Side, price: Price, qty: Qty) -> Self {
        Self { price, qty, side }
    }

    /// Attach the producer-assigned id.
    #[inline]
    pub const fn with_id(self, id: OrderId) -> Order {
        Order {
            id,
            price: self.price,
            qty: self.qty,
            side: self.side,
        }
    }
}

/// A fully-formed order. Immutable once built; each thread holds its own copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Order {
    /// Monotonically increasing per producer, unique within a run
    pub id: OrderId,
    /// Limit price in ticks
    pub price: Price,
    /// Order quantity
    pub qty: Qty,
    /// Order side
    pub side: Side,
}

impl Order {
    #[inline]
    pub const fn new(id: OrderId, side: Side, price: Price, qty: Qty) -> Self {
        Self { id, price, qty, side }
    }
}
