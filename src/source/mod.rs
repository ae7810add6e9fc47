//! Order Sources - Everything that feeds the producer loop.
//!
//! A source yields [`NewOrder`]s that have already been validated; the
//! producer stamps the id and pushes them into the ring. Malformed input is
//! rejected here (logged and skipped), never handed to the matching core.

pub mod fix;
pub mod packet;
pub mod replay;
pub mod synthetic;
pub mod udp;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::order::{NewOrder, Price};

pub use fix::FixSource;
pub use replay::ReplaySource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
pub use udp::UdpSource;

/// Outcome of asking a source for its next order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourcePoll {
    /// An order is ready to be offered
    Ready(NewOrder),
    /// Nothing right now; ask again after re-checking shutdown
    Idle,
    /// The source will never yield another order
    Exhausted,
}

/// Runs on the producer thread.
pub trait OrderSource: Send {
    fn poll_next(&mut self) -> SourcePoll;
}

impl<S: OrderSource + ?Sized> OrderSource for Box<S> {
    fn poll_next(&mut self) -> SourcePoll {
        (**self).poll_next()
    }
}

/// Convert a decimal price to ticks at `scale` ticks per unit.
///
/// Returns `None` when the price is not on a tick or does not fit, and for
/// any `scale <= 0`, which would collapse or invert the price ordering.
pub(crate) fn decimal_to_ticks(price: Decimal, scale: i64) -> Option<Price> {
    if scale <= 0 {
        return None;
    }
    let scaled = price.checked_mul(Decimal::from(scale))?;
    if !scaled.fract().is_zero() {
        return None;
    }
    scaled.to_i64()
}

/// A finite, in-memory sequence of orders
#[derive(Debug)]
pub struct IterSource<I> {
    orders: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = NewOrder> + Send,
{
    pub fn new(orders: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            orders: orders.into_iter(),
        }
    }
}

impl<I> OrderSource for IterSource<I>
where
    I: Iterator<Item = NewOrder> + Send,
{
    fn poll_next(&mut self) -> SourcePoll {
        match self.orders.next() {
            Some(order) => SourcePoll::Ready(order),
            None => SourcePoll::Exhausted,
        }
    }
}
