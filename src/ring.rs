//! Ring Buffer - Bounded lock-free SPSC hand-off between two threads.
//!
//! The buffer holds `capacity` pre-allocated slots and two atomic cursors:
//! `head` (next slot to consume) and `tail` (next slot to produce). One slot
//! is always left unused so that `head == tail` means empty and
//! `tail + 1 == head` means full.
//!
//! ## Ordering
//!
//! ```text
//! producer: write slot[tail] ──► tail.store(Release)
//!                                      │ pairs with
//! consumer:                      tail.load(Acquire) ──► read slot[head] ──► head.store(Release)
//!                                                                                 │ pairs with
//! producer:                                                  head.load(Acquire) ◄─┘
//! ```
//!
//! Only the producer writes `tail` and only the consumer writes `head`.
//! [`RingBuffer::with_capacity`] hands out exactly one [`Producer`] and one
//! [`Consumer`]; neither is `Clone` and both take `&mut self`, so a second
//! producer or consumer cannot be created from safe code.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Keeps a value on its own cache line so the two cursors never false-share.
#[repr(align(64))]
struct CacheAligned<T>(T);

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

/// Shared storage behind a [`Producer`]/[`Consumer`] pair.
pub struct RingBuffer<T> {
    /// Pre-allocated slots, reused for the lifetime of the buffer
    slots: Box<[UnsafeCell<T>]>,
    /// Next slot to be consumed (written by the consumer only)
    head: CacheAligned<AtomicUsize>,
    /// Next slot to be produced (written by the producer only)
    tail: CacheAligned<AtomicUsize>,
    /// Set once the producer handle is dropped
    producer_gone: AtomicBool,
}

// SAFETY: slot access is partitioned by the head/tail hand-off. The producer
// only writes the slot at `tail`, which the consumer cannot read until the
// Release store of the advanced tail; the consumer only reads the slot at
// `head`, which the producer cannot overwrite until the Release store of the
// advanced head. With a single producer and a single consumer (enforced by the
// handle types) no slot is ever accessed by both threads at once.
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T: Copy + Default> RingBuffer<T> {
    /// Allocate a ring with `capacity` slots and split it into its two ends.
    ///
    /// At most `capacity - 1` items can be queued at once.
    ///
    /// # Panics
    /// Panics if `capacity < 2`.
    pub fn with_capacity(capacity: usize) -> (Producer<T>, Consumer<T>) {
        assert!(capacity >= 2, "ring capacity must be at least 2 slots");

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let ring = Arc::new(Self {
            slots,
            head: CacheAligned(AtomicUsize::new(0)),
            tail: CacheAligned(AtomicUsize::new(0)),
            producer_gone: AtomicBool::new(false),
        });

        (
            Producer {
                ring: Arc::clone(&ring),
            },
            Consumer { ring },
        )
    }
}

impl<T> RingBuffer<T> {
    /// Number of slots (one more than the number of items that fit)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Maximum number of items queued at once
    #[inline]
    pub fn usable_capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Number of queued items. Only a snapshot when the other end is active.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (tail + self.capacity() - head) % self.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        let tail = self.tail.load(Ordering::Acquire);
        self.advance(tail) == self.head.load(Ordering::Acquire)
    }

    #[inline]
    fn advance(&self, cursor: usize) -> usize {
        (cursor + 1) % self.capacity()
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .finish()
    }
}

/// The producing end. Owned by exactly one thread.
pub struct Producer<T> {
    ring: Arc<RingBuffer<T>>,
}

impl<T: Copy> Producer<T> {
    /// Offer an item to the consumer.
    ///
    /// Returns `false` without touching any state when the buffer is full.
    /// That is the backpressure signal; retrying is the caller's policy.
    #[inline]
    pub fn push(&mut self, item: T) -> bool {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let next_tail = ring.advance(tail);

        if next_tail == ring.head.load(Ordering::Acquire) {
            return false;
        }

        // SAFETY: `tail < capacity` always holds, and the slot at `tail` is
        // outside the consumer's readable range until the store below.
        unsafe {
            *ring.slots.get_unchecked(tail).get() = item;
        }
        ring.tail.store(next_tail, Ordering::Release);
        true
    }
}

impl<T> Producer<T> {
    /// The shared buffer (read-only observers)
    #[inline]
    pub fn buffer(&self) -> &RingBuffer<T> {
        &self.ring
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.ring.producer_gone.store(true, Ordering::Release);
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("ring", &*self.ring).finish()
    }
}

/// The consuming end. Owned by exactly one thread.
pub struct Consumer<T> {
    ring: Arc<RingBuffer<T>>,
}

impl<T: Copy> Consumer<T> {
    /// Take the oldest queued item, or `None` if the buffer is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);

        if head == ring.tail.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: `head != tail`, so the slot at `head` was fully written
        // before the producer's Release store of the tail we just acquired,
        // and the producer will not reuse it until we advance head.
        let item = unsafe { *ring.slots.get_unchecked(head).get() };
        ring.head.store(ring.advance(head), Ordering::Release);
        Some(item)
    }
}

impl<T> Consumer<T> {
    /// The shared buffer (read-only observers)
    #[inline]
    pub fn buffer(&self) -> &RingBuffer<T> {
        &self.ring
    }

    /// True once the producer handle has been dropped. Items it pushed
    /// before dropping are still poppable.
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.ring.producer_gone.load(Ordering::Acquire)
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("ring", &*self.ring).finish()
    }
}
