//! Fixed-layout binary order packet carried in a single datagram.
//!
//! # Layout (packed, little-endian)
//!
//! | Field        | Type | Offset | Size |
//! |--------------|------|--------|------|
//! | order_id     | i32  | 0      | 4    |
//! | quantity     | i32  | 4      | 4    |
//! | price        | i32  | 8      | 4    |
//! | side         | u8   | 12     | 1    |
//! | timestamp_ns | i64  | 13     | 8    |
//! | **Total**    |      |        | 21   |

use crate::error::DecodeError;
use crate::order::{NewOrder, Price, Qty, Side};

/// Size of one encoded packet
pub const PACKET_LEN: usize = 21;

/// Side byte for a buy
pub const SIDE_BUY: u8 = b'B';
/// Side byte for a sell
pub const SIDE_SELL: u8 = b'S';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderPacket {
    /// Sender's own order id (kept for tracing only)
    pub order_id: i32,
    pub quantity: i32,
    /// Price in ticks
    pub price: i32,
    pub side: u8,
    /// Sender clock at send time, nanoseconds since the Unix epoch
    pub timestamp_ns: i64,
}

impl OrderPacket {
    /// Decode one packet. Only the frame length is checked here; see
    /// [`OrderPacket::to_new_order`] for field validation.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != PACKET_LEN {
            return Err(DecodeError::BadLength {
                expected: PACKET_LEN,
                actual: buf.len(),
            });
        }

        Ok(Self {
            order_id: read_i32(buf, 0),
            quantity: read_i32(buf, 4),
            price: read_i32(buf, 8),
            side: buf[12],
            timestamp_ns: read_i64(buf, 13),
        })
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[0..4].copy_from_slice(&self.order_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.quantity.to_le_bytes());
        buf[8..12].copy_from_slice(&self.price.to_le_bytes());
        buf[12] = self.side;
        buf[13..21].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        buf
    }

    /// Validate the packet and turn it into an order.
    pub fn to_new_order(&self) -> Result<NewOrder, DecodeError> {
        let side = match self.side {
            SIDE_BUY => Side::Buy,
            SIDE_SELL => Side::Sell,
            other => return Err(DecodeError::InvalidSide(format!("{:#04x}", other))),
        };

        let qty = Qty::try_from(self.quantity)
            .ok()
            .filter(|&q| q > 0)
            .ok_or_else(|| DecodeError::InvalidQuantity(self.quantity.to_string()))?;

        Ok(NewOrder::new(side, Price::from(self.price), qty))
    }
}

#[inline]
fn read_i32(buf: &[u8], at: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    i32::from_le_bytes(bytes)
}

#[inline]
fn read_i64(buf: &[u8], at: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    i64::from_le_bytes(bytes)
}
