//! Replay of recorded orders from CSV.
//!
//! Expected columns (with a header row): `side,price,qty`, e.g.
//!
//! ```text
//! side,price,qty
//! buy,100.00,50
//! sell,99.00,30
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::error::{DecodeError, SourceError};
use crate::order::{NewOrder, Qty, Side};
use crate::source::{decimal_to_ticks, OrderSource, SourcePoll};

#[derive(Debug, Deserialize)]
pub struct ReplayRow {
    pub side: String,
    pub price: Decimal,
    pub qty: i64,
}

impl ReplayRow {
    /// Convert a raw row to an order. `price_scale` is ticks per price unit.
    pub fn to_new_order(&self, price_scale: i64) -> Result<NewOrder, DecodeError> {
        let side = match self.side.trim().to_ascii_lowercase().as_str() {
            "buy" | "bid" | "b" => Side::Buy,
            "sell" | "ask" | "s" => Side::Sell,
            _ => return Err(DecodeError::InvalidSide(self.side.clone())),
        };

        let price = decimal_to_ticks(self.price, price_scale)
            .ok_or_else(|| DecodeError::InvalidPrice(self.price.to_string()))?;

        let qty = Qty::try_from(self.qty)
            .ok()
            .filter(|&q| q > 0)
            .ok_or_else(|| DecodeError::InvalidQuantity(self.qty.to_string()))?;

        Ok(NewOrder::new(side, price, qty))
    }
}

pub struct ReplaySource<R> {
    rows: csv::DeserializeRecordsIntoIter<R, ReplayRow>,
    price_scale: i64,
    rejected: u64,
}

impl ReplaySource<File> {
    pub fn from_path(path: impl AsRef<Path>, price_scale: i64) -> Result<Self, SourceError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        Ok(Self::with_reader(reader, price_scale))
    }
}

impl<R: Read + Send> ReplaySource<R> {
    pub fn from_reader(reader: R, price_scale: i64) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::with_reader(reader, price_scale)
    }
}

impl<R: Read> ReplaySource<R> {
    fn with_reader(reader: csv::Reader<R>, price_scale: i64) -> Self {
        Self {
            rows: reader.into_deserialize(),
            price_scale,
            rejected: 0,
        }
    }

    /// Rows skipped because they failed to parse or validate
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl<R: Read + Send> OrderSource for ReplaySource<R> {
    fn poll_next(&mut self) -> SourcePoll {
        for row in self.rows.by_ref() {
            let decoded = row
                .map_err(|err| err.to_string())
                .and_then(|row| {
                    row.to_new_order(self.price_scale)
                        .map_err(|err| err.to_string())
                });

            match decoded {
                Ok(order) => return SourcePoll::Ready(order),
                Err(error) => {
                    self.rejected += 1;
                    warn!(%error, "skipping replay row");
                }
            }
        }
        SourcePoll::Exhausted
    }
}
