//! FIX-style tag=value decoding for new order messages.
//!
//! Only the tags needed to build an order are read. Checksums, body length
//! and session-level messages are ignored.
//!
//! ```text
//! 8=FIX.4.2|35=D|55=INFY|54=2|38=500|44=1450.00|
//! ```

use std::io::BufRead;

use rust_decimal::Decimal;
use tracing::warn;

use crate::error::DecodeError;
use crate::order::{NewOrder, Qty, Side};
use crate::source::{decimal_to_ticks, OrderSource, SourcePoll};

/// Field separators accepted between tag=value pairs
const SEPARATORS: [char; 2] = ['|', '\x01'];

const TAG_MSG_TYPE: &str = "35";
const TAG_SYMBOL: &str = "55";
const TAG_SIDE: &str = "54";
const TAG_ORDER_QTY: &str = "38";
const TAG_PRICE: &str = "44";

/// New order single
const MSG_NEW_ORDER: &str = "D";

/// The tags of interest, borrowed from the raw message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixFields<'a> {
    pub msg_type: Option<&'a str>,
    pub symbol: Option<&'a str>,
    pub side: Option<&'a str>,
    pub order_qty: Option<&'a str>,
    pub price: Option<&'a str>,
}

impl<'a> FixFields<'a> {
    /// Split a message into its fields without copying. Tokens without an
    /// `=` are skipped; a repeated tag keeps its last value.
    pub fn parse(message: &'a str) -> Self {
        let mut fields = Self::default();

        for token in message.split(&SEPARATORS[..]) {
            let Some((tag, value)) = token.split_once('=') else {
                continue;
            };
            match tag.trim() {
                TAG_MSG_TYPE => fields.msg_type = Some(value),
                TAG_SYMBOL => fields.symbol = Some(value),
                TAG_SIDE => fields.side = Some(value),
                TAG_ORDER_QTY => fields.order_qty = Some(value),
                TAG_PRICE => fields.price = Some(value),
                _ => {}
            }
        }

        fields
    }
}

/// Decode a new order message. `price_scale` is ticks per price unit and
/// must be positive; otherwise every price is rejected.
pub fn decode_new_order(message: &str, price_scale: i64) -> Result<NewOrder, DecodeError> {
    let fields = FixFields::parse(message);

    let msg_type = fields.msg_type.ok_or(DecodeError::MissingField("35 (MsgType)"))?;
    if msg_type != MSG_NEW_ORDER {
        return Err(DecodeError::UnsupportedType(msg_type.to_string()));
    }

    let side = match fields.side.ok_or(DecodeError::MissingField("54 (Side)"))? {
        "1" => Side::Buy,
        "2" => Side::Sell,
        other => return Err(DecodeError::InvalidSide(other.to_string())),
    };

    let raw_qty = fields.order_qty.ok_or(DecodeError::MissingField("38 (OrderQty)"))?;
    let qty = raw_qty
        .parse::<Qty>()
        .ok()
        .filter(|&q| q > 0)
        .ok_or_else(|| DecodeError::InvalidQuantity(raw_qty.to_string()))?;

    let raw_price = fields.price.ok_or(DecodeError::MissingField("44 (Price)"))?;
    let price = raw_price
        .parse::<Decimal>()
        .ok()
        .and_then(|p| decimal_to_ticks(p, price_scale))
        .ok_or_else(|| DecodeError::InvalidPrice(raw_price.to_string()))?;

    Ok(NewOrder::new(side, price, qty))
}

/// Reads one FIX message per line.
pub struct FixSource<R> {
    reader: R,
    price_scale: i64,
    line: String,
    rejected: u64,
}

impl<R: BufRead + Send> FixSource<R> {
    pub fn new(reader: R, price_scale: i64) -> Self {
        Self {
            reader,
            price_scale,
            line: String::new(),
            rejected: 0,
        }
    }

    /// Messages skipped because they failed to decode
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl<R: BufRead + Send> OrderSource for FixSource<R> {
    fn poll_next(&mut self) -> SourcePoll {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return SourcePoll::Exhausted,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "FIX input failed, closing source");
                    return SourcePoll::Exhausted;
                }
            }

            let message = self.line.trim();
            if message.is_empty() {
                continue;
            }

            match decode_new_order(message, self.price_scale) {
                Ok(order) => return SourcePoll::Ready(order),
                Err(err) => {
                    self.rejected += 1;
                    warn!(error = %err, raw = message, "rejected FIX message");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_fields() {
        let fields = FixFields::parse("8=FIX.4.2|35=D|55=INFY|54=2|38=500|44=1450.00|");
        assert_eq!(fields.msg_type, Some("D"));
        assert_eq!(fields.symbol, Some("INFY"));
        assert_eq!(fields.side, Some("2"));
        assert_eq!(fields.order_qty, Some("500"));
        assert_eq!(fields.price, Some("1450.00"));
    }

    #[test]
    fn test_decode_sell() {
        let message = "8=FIX.4.2|35=D|55=INFY|54=2|38=500|44=1450.00|";
        let order = decode_new_order(message, 100).unwrap();
        assert_eq!(order, NewOrder::new(Side::Sell, 145_000, 500));
    }

    #[test]
    fn test_decode_soh_separated_buy() {
        let message = "8=FIX.4.2\x0135=D\x0154=1\x0138=10\x0144=100.5\x01";
        let order = decode_new_order(message, 100).unwrap();
        assert_eq!(order, NewOrder::new(Side::Buy, 10_050, 10));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            decode_new_order("35=8|54=1|38=10|44=1", 1),
            Err(DecodeError::UnsupportedType("8".into()))
        );
        assert_eq!(
            decode_new_order("35=D|54=3|38=10|44=1", 1),
            Err(DecodeError::InvalidSide("3".into()))
        );
        assert_eq!(
            decode_new_order("35=D|54=1|38=0|44=1", 1),
            Err(DecodeError::InvalidQuantity("0".into()))
        );
        assert_eq!(
            decode_new_order("35=D|54=1|38=-5|44=1", 1),
            Err(DecodeError::InvalidQuantity("-5".into()))
        );
        assert_eq!(
            decode_new_order("35=D|54=1|38=5|44=abc", 1),
            Err(DecodeError::InvalidPrice("abc".into()))
        );
        assert!(matches!(
            decode_new_order("35=D|54=1|44=1", 1),
            Err(DecodeError::MissingField(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_price_scale() {
        assert_eq!(
            decode_new_order("35=D|54=1|38=10|44=100.25|", 0),
            Err(DecodeError::InvalidPrice("100.25".into()))
        );
        assert_eq!(
            decode_new_order("35=D|54=2|38=10|44=101|", -100),
            Err(DecodeError::InvalidPrice("101".into()))
        );
    }

    #[test]
    fn test_source_skips_rejected_lines() {
        let input = "35=D|54=1|38=10|44=100|\n\n35=D|54=1|38=0|44=100|\n35=D|54=2|38=7|44=101|\n";
        let mut source = FixSource::new(Cursor::new(input), 1);

        assert_eq!(
            source.poll_next(),
            SourcePoll::Ready(NewOrder::new(Side::Buy, 100, 10))
        );
        assert_eq!(
            source.poll_next(),
            SourcePoll::Ready(NewOrder::new(Side::Sell, 101, 7))
        );
        assert_eq!(source.poll_next(), SourcePoll::Exhausted);
        assert_eq!(source.rejected(), 1);
    }
}
