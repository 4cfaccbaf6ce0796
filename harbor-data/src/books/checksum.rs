use crate::books::OrderBook;
use rust_decimal::Decimal;

/// Number of levels per side in the Kraken book checksum pre-image.
const KRAKEN_CHECKSUM_DEPTH: usize = 10;

/// Number of levels per side in the OKX book checksum pre-image.
const OKX_CHECKSUM_DEPTH: usize = 25;

/// Venue documented orderbook checksum methods.
///
/// Each venue defines how the top of the local book is serialised into a pre-image whose CRC32
/// must match the checksum sent on the wire. Mismatch means the local book diverged and must be
/// resynchronised from a fresh snapshot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChecksumMethod {
    /// Top-10 asks then top-10 bids, each level serialised as trimmed `price` then `amount`
    /// digits with the decimal point and leading zeros removed.
    ///
    /// See docs: <https://docs.kraken.com/websockets/#book-checksum>
    Kraken,
    /// Top-25 bid and ask levels interleaved as `bid_price:bid_amount:ask_price:ask_amount:...`.
    ///
    /// See docs: <https://www.okx.com/docs-v5/en/#websocket-api-checksum>
    Okx,
}

impl ChecksumMethod {
    /// Compute the CRC32 checksum of the provided [`OrderBook`] using this venue's method.
    pub fn compute(&self, book: &OrderBook) -> u32 {
        match self {
            ChecksumMethod::Kraken => checksum_kraken(book),
            ChecksumMethod::Okx => checksum_okx(book),
        }
    }
}

fn checksum_kraken(book: &OrderBook) -> u32 {
    let mut hasher = crc32fast::Hasher::new();

    for level in book.asks().levels().iter().take(KRAKEN_CHECKSUM_DEPTH) {
        hasher.update(trimmed_digits(level.price).as_bytes());
        hasher.update(trimmed_digits(level.amount).as_bytes());
    }
    for level in book.bids().levels().iter().take(KRAKEN_CHECKSUM_DEPTH) {
        hasher.update(trimmed_digits(level.price).as_bytes());
        hasher.update(trimmed_digits(level.amount).as_bytes());
    }

    hasher.finalize()
}

fn checksum_okx(book: &OrderBook) -> u32 {
    let bids = book.bids().levels().iter().take(OKX_CHECKSUM_DEPTH);
    let asks = book.asks().levels().iter().take(OKX_CHECKSUM_DEPTH);

    let mut fields = Vec::with_capacity(OKX_CHECKSUM_DEPTH * 4);
    let mut bids = bids.peekable();
    let mut asks = asks.peekable();
    while bids.peek().is_some() || asks.peek().is_some() {
        if let Some(bid) = bids.next() {
            fields.push(bid.price.normalize().to_string());
            fields.push(bid.amount.normalize().to_string());
        }
        if let Some(ask) = asks.next() {
            fields.push(ask.price.normalize().to_string());
            fields.push(ask.amount.normalize().to_string());
        }
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(fields.join(":").as_bytes());
    hasher.finalize()
}

/// Serialise a decimal for the Kraken pre-image: remove the decimal point and strip leading
/// zeros.
fn trimmed_digits(value: Decimal) -> String {
    let digits = value
        .normalize()
        .to_string()
        .chars()
        .filter(|char| *char != '.')
        .collect::<String>();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::Level;
    use rust_decimal_macros::dec;

    fn book() -> OrderBook {
        OrderBook::new(
            1,
            None,
            vec![
                Level::new(dec!(6621.55), dec!(0.16356700)),
                Level::new(dec!(6621.45), dec!(0.3)),
            ],
            vec![
                Level::new(dec!(6622.46), dec!(1.5)),
                Level::new(dec!(6622.50), dec!(2.0)),
            ],
        )
    }

    #[test]
    fn test_trimmed_digits() {
        assert_eq!(trimmed_digits(dec!(0.16356700)), "163567");
        assert_eq!(trimmed_digits(dec!(6621.55)), "662155");
        assert_eq!(trimmed_digits(dec!(0)), "0");
    }

    #[test]
    fn test_checksums_are_deterministic() {
        let book = book();
        assert_eq!(
            ChecksumMethod::Kraken.compute(&book),
            ChecksumMethod::Kraken.compute(&book)
        );
        assert_eq!(
            ChecksumMethod::Okx.compute(&book),
            ChecksumMethod::Okx.compute(&book)
        );
    }

    #[test]
    fn test_checksum_changes_when_book_changes() {
        let before = ChecksumMethod::Okx.compute(&book());

        let mut changed = book();
        changed.update(&crate::subscription::book::OrderBookEvent::Update(
            OrderBook::new(2, None, vec![Level::new(dec!(6621.45), dec!(0.5))], vec![]),
        ));

        assert_ne!(before, ChecksumMethod::Okx.compute(&changed));
    }

    #[test]
    fn test_okx_checksum_matches_reference_pre_image() {
        // Pre-image: "bid:amount:ask:amount:..." over interleaved levels
        let book = book();
        let pre_image = "6621.55:0.163567:6622.46:1.5:6621.45:0.3:6622.5:2";
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(pre_image.as_bytes());
        assert_eq!(ChecksumMethod::Okx.compute(&book), hasher.finalize());
    }
}
