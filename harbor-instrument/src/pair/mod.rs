use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// Per-venue [`PairStore`](store::PairStore) and [`PairManager`](store::PairManager), upholding
/// the `enabled ⊆ available` invariant.
pub mod store;

/// Harbor representation of an ordered `(base, quote)` currency pair.
///
/// Equality, ordering and hashing are defined over the normalised [`Symbol`]s only, regardless
/// of any venue display format. Pairs are immutable once constructed.
///
/// eg/ Pair { base: "btc", quote: "usdt" }
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Pair {
    pub base: Symbol,
    pub quote: Symbol,
}

impl Pair {
    /// Construct a new [`Pair`], rejecting an empty base or quote with [`PairError::EmptyPair`].
    pub fn try_new<S>(base: S, quote: S) -> Result<Self, PairError>
    where
        S: Into<Symbol>,
    {
        let base = base.into();
        let quote = quote.into();

        if base.is_empty() || quote.is_empty() {
            return Err(PairError::EmptyPair);
        }

        Ok(Self { base, quote })
    }

    /// Construct a new [`Pair`] from values known to be non-empty (eg/ literals in tests).
    pub fn new<S>(base: S, quote: S) -> Self
    where
        S: Into<Symbol>,
    {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Determine if either side of this [`Pair`] is empty.
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() || self.quote.is_empty()
    }

    /// Render this [`Pair`] using the provided venue display [`PairFormat`].
    pub fn format(&self, format: &PairFormat) -> SmolStr {
        let rendered = if format.uppercase {
            format!(
                "{}{}{}",
                self.base.to_uppercase(),
                format.delimiter,
                self.quote.to_uppercase()
            )
        } else {
            format!("{}{}{}", self.base, format.delimiter, self.quote)
        };
        SmolStr::from(rendered)
    }
}

impl Display for Pair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl<S> From<(S, S)> for Pair
where
    S: Into<Symbol>,
{
    fn from((base, quote): (S, S)) -> Self {
        Self::new(base, quote)
    }
}

/// Venue display format for a [`Pair`]: the delimiter between base and quote, and whether the
/// venue expects uppercase codes.
///
/// A delimiter-bearing [`PairFormat`] is invertible: `parse(format(pair)) == pair`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct PairFormat {
    pub delimiter: SmolStr,
    pub uppercase: bool,
}

impl PairFormat {
    /// Construct a new [`PairFormat`] using the provided delimiter and case.
    pub fn new(delimiter: &str, uppercase: bool) -> Self {
        Self {
            delimiter: SmolStr::from(delimiter),
            uppercase,
        }
    }

    /// Lowercase concatenated format, eg/ "btcusdt".
    pub fn concatenated() -> Self {
        Self::new("", false)
    }

    /// Parse a venue string rendered with this [`PairFormat`] back into a [`Pair`].
    ///
    /// Delimiter-less formats cannot be split without a candidate set, so parsing them requires
    /// the reverse lookup offered by
    /// [`PairManager::match_symbol`](store::PairManager::match_symbol).
    pub fn parse(&self, input: &str) -> Result<Pair, PairError> {
        if self.delimiter.is_empty() {
            return Err(PairError::DelimiterRequired);
        }

        let (base, quote) = input
            .split_once(self.delimiter.as_str())
            .ok_or_else(|| PairError::ParseFailure(input.to_string()))?;

        Pair::try_new(base, quote)
    }
}

impl Default for PairFormat {
    fn default() -> Self {
        Self::new("-", true)
    }
}

/// Errors generated when constructing, parsing or mutating [`Pair`] collections.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PairError {
    #[error("pair has an empty base or quote symbol")]
    EmptyPair,

    #[error("pair collection input is empty")]
    CurrenciesEmpty,

    #[error("pair collection input contains duplicates")]
    PairDuplication,

    #[error("pair not found: {0}")]
    PairNotFound(String),

    #[error("asset class not supported: {0}")]
    AssetNotSupported(crate::asset::AssetClass),

    #[error("cannot split a pair string without a delimiter")]
    DelimiterRequired,

    #[error("failed to parse pair from: {0}")]
    ParseFailure(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_equality_ignores_case_and_format() {
        assert_eq!(Pair::new("BTC", "USDT"), Pair::new("btc", "usdt"));
    }

    #[test]
    fn test_pair_try_new_rejects_empty() {
        assert_eq!(Pair::try_new("", "usdt"), Err(PairError::EmptyPair));
        assert_eq!(Pair::try_new("btc", ""), Err(PairError::EmptyPair));
    }

    #[test]
    fn test_pair_format_render() {
        struct TestCase {
            format: PairFormat,
            expected: &'static str,
        }

        let pair = Pair::new("btc", "usdt");

        let tests = vec![
            TestCase {
                // TC0: uppercase dash delimited
                format: PairFormat::new("-", true),
                expected: "BTC-USDT",
            },
            TestCase {
                // TC1: lowercase concatenated
                format: PairFormat::concatenated(),
                expected: "btcusdt",
            },
            TestCase {
                // TC2: uppercase slash delimited
                format: PairFormat::new("/", true),
                expected: "BTC/USDT",
            },
            TestCase {
                // TC3: lowercase underscore delimited
                format: PairFormat::new("_", false),
                expected: "btc_usdt",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(pair.format(&test.format), test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_pair_format_round_trip() {
        let pair = Pair::new("eth", "usd");

        for format in [
            PairFormat::new("-", true),
            PairFormat::new("/", false),
            PairFormat::new("_", true),
        ] {
            let rendered = pair.format(&format);
            assert_eq!(format.parse(&rendered).unwrap(), pair);
        }
    }

    #[test]
    fn test_pair_format_parse_requires_delimiter() {
        assert_eq!(
            PairFormat::concatenated().parse("btcusdt"),
            Err(PairError::DelimiterRequired)
        );
    }
}
