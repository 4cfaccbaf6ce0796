use serde::{Deserialize, Deserializer, Serialize};
use smol_str::{SmolStr, StrExt};
use std::fmt::{Display, Formatter};

/// Harbor new type representing a currency code `String` identifier.
///
/// Normalised to lowercase on construction, so `Symbol::new("BTC") == Symbol::new("btc")`.
///
/// eg/ "btc", "eth", "usdt", etc
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct Symbol(SmolStr);

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Symbol::new)
    }
}

impl<S> From<S> for Symbol
where
    S: Into<SmolStr>,
{
    fn from(input: S) -> Self {
        Symbol::new(input)
    }
}

impl Symbol {
    /// Construct a new [`Symbol`] new type using the provided `Into<SmolStr>` value.
    pub fn new<S>(input: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(input.into().to_lowercase_smolstr())
    }

    /// Determine if this [`Symbol`] holds no characters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render this [`Symbol`] in uppercase.
    pub fn to_uppercase(&self) -> SmolStr {
        self.0.to_uppercase_smolstr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalises_case() {
        assert_eq!(Symbol::new("BTC"), Symbol::new("btc"));
        assert_eq!(Symbol::new("UsDt").as_ref(), "usdt");
    }

    #[test]
    fn test_symbol_uppercase_render() {
        assert_eq!(Symbol::new("btc").to_uppercase(), "BTC");
    }
}
