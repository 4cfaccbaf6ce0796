use serde::{Deserialize, Serialize};

/// Unique identifier for a supported venue server.
///
/// Venues that serve distinct contract families from distinct servers (eg/ Binance spot vs
/// USD-margined futures) are identified separately, since connection, subscription and
/// sequencing rules differ between the servers.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VenueId {
    BinanceSpot,
    BinanceFuturesUsd,
    Kraken,
    Okx,
}

impl VenueId {
    /// Venue identifier `&str`, as used in configs, logs and registry keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueId::BinanceSpot => "binance_spot",
            VenueId::BinanceFuturesUsd => "binance_futures_usd",
            VenueId::Kraken => "kraken",
            VenueId::Okx => "okx",
        }
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_id_serde_round_trip() {
        for venue in [
            VenueId::BinanceSpot,
            VenueId::BinanceFuturesUsd,
            VenueId::Kraken,
            VenueId::Okx,
        ] {
            let json = serde_json::to_string(&venue).unwrap();
            assert_eq!(serde_json::from_str::<VenueId>(&json).unwrap(), venue);
        }
    }
}
