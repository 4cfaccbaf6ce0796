use crate::{
    credentials::{Credentials, CredentialsRequirement, resolve_credentials},
    endpoints::Endpoints,
    error::VenueError,
    features::Features,
    kline::{ExtendedKlineRequest, Interval, KlineError, KlineRequest},
    limits::LimitsStore,
};
use chrono::{DateTime, Utc};
use harbor_instrument::{
    asset::AssetClass,
    exchange::VenueId,
    pair::{Pair, store::PairManager},
};
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::time::Duration;
use tracing::{debug, info};

/// Default Http request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Default interval without inbound frames after which a websocket connection is considered
/// silent and torn down.
pub const DEFAULT_WEBSOCKET_TRAFFIC_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for a correlated response to an authenticated websocket request.
pub const DEFAULT_WEBSOCKET_RESPONSE_TIMEOUT: Duration = Duration::from_secs(7);

/// Default cap on outstanding authenticated websocket responses.
pub const DEFAULT_WEBSOCKET_RESPONSE_MAX_LIMIT: usize = 100;

/// Configuration consumed by [`VenueBase::setup_defaults`].
#[derive(Debug, Clone)]
pub struct VenueConfig {
    pub venue: VenueId,
    pub features: Features,
    pub endpoints: Endpoints,
    pub pairs: PairManager,
    pub credentials: Option<Credentials>,
    pub credentials_requirement: CredentialsRequirement,
    pub http_timeout: Option<Duration>,
    pub websocket_traffic_timeout: Option<Duration>,
    pub websocket_response_timeout: Option<Duration>,
    pub websocket_response_max_limit: Option<usize>,
    pub kline_intervals: Vec<Interval>,
    pub kline_request_limit: u64,
}

/// State and default behaviours shared by every venue adapter.
///
/// Venue adapters hold a [`VenueBase`] as a field, implement the
/// [`Venue`](crate::venue::Venue) trait, and delegate the shared operations here.
#[derive(Debug)]
pub struct VenueBase {
    pub venue: VenueId,
    pub features: Features,
    pub endpoints: Endpoints,
    pairs: RwLock<PairManager>,
    credentials: Option<Credentials>,
    pub credentials_requirement: CredentialsRequirement,
    pub limits: LimitsStore,
    pub http_timeout: Duration,
    pub websocket_traffic_timeout: Duration,
    pub websocket_response_timeout: Duration,
    pub websocket_response_max_limit: usize,
    kline_intervals: Vec<Interval>,
    kline_request_limit: u64,
}

impl VenueBase {
    /// Populate the base from the provided [`VenueConfig`], applying defaults for anything the
    /// config omits and validating credentials and capability flags.
    ///
    /// `overrides_websocket_orders` is reported by the venue adapter: a config that enables
    /// websocket order capabilities the adapter does not implement is refused here, at setup.
    pub fn setup_defaults(
        config: VenueConfig,
        overrides_websocket_orders: bool,
    ) -> Result<Self, VenueError> {
        let VenueConfig {
            venue,
            features,
            endpoints,
            pairs,
            credentials,
            credentials_requirement,
            http_timeout,
            websocket_traffic_timeout,
            websocket_response_timeout,
            websocket_response_max_limit,
            kline_intervals,
            kline_request_limit,
        } = config;

        validate_capabilities(venue, &features, overrides_websocket_orders)?;

        let credentials = match credentials {
            Some(mut credentials) if !credentials.is_empty() => {
                credentials.validate(&credentials_requirement)?;
                Some(credentials)
            }
            _ => None,
        };

        info!(%venue, "venue defaults configured");
        Ok(Self {
            venue,
            features,
            endpoints,
            pairs: RwLock::new(pairs),
            credentials,
            credentials_requirement,
            limits: LimitsStore::new(),
            http_timeout: http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
            websocket_traffic_timeout: websocket_traffic_timeout
                .unwrap_or(DEFAULT_WEBSOCKET_TRAFFIC_TIMEOUT),
            websocket_response_timeout: websocket_response_timeout
                .unwrap_or(DEFAULT_WEBSOCKET_RESPONSE_TIMEOUT),
            websocket_response_max_limit: websocket_response_max_limit
                .unwrap_or(DEFAULT_WEBSOCKET_RESPONSE_MAX_LIMIT),
            kline_intervals,
            kline_request_limit,
        })
    }

    /// Resolve the [`Credentials`] for one operation: call-scoped beats configured default.
    pub fn credentials<'a>(
        &'a self,
        call_scoped: Option<&'a Credentials>,
    ) -> Result<&'a Credentials, VenueError> {
        resolve_credentials(call_scoped, self.credentials.as_ref())
    }

    /// Render the provided [`Pair`] with the request format of its [`AssetClass`].
    pub fn format_symbol(&self, pair: &Pair, asset: AssetClass) -> Result<SmolStr, VenueError> {
        Ok(self.pairs.read().format_symbol(pair, asset)?)
    }

    /// Reverse-lookup a venue symbol string against the available pairs of an [`AssetClass`].
    pub fn match_symbol_with_available_pairs(
        &self,
        symbol: &str,
        asset: AssetClass,
        force_upper: bool,
    ) -> Result<Pair, VenueError> {
        Ok(self.pairs.read().match_symbol(symbol, asset, force_upper)?)
    }

    /// Replace the enabled or available pairs of an [`AssetClass`].
    pub fn set_pairs(
        &self,
        pairs: &[Pair],
        asset: AssetClass,
        enabled: bool,
    ) -> Result<(), VenueError> {
        Ok(self.pairs.write().set_pairs(pairs, asset, enabled)?)
    }

    /// Update the enabled or available pairs of an [`AssetClass`].
    pub fn update_pairs(
        &self,
        pairs: &[Pair],
        asset: AssetClass,
        enabled: bool,
    ) -> Result<bool, VenueError> {
        Ok(self.pairs.write().update_pairs(pairs, asset, enabled)?)
    }

    /// If no pair is enabled across all asset classes, enable exactly one from the available set.
    pub fn ensure_one_pair_enabled(&self) -> Result<Option<(AssetClass, Pair)>, VenueError> {
        let enabled = self.pairs.write().ensure_one_pair_enabled()?;
        if let Some((asset, pair)) = &enabled {
            info!(venue = %self.venue, %asset, %pair, "no pairs were enabled - enabled one");
        }
        Ok(enabled)
    }

    /// Diff a freshly fetched venue catalog against the stored available set and persist it.
    ///
    /// A no-op when the catalog is unchanged, unless `force` is set.
    pub fn update_tradable_pairs(
        &self,
        catalog: &[Pair],
        asset: AssetClass,
        force: bool,
    ) -> Result<bool, VenueError> {
        let unchanged = {
            let pairs = self.pairs.read();
            pairs.pairs(asset, false)? == catalog
        };
        if unchanged && !force {
            debug!(venue = %self.venue, %asset, "tradable pair catalog unchanged");
            return Ok(false);
        }

        let changed = self.pairs.write().update_pairs(catalog, asset, false)?;
        if changed {
            info!(
                venue = %self.venue,
                %asset,
                pairs = catalog.len(),
                "tradable pair catalog updated"
            );
        }
        Ok(changed)
    }

    /// Snapshot the enabled or available pairs of an [`AssetClass`].
    pub fn pairs(&self, asset: AssetClass, enabled_only: bool) -> Result<Vec<Pair>, VenueError> {
        Ok(self.pairs.read().pairs(asset, enabled_only)?.to_vec())
    }

    /// Asset classes with a configured pair store.
    pub fn assets(&self) -> Vec<AssetClass> {
        self.pairs.read().assets().collect()
    }

    /// Construct a validated single-call [`KlineRequest`].
    pub fn get_kline_request(
        &self,
        pair: &Pair,
        asset: AssetClass,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<KlineRequest, VenueError> {
        if !self.features.supports.kline {
            return Err(VenueError::Kline(KlineError::UnsupportedAsset(asset)));
        }
        let symbol = self.format_symbol(pair, asset)?;
        Ok(KlineRequest::new(
            pair.clone(),
            asset,
            symbol,
            interval,
            start,
            end,
            &self.kline_intervals,
            self.kline_request_limit,
        )?)
    }

    /// Construct a validated [`ExtendedKlineRequest`] whose range holder batches the request
    /// within the venue's per-call limit.
    pub fn get_kline_extended_request(
        &self,
        pair: &Pair,
        asset: AssetClass,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ExtendedKlineRequest, VenueError> {
        if !self.features.supports.kline {
            return Err(VenueError::Kline(KlineError::UnsupportedAsset(asset)));
        }
        let symbol = self.format_symbol(pair, asset)?;
        Ok(ExtendedKlineRequest::new(
            pair.clone(),
            asset,
            symbol,
            interval,
            start,
            end,
            &self.kline_intervals,
            self.kline_request_limit,
        )?)
    }
}

/// Refuse feature flags that enable capabilities the venue adapter does not implement.
fn validate_capabilities(
    venue: VenueId,
    features: &Features,
    overrides_websocket_orders: bool,
) -> Result<(), VenueError> {
    let websocket_orders_enabled = features.active(|set| set.websocket_submit_order)
        || features.active(|set| set.websocket_modify_order)
        || features.active(|set| set.websocket_cancel_order);

    if websocket_orders_enabled && !overrides_websocket_orders {
        return Err(VenueError::CapabilityUnimplemented {
            venue,
            capability: "websocket order submission",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSet;
    use harbor_instrument::pair::{PairFormat, store::PairStore};

    fn pair_manager() -> PairManager {
        let mut store = PairStore::new(PairFormat::concatenated(), PairFormat::default());
        store.available = vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")];
        store.enabled = vec![Pair::new("btc", "usdt")];
        PairManager::new([(AssetClass::Spot, store)])
    }

    fn config() -> VenueConfig {
        VenueConfig {
            venue: VenueId::BinanceSpot,
            features: Features::default(),
            endpoints: Endpoints::default(),
            pairs: pair_manager(),
            credentials: None,
            credentials_requirement: CredentialsRequirement::default(),
            http_timeout: None,
            websocket_traffic_timeout: None,
            websocket_response_timeout: None,
            websocket_response_max_limit: None,
            kline_intervals: vec![Interval::OneMinute, Interval::OneHour],
            kline_request_limit: 1000,
        }
    }

    #[test]
    fn test_setup_defaults_applies_timeouts() {
        let base = VenueBase::setup_defaults(config(), false).unwrap();
        assert_eq!(base.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert_eq!(
            base.websocket_traffic_timeout,
            DEFAULT_WEBSOCKET_TRAFFIC_TIMEOUT
        );
        assert_eq!(
            base.websocket_response_max_limit,
            DEFAULT_WEBSOCKET_RESPONSE_MAX_LIMIT
        );
    }

    #[test]
    fn test_setup_refuses_unimplemented_websocket_order_capability() {
        let mut config = config();
        config.features = Features {
            supports: FeatureSet {
                websocket_submit_order: true,
                ..Default::default()
            },
            enabled: FeatureSet {
                websocket_submit_order: true,
                ..Default::default()
            },
        };

        assert!(matches!(
            VenueBase::setup_defaults(config.clone(), false),
            Err(VenueError::CapabilityUnimplemented { .. })
        ));

        // The same config is accepted when the adapter implements the capability
        assert!(VenueBase::setup_defaults(config, true).is_ok());
    }

    #[test]
    fn test_update_tradable_pairs_diffs_catalog() {
        let base = VenueBase::setup_defaults(config(), false).unwrap();

        // Unchanged catalog is a no-op
        let unchanged = vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")];
        assert!(!base
            .update_tradable_pairs(&unchanged, AssetClass::Spot, false)
            .unwrap());

        // New listing persists
        let next = vec![
            Pair::new("btc", "usdt"),
            Pair::new("ltc", "usdt"),
            Pair::new("eth", "usdt"),
        ];
        assert!(base
            .update_tradable_pairs(&next, AssetClass::Spot, false)
            .unwrap());
        assert_eq!(base.pairs(AssetClass::Spot, false).unwrap().len(), 3);
    }

    #[test]
    fn test_kline_request_uses_request_format() {
        let mut config = config();
        config.features.supports.kline = true;
        let base = VenueBase::setup_defaults(config, false).unwrap();

        let start = chrono::Utc::now() - chrono::TimeDelta::hours(5);
        let end = start + chrono::TimeDelta::hours(4);
        let request = base
            .get_kline_request(
                &Pair::new("btc", "usdt"),
                AssetClass::Spot,
                Interval::OneHour,
                start,
                end,
            )
            .unwrap();

        assert_eq!(request.symbol, "btcusdt");
        assert_eq!(request.count, 4);
    }
}
