use crate::{
    asset::AssetClass,
    pair::{Pair, PairError, PairFormat},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Set of [`Pair`]s a venue lists for one [`AssetClass`], split into the venue's full catalog
/// (`available`) and the subset this process trades (`enabled`).
///
/// Invariant: `enabled ⊆ available`, and every pair in either collection is non-empty and unique.
/// When `asset_enabled` is false no pair in the class is tradable, regardless of `enabled`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct PairStore {
    pub asset_enabled: bool,
    pub available: Vec<Pair>,
    pub enabled: Vec<Pair>,
    pub request_format: PairFormat,
    pub config_format: PairFormat,
}

impl PairStore {
    /// Construct an empty [`PairStore`] using the provided venue display formats.
    pub fn new(request_format: PairFormat, config_format: PairFormat) -> Self {
        Self {
            asset_enabled: true,
            available: Vec::new(),
            enabled: Vec::new(),
            request_format,
            config_format,
        }
    }

    /// Determine if the provided [`Pair`] is present in the venue catalog.
    pub fn is_available(&self, pair: &Pair) -> bool {
        self.available.contains(pair)
    }

    /// Determine if the provided [`Pair`] is enabled for trading.
    pub fn is_enabled(&self, pair: &Pair) -> bool {
        self.asset_enabled && self.enabled.contains(pair)
    }
}

/// Per-venue collection of [`PairStore`]s keyed by [`AssetClass`].
///
/// All mutating operations validate their input (no empty pairs, no duplicates) and leave the
/// store untouched on error.
#[derive(Debug, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct PairManager {
    stores: BTreeMap<AssetClass, PairStore>,
}

impl PairManager {
    /// Construct a new [`PairManager`] from `(AssetClass, PairStore)` seeds.
    pub fn new<Iter>(stores: Iter) -> Self
    where
        Iter: IntoIterator<Item = (AssetClass, PairStore)>,
    {
        Self {
            stores: stores.into_iter().collect(),
        }
    }

    /// All [`AssetClass`]es this venue supports.
    pub fn assets(&self) -> impl Iterator<Item = AssetClass> + '_ {
        self.stores.keys().copied()
    }

    /// Find the [`PairStore`] associated with the provided [`AssetClass`].
    pub fn store(&self, asset: AssetClass) -> Result<&PairStore, PairError> {
        self.stores
            .get(&asset)
            .ok_or(PairError::AssetNotSupported(asset))
    }

    fn store_mut(&mut self, asset: AssetClass) -> Result<&mut PairStore, PairError> {
        self.stores
            .get_mut(&asset)
            .ok_or(PairError::AssetNotSupported(asset))
    }

    /// Return the available or enabled [`Pair`]s for the provided [`AssetClass`].
    pub fn pairs(&self, asset: AssetClass, enabled_only: bool) -> Result<&[Pair], PairError> {
        let store = self.store(asset)?;
        if enabled_only {
            Ok(&store.enabled)
        } else {
            Ok(&store.available)
        }
    }

    /// Replace the enabled or available [`Pair`]s of an [`AssetClass`] with the provided set.
    ///
    /// Rejects empty input ([`PairError::CurrenciesEmpty`]), empty pairs
    /// ([`PairError::EmptyPair`]) and duplicate entries ([`PairError::PairDuplication`]).
    /// Enabling pairs keeps `enabled ⊆ available` by extending `available` with any new entries.
    pub fn set_pairs(
        &mut self,
        pairs: &[Pair],
        asset: AssetClass,
        enabled: bool,
    ) -> Result<(), PairError> {
        if pairs.is_empty() {
            return Err(PairError::CurrenciesEmpty);
        }
        validate_unique_non_empty(pairs)?;

        let store = self.store_mut(asset)?;
        if enabled {
            for pair in pairs {
                if !store.available.contains(pair) {
                    store.available.push(pair.clone());
                }
            }
            store.enabled = pairs.to_vec();
        } else {
            store.available = pairs.to_vec();
            store.enabled.retain(|pair| store.available.contains(pair));
        }

        Ok(())
    }

    /// Update the enabled or available [`Pair`]s of an [`AssetClass`].
    ///
    /// Updating `enabled` intersects the provided set with `available`, so a pair the venue no
    /// longer lists is silently dropped. An empty enabled update clears the enabled set.
    /// Updating `available` refuses to purge the catalog to empty
    /// ([`PairError::CurrenciesEmpty`]) and disables any pair that is no longer listed.
    ///
    /// Returns whether the store changed.
    pub fn update_pairs(
        &mut self,
        pairs: &[Pair],
        asset: AssetClass,
        enabled: bool,
    ) -> Result<bool, PairError> {
        validate_unique_non_empty(pairs)?;

        let store = self.store_mut(asset)?;
        if enabled {
            let next = pairs
                .iter()
                .filter(|pair| store.available.contains(pair))
                .cloned()
                .collect::<Vec<_>>();

            if next == store.enabled {
                return Ok(false);
            }
            store.enabled = next;
            Ok(true)
        } else {
            if pairs.is_empty() {
                return Err(PairError::CurrenciesEmpty);
            }

            if *pairs == store.available {
                return Ok(false);
            }
            store.available = pairs.to_vec();
            store.enabled.retain(|pair| store.available.contains(pair));
            Ok(true)
        }
    }

    /// If no [`Pair`] is enabled across all asset classes, enable exactly one from the available
    /// set (first by sort order) and return it. A no-op on an already-conforming store.
    pub fn ensure_one_pair_enabled(&mut self) -> Result<Option<(AssetClass, Pair)>, PairError> {
        let any_enabled = self
            .stores
            .values()
            .any(|store| store.asset_enabled && !store.enabled.is_empty());
        if any_enabled {
            return Ok(None);
        }

        let candidate = self
            .stores
            .iter()
            .filter(|(_, store)| store.asset_enabled)
            .flat_map(|(asset, store)| {
                store.available.iter().sorted().next().map(|pair| (*asset, pair.clone()))
            })
            .next()
            .ok_or(PairError::CurrenciesEmpty)?;

        let (asset, pair) = &candidate;
        self.store_mut(*asset)?.enabled.push(pair.clone());
        Ok(Some(candidate))
    }

    /// Reverse-lookup a venue symbol string against the available pairs of an [`AssetClass`],
    /// trying the request format first, then the config format.
    ///
    /// `force_upper` additionally matches the uppercase concatenated rendering, for venues that
    /// upcase markets in stream payloads (eg/ "BTCUSDT").
    pub fn match_symbol(
        &self,
        symbol: &str,
        asset: AssetClass,
        force_upper: bool,
    ) -> Result<Pair, PairError> {
        let store = self.store(asset)?;

        let matches = |pair: &Pair, format: &PairFormat| {
            let rendered = pair.format(format);
            if force_upper {
                rendered.eq_ignore_ascii_case(symbol)
            } else {
                rendered == symbol
            }
        };

        store
            .available
            .iter()
            .find(|pair| {
                matches(pair, &store.request_format) || matches(pair, &store.config_format)
            })
            .cloned()
            .ok_or_else(|| PairError::PairNotFound(symbol.to_string()))
    }

    /// Render the provided [`Pair`] using the request format of the [`AssetClass`].
    pub fn format_symbol(&self, pair: &Pair, asset: AssetClass) -> Result<SmolStr, PairError> {
        let store = self.store(asset)?;
        Ok(pair.format(&store.request_format))
    }
}

fn validate_unique_non_empty(pairs: &[Pair]) -> Result<(), PairError> {
    if pairs.iter().any(Pair::is_empty) {
        return Err(PairError::EmptyPair);
    }
    if !pairs.iter().all_unique() {
        return Err(PairError::PairDuplication);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(available: Vec<Pair>, enabled: Vec<Pair>) -> PairManager {
        let mut store = PairStore::new(PairFormat::concatenated(), PairFormat::default());
        store.available = available;
        store.enabled = enabled;
        PairManager::new([(AssetClass::Spot, store)])
    }

    #[test]
    fn test_update_pairs_rejects_duplicates() {
        let mut manager = manager_with(
            vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")],
            vec![Pair::new("btc", "usdt")],
        );

        let duplicated = vec![Pair::new("ltc", "usdt"), Pair::new("ltc", "usdt")];
        assert_eq!(
            manager.update_pairs(&duplicated, AssetClass::Spot, true),
            Err(PairError::PairDuplication)
        );

        // store unchanged on error
        assert_eq!(
            manager.pairs(AssetClass::Spot, true).unwrap(),
            &[Pair::new("btc", "usdt")]
        );
    }

    #[test]
    fn test_update_pairs_empty_enabled_clears_but_keeps_available() {
        let mut manager = manager_with(
            vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")],
            vec![Pair::new("btc", "usdt")],
        );

        assert_eq!(manager.update_pairs(&[], AssetClass::Spot, true), Ok(true));
        assert!(manager.pairs(AssetClass::Spot, true).unwrap().is_empty());
        assert_eq!(manager.pairs(AssetClass::Spot, false).unwrap().len(), 2);
    }

    #[test]
    fn test_update_pairs_refuses_purging_available() {
        let mut manager = manager_with(
            vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")],
            vec![Pair::new("btc", "usdt")],
        );

        assert_eq!(
            manager.update_pairs(&[], AssetClass::Spot, false),
            Err(PairError::CurrenciesEmpty)
        );

        // store unchanged on error
        assert_eq!(manager.pairs(AssetClass::Spot, false).unwrap().len(), 2);
        assert_eq!(manager.pairs(AssetClass::Spot, true).unwrap().len(), 1);
    }

    #[test]
    fn test_update_pairs_enabled_intersects_with_available() {
        let mut manager = manager_with(
            vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")],
            vec![],
        );

        let requested = vec![Pair::new("ltc", "usdt"), Pair::new("doge", "usdt")];
        assert_eq!(
            manager.update_pairs(&requested, AssetClass::Spot, true),
            Ok(true)
        );
        assert_eq!(
            manager.pairs(AssetClass::Spot, true).unwrap(),
            &[Pair::new("ltc", "usdt")]
        );
    }

    #[test]
    fn test_update_available_disables_removed_pairs() {
        let mut manager = manager_with(
            vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")],
            vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")],
        );

        let next_available = vec![Pair::new("ltc", "usdt")];
        assert_eq!(
            manager.update_pairs(&next_available, AssetClass::Spot, false),
            Ok(true)
        );
        assert_eq!(
            manager.pairs(AssetClass::Spot, true).unwrap(),
            &[Pair::new("ltc", "usdt")]
        );
    }

    #[test]
    fn test_set_pairs_rejects_empty_input() {
        let mut manager = manager_with(vec![Pair::new("btc", "usdt")], vec![]);
        assert_eq!(
            manager.set_pairs(&[], AssetClass::Spot, true),
            Err(PairError::CurrenciesEmpty)
        );
    }

    #[test]
    fn test_ensure_one_pair_enabled() {
        let mut manager = manager_with(
            vec![Pair::new("ltc", "usdt"), Pair::new("btc", "usdt")],
            vec![],
        );

        // Enables exactly one pair, first by sort order
        let enabled = manager.ensure_one_pair_enabled().unwrap();
        assert_eq!(enabled, Some((AssetClass::Spot, Pair::new("btc", "usdt"))));
        assert_eq!(manager.pairs(AssetClass::Spot, true).unwrap().len(), 1);

        // Idempotent on an already-conforming store
        assert_eq!(manager.ensure_one_pair_enabled().unwrap(), None);
        assert_eq!(manager.pairs(AssetClass::Spot, true).unwrap().len(), 1);
    }

    #[test]
    fn test_match_symbol() {
        let manager = manager_with(
            vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")],
            vec![],
        );

        assert_eq!(
            manager.match_symbol("btcusdt", AssetClass::Spot, false).unwrap(),
            Pair::new("btc", "usdt")
        );
        assert_eq!(
            manager.match_symbol("BTCUSDT", AssetClass::Spot, true).unwrap(),
            Pair::new("btc", "usdt")
        );
        assert_eq!(
            manager.match_symbol("BTC-USDT", AssetClass::Spot, false).unwrap(),
            Pair::new("btc", "usdt")
        );
        assert_eq!(
            manager.match_symbol("xrpusdt", AssetClass::Spot, false),
            Err(PairError::PairNotFound("xrpusdt".to_string()))
        );
    }

    #[test]
    fn test_pair_store_serde_round_trip() {
        let manager = manager_with(
            vec![Pair::new("btc", "usdt"), Pair::new("ltc", "usdt")],
            vec![Pair::new("btc", "usdt")],
        );

        let json = serde_json::to_string(&manager).unwrap();
        assert_eq!(serde_json::from_str::<PairManager>(&json).unwrap(), manager);
    }
}
