use crate::error::FundingError;
use harbor_instrument::{asset::AssetClass, exchange::VenueId, pair::Pair, symbol::Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of one funding pool.
///
/// Per-pair pools are scoped to their [`Pair`]; exchange-level pools share one reservoir per
/// `(venue, asset, currency)` across every pair trading that currency.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct PoolId {
    pub venue: VenueId,
    pub asset: AssetClass,
    pub currency: Symbol,
    pub scope: Option<Pair>,
}

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(pair) => write!(f, "{}_{}_{}_{}", self.venue, self.asset, pair, self.currency),
            None => write!(f, "{}_{}_{}", self.venue, self.asset, self.currency),
        }
    }
}

/// One reservoir of funds in a currency.
///
/// Reservations move funds from `available` to `reserved` at order submission, and are consumed
/// at fill or released at cancel. `available` and `reserved` never go negative.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct FundingPool {
    pub initial: f64,
    pub available: f64,
    pub reserved: f64,
}

impl FundingPool {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            available: initial,
            reserved: 0.0,
        }
    }

    /// Total funds: available plus reserved.
    pub fn total(&self) -> f64 {
        self.available + self.reserved
    }
}

/// Whether the backtest runs with isolated per-pair funds or shared exchange-level pools.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum FundingMode {
    PerPair,
    ExchangeLevel,
}

/// An active hold on pool funds for one in-flight order.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub pool: PoolId,
    pub amount: f64,
}

/// Owns every [`FundingPool`] of a backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct FundManager {
    mode: FundingMode,
    pools: BTreeMap<PoolId, FundingPool>,
}

impl FundManager {
    pub fn new(mode: FundingMode) -> Self {
        Self {
            mode,
            pools: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> FundingMode {
        self.mode
    }

    /// Register a pool with its initial funds. Registering the same pool twice accumulates.
    pub fn register(&mut self, id: PoolId, initial: f64) {
        let pool = self.pools.entry(id).or_default();
        pool.initial += initial;
        pool.available += initial;
    }

    /// Find the pool funding the provided currency for a market, respecting the funding mode.
    pub fn pool_id(
        &self,
        venue: VenueId,
        asset: AssetClass,
        pair: &Pair,
        currency: &Symbol,
    ) -> PoolId {
        PoolId {
            venue,
            asset,
            currency: currency.clone(),
            scope: match self.mode {
                FundingMode::PerPair => Some(pair.clone()),
                FundingMode::ExchangeLevel => None,
            },
        }
    }

    /// Funds free to draw from the provided pool.
    pub fn available(&self, id: &PoolId) -> f64 {
        self.pools.get(id).map(|pool| pool.available).unwrap_or(0.0)
    }

    /// Snapshot of the provided pool.
    pub fn pool(&self, id: &PoolId) -> Option<&FundingPool> {
        self.pools.get(id)
    }

    /// Reserve funds for an in-flight order, holding them until
    /// [`consume`](Self::consume) or [`release`](Self::release).
    pub fn reserve(&mut self, id: &PoolId, amount: f64) -> Result<Reservation, FundingError> {
        let pool = self
            .pools
            .get_mut(id)
            .ok_or_else(|| FundingError::PoolNotFound(id.to_string()))?;

        if pool.available < amount {
            return Err(FundingError::InsufficientFunds {
                pool: id.to_string(),
                requested: amount,
                available: pool.available,
            });
        }

        pool.available -= amount;
        pool.reserved += amount;
        Ok(Reservation {
            pool: id.clone(),
            amount,
        })
    }

    /// Consume a reservation at fill time, spending `spent` of the held funds and returning the
    /// remainder to the pool.
    pub fn consume(&mut self, reservation: Reservation, spent: f64) -> Result<(), FundingError> {
        let pool = self
            .pools
            .get_mut(&reservation.pool)
            .ok_or_else(|| FundingError::PoolNotFound(reservation.pool.to_string()))?;

        pool.reserved = (pool.reserved - reservation.amount).max(0.0);
        let refund = (reservation.amount - spent).max(0.0);
        pool.available += refund;
        Ok(())
    }

    /// Release a reservation in full, eg/ after a cancel or veto.
    pub fn release(&mut self, reservation: Reservation) -> Result<(), FundingError> {
        self.consume(reservation, 0.0)
    }

    /// Credit funds into a pool, eg/ sale proceeds.
    pub fn credit(&mut self, id: &PoolId, amount: f64) -> Result<(), FundingError> {
        let pool = self
            .pools
            .get_mut(id)
            .ok_or_else(|| FundingError::PoolNotFound(id.to_string()))?;
        pool.available += amount;
        Ok(())
    }

    /// Total funds across every pool. Never negative.
    pub fn total_funds(&self) -> f64 {
        self.pools.values().map(FundingPool::total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdt_pool(manager: &FundManager) -> PoolId {
        manager.pool_id(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            &Pair::new("btc", "usdt"),
            &Symbol::new("usdt"),
        )
    }

    #[test]
    fn test_reserve_consume_lifecycle() {
        let mut manager = FundManager::new(FundingMode::PerPair);
        let id = usdt_pool(&manager);
        manager.register(id.clone(), 1000.0);

        let reservation = manager.reserve(&id, 400.0).unwrap();
        assert_eq!(manager.available(&id), 600.0);
        assert_eq!(manager.pool(&id).unwrap().reserved, 400.0);

        // Fill spends 380 of the 400 held: remainder returns to available
        manager.consume(reservation, 380.0).unwrap();
        assert_eq!(manager.available(&id), 620.0);
        assert_eq!(manager.pool(&id).unwrap().reserved, 0.0);
        assert!(manager.total_funds() >= 0.0);
    }

    #[test]
    fn test_release_returns_everything() {
        let mut manager = FundManager::new(FundingMode::PerPair);
        let id = usdt_pool(&manager);
        manager.register(id.clone(), 1000.0);

        let reservation = manager.reserve(&id, 400.0).unwrap();
        manager.release(reservation).unwrap();
        assert_eq!(manager.available(&id), 1000.0);
    }

    #[test]
    fn test_insufficient_funds() {
        let mut manager = FundManager::new(FundingMode::PerPair);
        let id = usdt_pool(&manager);
        manager.register(id.clone(), 100.0);

        assert!(matches!(
            manager.reserve(&id, 400.0),
            Err(FundingError::InsufficientFunds { .. })
        ));
        // Failed reservation leaves the pool untouched
        assert_eq!(manager.available(&id), 100.0);
    }

    #[test]
    fn test_exchange_level_pools_are_shared_across_pairs() {
        let mut manager = FundManager::new(FundingMode::ExchangeLevel);
        let btc_pool = manager.pool_id(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            &Pair::new("btc", "usdt"),
            &Symbol::new("usdt"),
        );
        let eth_pool = manager.pool_id(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            &Pair::new("eth", "usdt"),
            &Symbol::new("usdt"),
        );

        // Both pairs resolve to the same shared pool
        assert_eq!(btc_pool, eth_pool);

        manager.register(btc_pool.clone(), 1000.0);
        manager.reserve(&eth_pool, 700.0).unwrap();
        assert_eq!(manager.available(&btc_pool), 300.0);
    }

    #[test]
    fn test_per_pair_pools_are_isolated() {
        let manager = FundManager::new(FundingMode::PerPair);
        let btc_pool = manager.pool_id(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            &Pair::new("btc", "usdt"),
            &Symbol::new("usdt"),
        );
        let eth_pool = manager.pool_id(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            &Pair::new("eth", "usdt"),
            &Symbol::new("usdt"),
        );

        assert_ne!(btc_pool, eth_pool);
    }
}
