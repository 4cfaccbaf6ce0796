use chrono::{DateTime, Utc};
use harbor_instrument::{asset::AssetClass, symbol::Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balance of one currency within a sub-account.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct Balance {
    pub total: Decimal,
    pub hold: Decimal,
    pub updated: DateTime<Utc>,
}

impl Balance {
    pub fn new(total: Decimal, hold: Decimal, updated: DateTime<Utc>) -> Self {
        Self {
            total,
            hold,
            updated,
        }
    }

    /// Funds free to trade: `total - hold`.
    pub fn free(&self) -> Decimal {
        self.total - self.hold
    }
}

/// Balances of one venue sub-account for one [`AssetClass`].
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct SubAccount {
    pub id: String,
    pub asset: AssetClass,
    pub balances: BTreeMap<Symbol, Balance>,
}

impl SubAccount {
    pub fn new(id: impl Into<String>, asset: AssetClass) -> Self {
        Self {
            id: id.into(),
            asset,
            balances: BTreeMap::new(),
        }
    }

    /// Upsert the [`Balance`] of one currency, returning the previous value if it changed.
    pub fn upsert(&mut self, currency: Symbol, balance: Balance) -> Option<Balance> {
        match self.balances.insert(currency, balance) {
            Some(previous) if previous != balance => Some(previous),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_free() {
        let balance = Balance::new(dec!(10), dec!(3), Utc::now());
        assert_eq!(balance.free(), dec!(7));
    }

    #[test]
    fn test_sub_account_upsert_reports_change() {
        let mut account = SubAccount::new("main", AssetClass::Spot);
        let first = Balance::new(dec!(1), dec!(0), Utc::now());

        assert_eq!(account.upsert(Symbol::new("btc"), first), None);
        // Unchanged upsert is not reported as a delta
        assert_eq!(account.upsert(Symbol::new("btc"), first), None);

        let second = Balance {
            total: dec!(2),
            ..first
        };
        assert_eq!(account.upsert(Symbol::new("btc"), second), Some(first));
    }
}
