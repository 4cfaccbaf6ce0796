use fnv::FnvHashMap;
use harbor_instrument::{asset::AssetClass, pair::Pair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per market order execution limits, enforced locally before any order leaves the process.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ExecutionLimits {
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub price_step: Option<Decimal>,
    pub amount_step: Option<Decimal>,
    pub min_notional: Option<Decimal>,
}

impl ExecutionLimits {
    /// Validate an order's price and amount against these limits.
    pub fn validate_order(&self, price: Decimal, amount: Decimal) -> Result<(), LimitError> {
        if let Some(min_price) = self.min_price {
            if price < min_price {
                return Err(LimitError::PriceBelowMin { price, min_price });
            }
        }
        if let Some(max_price) = self.max_price {
            if price > max_price {
                return Err(LimitError::PriceAboveMax { price, max_price });
            }
        }
        if let Some(min_amount) = self.min_amount {
            if amount < min_amount {
                return Err(LimitError::AmountBelowMin { amount, min_amount });
            }
        }
        if let Some(max_amount) = self.max_amount {
            if amount > max_amount {
                return Err(LimitError::AmountAboveMax { amount, max_amount });
            }
        }
        if let Some(price_step) = self.price_step {
            if !price_step.is_zero() && !(price % price_step).is_zero() {
                return Err(LimitError::PriceStep { price, price_step });
            }
        }
        if let Some(amount_step) = self.amount_step {
            if !amount_step.is_zero() && !(amount % amount_step).is_zero() {
                return Err(LimitError::AmountStep {
                    amount,
                    amount_step,
                });
            }
        }
        if let Some(min_notional) = self.min_notional {
            let notional = price * amount;
            if notional < min_notional {
                return Err(LimitError::NotionalBelowMin {
                    notional,
                    min_notional,
                });
            }
        }
        Ok(())
    }
}

/// Execution limit violations, precise enough to correct the offending order locally.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum LimitError {
    #[error("order price {price} below venue minimum {min_price}")]
    PriceBelowMin { price: Decimal, min_price: Decimal },

    #[error("order price {price} above venue maximum {max_price}")]
    PriceAboveMax { price: Decimal, max_price: Decimal },

    #[error("order amount {amount} below venue minimum {min_amount}")]
    AmountBelowMin {
        amount: Decimal,
        min_amount: Decimal,
    },

    #[error("order amount {amount} above venue maximum {max_amount}")]
    AmountAboveMax {
        amount: Decimal,
        max_amount: Decimal,
    },

    #[error("order price {price} not a multiple of venue price step {price_step}")]
    PriceStep { price: Decimal, price_step: Decimal },

    #[error("order amount {amount} not a multiple of venue amount step {amount_step}")]
    AmountStep {
        amount: Decimal,
        amount_step: Decimal,
    },

    #[error("order notional {notional} below venue minimum {min_notional}")]
    NotionalBelowMin {
        notional: Decimal,
        min_notional: Decimal,
    },
}

/// Collection of [`ExecutionLimits`] keyed by `(AssetClass, Pair)`.
#[derive(Debug, Clone, Default)]
pub struct LimitsStore {
    limits: FnvHashMap<(AssetClass, Pair), ExecutionLimits>,
}

impl LimitsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the [`ExecutionLimits`] for a market.
    pub fn load(&mut self, asset: AssetClass, pair: Pair, limits: ExecutionLimits) {
        self.limits.insert((asset, pair), limits);
    }

    /// Find the [`ExecutionLimits`] for a market, if any were loaded.
    pub fn get(&self, asset: AssetClass, pair: &Pair) -> Option<&ExecutionLimits> {
        self.limits.get(&(asset, pair.clone()))
    }

    /// Validate an order against the loaded limits of its market. Markets without loaded limits
    /// pass trivially.
    pub fn validate_order(
        &self,
        asset: AssetClass,
        pair: &Pair,
        price: Decimal,
        amount: Decimal,
    ) -> Result<(), LimitError> {
        match self.get(asset, pair) {
            Some(limits) => limits.validate_order(price, amount),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limits() -> ExecutionLimits {
        ExecutionLimits {
            min_price: Some(dec!(0.01)),
            max_price: Some(dec!(1000000)),
            min_amount: Some(dec!(0.001)),
            max_amount: Some(dec!(9000)),
            price_step: Some(dec!(0.01)),
            amount_step: Some(dec!(0.001)),
            min_notional: Some(dec!(10)),
        }
    }

    #[test]
    fn test_validate_order() {
        struct TestCase {
            price: Decimal,
            amount: Decimal,
            expected: Result<(), LimitError>,
        }

        let tests = vec![
            TestCase {
                // TC0: valid order
                price: dec!(100.00),
                amount: dec!(1.000),
                expected: Ok(()),
            },
            TestCase {
                // TC1: amount below minimum
                price: dec!(100000.00),
                amount: dec!(0.0001),
                expected: Err(LimitError::AmountBelowMin {
                    amount: dec!(0.0001),
                    min_amount: dec!(0.001),
                }),
            },
            TestCase {
                // TC2: price step violation
                price: dec!(100.005),
                amount: dec!(1.000),
                expected: Err(LimitError::PriceStep {
                    price: dec!(100.005),
                    price_step: dec!(0.01),
                }),
            },
            TestCase {
                // TC3: notional below minimum
                price: dec!(1.00),
                amount: dec!(1.000),
                expected: Err(LimitError::NotionalBelowMin {
                    notional: dec!(1.00),
                    min_notional: dec!(10),
                }),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(
                limits().validate_order(test.price, test.amount),
                test.expected,
                "TC{index} failed"
            );
        }
    }

    #[test]
    fn test_store_passes_unknown_market() {
        let store = LimitsStore::new();
        assert!(
            store
                .validate_order(
                    AssetClass::Spot,
                    &Pair::new("btc", "usdt"),
                    dec!(1),
                    dec!(1)
                )
                .is_ok()
        );
    }
}
