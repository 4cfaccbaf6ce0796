use crate::{
    base::VenueBase,
    credentials::Credentials,
    error::VenueError,
    order::{Order, VenueOrderId},
};
use async_trait::async_trait;
use harbor_instrument::{asset::AssetClass, exchange::VenueId, pair::Pair};
use rust_decimal::Decimal;

/// Capability surface every venue adapter provides.
///
/// Adapters hold a [`VenueBase`] and override the operations their venue supports; the rest
/// inherit defaults returning [`VenueError::NotSupported`] or
/// [`VenueError::NotYetImplemented`]. A default that is enabled via feature flags without an
/// override is refused at setup by
/// [`VenueBase::setup_defaults`].
#[async_trait]
pub trait Venue: Send + Sync {
    /// Shared state and default behaviours for this venue.
    fn base(&self) -> &VenueBase;

    /// Identifier of this venue.
    fn name(&self) -> VenueId {
        self.base().venue
    }

    /// Whether this adapter overrides the websocket order methods. Drives the capability check
    /// at setup.
    fn overrides_websocket_orders(&self) -> bool {
        false
    }

    /// Fetch the venue's tradable pair catalog for the provided [`AssetClass`].
    async fn fetch_tradable_pairs(&self, _asset: AssetClass) -> Result<Vec<Pair>, VenueError> {
        Err(VenueError::NotYetImplemented("fetch_tradable_pairs"))
    }

    /// Fetch the venue catalog, diff against the stored available set, and persist.
    async fn update_tradable_pairs(&self, force: bool) -> Result<(), VenueError> {
        for asset in self.base().assets() {
            let catalog = self.fetch_tradable_pairs(asset).await?;
            self.base().update_tradable_pairs(&catalog, asset, force)?;
        }
        Ok(())
    }

    /// Submit an order over the venue's authenticated websocket.
    async fn websocket_submit_order(
        &self,
        _credentials: Option<&Credentials>,
        _order: &Order,
    ) -> Result<VenueOrderId, VenueError> {
        Err(VenueError::NotSupported {
            venue: self.name(),
            function: "websocket_submit_order",
        })
    }

    /// Modify an open order over the venue's authenticated websocket.
    async fn websocket_modify_order(
        &self,
        _credentials: Option<&Credentials>,
        _order_id: &VenueOrderId,
        _price: Option<Decimal>,
        _amount: Option<Decimal>,
    ) -> Result<(), VenueError> {
        Err(VenueError::NotSupported {
            venue: self.name(),
            function: "websocket_modify_order",
        })
    }

    /// Cancel an open order over the venue's authenticated websocket.
    async fn websocket_cancel_order(
        &self,
        _credentials: Option<&Credentials>,
        _order_id: &VenueOrderId,
    ) -> Result<(), VenueError> {
        Err(VenueError::NotSupported {
            venue: self.name(),
            function: "websocket_cancel_order",
        })
    }

    /// Fetch the open interest of a derivatives market.
    async fn get_open_interest(
        &self,
        _pair: &Pair,
        _asset: AssetClass,
    ) -> Result<Decimal, VenueError> {
        Err(VenueError::NotSupported {
            venue: self.name(),
            function: "get_open_interest",
        })
    }

    /// Validate an order locally against execution limits before submission.
    fn validate_order(&self, order: &Order) -> Result<(), VenueError> {
        self.base()
            .limits
            .validate_order(order.asset, &order.pair, order.price, order.amount)
            .map_err(VenueError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::VenueConfig,
        credentials::CredentialsRequirement,
        endpoints::Endpoints,
        features::Features,
    };
    use harbor_instrument::pair::{PairFormat, store::{PairManager, PairStore}};

    struct BareVenue {
        base: VenueBase,
    }

    impl Venue for BareVenue {
        fn base(&self) -> &VenueBase {
            &self.base
        }
    }

    fn bare_venue() -> BareVenue {
        let mut store = PairStore::new(PairFormat::concatenated(), PairFormat::default());
        store.available = vec![Pair::new("btc", "usdt")];
        let config = VenueConfig {
            venue: VenueId::Kraken,
            features: Features::default(),
            endpoints: Endpoints::default(),
            pairs: PairManager::new([(AssetClass::Spot, store)]),
            credentials: None,
            credentials_requirement: CredentialsRequirement::default(),
            http_timeout: None,
            websocket_traffic_timeout: None,
            websocket_response_timeout: None,
            websocket_response_max_limit: None,
            kline_intervals: vec![],
            kline_request_limit: 0,
        };
        BareVenue {
            base: VenueBase::setup_defaults(config, false).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_defaults_return_not_supported() {
        let venue = bare_venue();
        let order = Order::new(
            VenueId::Kraken,
            Pair::new("btc", "usdt"),
            AssetClass::Spot,
            harbor_instrument::Side::Buy,
            crate::order::OrderType::Limit,
            rust_decimal_macros::dec!(1),
            rust_decimal_macros::dec!(1),
        );

        assert!(matches!(
            venue.websocket_submit_order(None, &order).await,
            Err(VenueError::NotSupported {
                function: "websocket_submit_order",
                ..
            })
        ));
        assert!(matches!(
            venue
                .get_open_interest(&Pair::new("btc", "usd"), AssetClass::PerpetualSwap)
                .await,
            Err(VenueError::NotSupported {
                function: "get_open_interest",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_fetch_tradable_pairs_defaults_to_not_yet_implemented() {
        let venue = bare_venue();
        assert!(matches!(
            venue.fetch_tradable_pairs(AssetClass::Spot).await,
            Err(VenueError::NotYetImplemented("fetch_tradable_pairs"))
        ));
    }
}
