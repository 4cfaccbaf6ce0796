use crate::{endpoints::EndpointKey, kline::KlineError, limits::LimitError, order::OrderStatus};
use harbor_instrument::{asset::AssetClass, exchange::VenueId, pair::PairError};
use thiserror::Error;

/// All venue capability errors generated in `harbor-exchange`.
#[derive(Debug, Error)]
pub enum VenueError {
    #[error("function is not yet implemented: {0}")]
    NotYetImplemented(&'static str),

    #[error("{venue} does not support: {function}")]
    NotSupported {
        venue: VenueId,
        function: &'static str,
    },

    #[error("{venue} enables capability {capability} without implementing it")]
    CapabilityUnimplemented {
        venue: VenueId,
        capability: &'static str,
    },

    #[error("credentials are empty")]
    CredentialsEmpty,

    #[error("credentials require an API key")]
    RequiresKey,

    #[error("credentials require an API secret")]
    RequiresSecret,

    #[error("credentials require a client id")]
    RequiresClientId,

    #[error("credentials require a PEM key")]
    RequiresPem,

    #[error("failed to base64 decode credentials secret: {0}")]
    Base64DecodeFailure(String),

    #[error("authenticated endpoints are not enabled for {0}")]
    AuthenticatedEndpointsDisabled(VenueId),

    #[error("endpoint not found: {0:?}")]
    EndpointNotFound(EndpointKey),

    #[error("asset class {asset} not supported on {venue}")]
    AssetNotSupported { venue: VenueId, asset: AssetClass },

    #[error("invalid order status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("no sub accounts stored for the provided credentials")]
    NoSubAccounts,

    #[error("no balances stored for the provided credentials")]
    NoBalances,

    #[error("pair error: {0}")]
    Pair(#[from] PairError),

    #[error("execution limit violation: {0}")]
    Limit(#[from] LimitError),

    #[error("kline request error: {0}")]
    Kline(#[from] KlineError),

    #[error("socket error: {0}")]
    Socket(#[from] harbor_integration::error::SocketError),
}
