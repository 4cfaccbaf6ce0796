use crate::{base::VenueBase, error::VenueError, venue::Venue};
use async_trait::async_trait;
use harbor_instrument::{asset::AssetClass, pair::Pair};
use harbor_integration::{
    error::SocketError,
    protocol::http::{
        HttpParser,
        public::PublicNoHeaders,
        rest::{RestRequest, client::RestClient},
    },
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// [`BinanceVenue`] REST API base url.
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#general-api-information>
pub const HTTP_BASE_URL_BINANCE: &str = "https://api.binance.com";

/// Binance venue adapter.
///
/// Holds the shared [`VenueBase`] and overrides the catalog operations; everything else
/// inherits the [`Venue`] defaults returning `NotSupported`.
#[derive(Debug)]
pub struct BinanceVenue {
    base: VenueBase,
    rest: RestClient<'static, PublicNoHeaders, BinanceHttpParser>,
}

impl BinanceVenue {
    pub fn new(base: VenueBase) -> Self {
        Self {
            base,
            rest: RestClient::new(HTTP_BASE_URL_BINANCE, PublicNoHeaders, BinanceHttpParser),
        }
    }
}

#[async_trait]
impl Venue for BinanceVenue {
    fn base(&self) -> &VenueBase {
        &self.base
    }

    async fn fetch_tradable_pairs(&self, asset: AssetClass) -> Result<Vec<Pair>, VenueError> {
        if asset != AssetClass::Spot {
            return Err(VenueError::AssetNotSupported {
                venue: self.name(),
                asset,
            });
        }

        let (exchange_info, _latency) = self.rest.execute(BinanceExchangeInfoRequest).await?;

        let pairs = exchange_info
            .symbols
            .into_iter()
            .filter(|symbol| symbol.status == "TRADING")
            .filter_map(|symbol| Pair::try_new(symbol.base_asset, symbol.quote_asset).ok())
            .collect();
        Ok(pairs)
    }
}

/// Binance exchange information request.
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#exchange-information>
#[derive(Debug, Copy, Clone)]
pub struct BinanceExchangeInfoRequest;

impl RestRequest for BinanceExchangeInfoRequest {
    type Response = BinanceExchangeInfo;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/exchangeInfo")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

/// Binance exchange information response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceExchangeInfo {
    pub symbols: Vec<BinanceSymbol>,
}

/// One Binance listed symbol.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceSymbol {
    #[serde(rename = "baseAsset")]
    pub base_asset: String,
    #[serde(rename = "quoteAsset")]
    pub quote_asset: String,
    pub status: String,
}

/// Binance API error payload.
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#error-codes>
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceApiError {
    pub code: i64,
    pub msg: String,
}

/// Parses Binance REST responses, mapping API error payloads into [`VenueError`].
#[derive(Debug, Copy, Clone)]
pub struct BinanceHttpParser;

impl HttpParser for BinanceHttpParser {
    type ApiError = BinanceApiError;
    type OutputError = VenueError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        VenueError::Socket(SocketError::HttpResponse(
            status,
            format!("code={}, msg={}", error.code, error.msg),
        ))
    }
}
