/// Binance venue adapter: catalog fetching over the public REST API.
pub mod binance;
