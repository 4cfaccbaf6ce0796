/// Initialise reconnecting [`MarketStream`](crate::MarketStream)s from collections of
/// [`Subscription`](crate::subscription::Subscription)s.
pub mod consumer;

/// Continually reconnecting venue stream driver with exponential backoff.
pub mod reconnect;
