#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Harbor-Exchange
//! Venue capability base shared by every Harbor venue adapter.
//!
//! A venue adapter holds a [`VenueBase`](base::VenueBase) as a field and implements the
//! [`Venue`](venue::Venue) capability trait, overriding the operations it supports and
//! inheriting `NotSupported` defaults for the rest. The base aggregates:
//! * feature flags ([`features`]) with a startup capability check,
//! * the enum-keyed endpoint map ([`endpoints`]),
//! * the per asset class pair stores (via `harbor-instrument`),
//! * credentials with validation and call-scope resolution ([`credentials`]),
//! * order execution limits enforced locally before submission ([`limits`]),
//! * kline request construction with range batching ([`kline`]).
//!
//! The crate also provides the order model ([`order`]) and the credential-partitioned account
//! balance registry ([`account`]).

/// Credential-partitioned sub-account balance registry with publish-on-save.
pub mod account;

/// Balance and sub-account data structures.
pub mod balance;

/// [`VenueBase`](base::VenueBase) shared state and default behaviours.
pub mod base;

/// Credentials, required-component validation and call-scope resolution.
pub mod credentials;

/// Enum-keyed venue endpoint map.
pub mod endpoints;

/// All [`Error`](std::error::Error)s generated in Harbor-Exchange.
pub mod error;

/// Feature flags a venue declares and enables, with the capability override check.
pub mod features;

/// Kline intervals, request construction and range batching.
pub mod kline;

/// Order execution limits enforced locally before submission.
pub mod limits;

/// Order model: ids, types, time-in-force and the status lifecycle.
pub mod order;

/// [`Venue`](venue::Venue) capability trait with `NotSupported` defaults.
pub mod venue;

/// Concrete venue adapters built on the capability base.
pub mod venues;
