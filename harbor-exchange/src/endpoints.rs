use crate::error::VenueError;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// Endpoint slot in a venue's [`Endpoints`] map.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKey {
    RestSpot,
    RestFutures,
    RestSupplementary,
    WebsocketSpot,
    WebsocketFutures,
    WebsocketAuthenticated,
}

/// Enum-keyed map of a venue's API endpoints, seeded during
/// [`setup_defaults`](crate::base::VenueBase::setup_defaults) and read-mostly thereafter.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Endpoints {
    urls: FnvHashMap<EndpointKey, Url>,
}

impl Endpoints {
    /// Construct a new [`Endpoints`] map from `(EndpointKey, Url)` seeds.
    pub fn new<Iter>(urls: Iter) -> Self
    where
        Iter: IntoIterator<Item = (EndpointKey, Url)>,
    {
        Self {
            urls: urls.into_iter().collect(),
        }
    }

    /// Find the [`Url`] registered for the provided [`EndpointKey`].
    pub fn get(&self, key: EndpointKey) -> Result<&Url, VenueError> {
        self.urls.get(&key).ok_or(VenueError::EndpointNotFound(key))
    }

    /// Insert or replace the [`Url`] for the provided [`EndpointKey`].
    pub fn insert(&mut self, key: EndpointKey, url: Url) {
        self.urls.insert(key, url);
    }
}
