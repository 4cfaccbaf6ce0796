use serde::{Deserialize, Serialize};

/// Capability flags for one venue.
///
/// `supports` is what the venue adapter claims the venue API can do; `enabled` is what this
/// process has switched on. An enabled capability the adapter does not actually implement is a
/// configuration defect caught at setup by
/// [`VenueBase::validate_capabilities`](crate::base::VenueBase::validate_capabilities).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct Features {
    pub supports: FeatureSet,
    pub enabled: FeatureSet,
}

impl Features {
    /// Determine if a capability is both supported and enabled.
    pub fn active(&self, select: fn(&FeatureSet) -> bool) -> bool {
        select(&self.supports) && select(&self.enabled)
    }
}

/// Individual capability flags.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct FeatureSet {
    pub rest: bool,
    pub websocket: bool,
    pub authenticated_rest: bool,
    pub authenticated_websocket: bool,
    pub websocket_submit_order: bool,
    pub websocket_modify_order: bool,
    pub websocket_cancel_order: bool,
    pub open_interest: bool,
    pub kline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_requires_support_and_enablement() {
        let features = Features {
            supports: FeatureSet {
                websocket: true,
                ..Default::default()
            },
            enabled: FeatureSet::default(),
        };
        assert!(!features.active(|set| set.websocket));

        let features = Features {
            supports: FeatureSet {
                websocket: true,
                ..Default::default()
            },
            enabled: FeatureSet {
                websocket: true,
                ..Default::default()
            },
        };
        assert!(features.active(|set| set.websocket));
    }
}
