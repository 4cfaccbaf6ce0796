use crate::subscription::SubKind;
use harbor_instrument::exchange::VenueId;
use harbor_integration::{Terminal, error::SocketError, subscription::SubscriptionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `harbor-data`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("failed to initialise reconnecting MarketStream due to empty subscriptions")]
    SubscriptionsEmpty,

    #[error("initial snapshot missing for: {0}")]
    InitialSnapshotMissing(SubscriptionId),

    #[error("initial snapshot invalid: {0}")]
    InitialSnapshotInvalid(String),

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("unsupported Subscription for venue: {venue}, kind: {sub_kind}")]
    Unsupported { venue: VenueId, sub_kind: SubKind },

    #[error(
        "\
        InvalidSequence: first_update_id {first_update_id} does not follow on from the \
        prev_last_update_id {prev_last_update_id} \
    "
    )]
    InvalidSequence {
        prev_last_update_id: u64,
        first_update_id: u64,
    },

    #[error("checksum mismatch: venue sent {expected}, local book computed {computed}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("orderbook resynchronisation retries exhausted after {retries} attempts")]
    ResyncExhausted { retries: u32 },

    #[error("market registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),
}

impl DataError {
    /// Determine if an error requires a [`MarketStream`](super::MarketStream) to re-initialise.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DataError::InvalidSequence { .. } | DataError::ChecksumMismatch { .. }
        )
    }
}

impl Terminal for DataError {
    fn is_terminal(&self) -> bool {
        DataError::is_terminal(self)
    }
}

impl From<SocketError> for DataError {
    fn from(value: SocketError) -> Self {
        Self::Socket(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_is_terminal() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: is terminal w/ DataError::InvalidSequence
                input: DataError::InvalidSequence {
                    prev_last_update_id: 0,
                    first_update_id: 0,
                },
                expected: true,
            },
            TestCase {
                // TC1: is terminal w/ DataError::ChecksumMismatch
                input: DataError::ChecksumMismatch {
                    expected: 1,
                    computed: 2,
                },
                expected: true,
            },
            TestCase {
                // TC2: is not terminal w/ DataError::Socket
                input: DataError::from(SocketError::Sink),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.is_terminal(), test.expected, "TC{index} failed");
        }
    }
}
