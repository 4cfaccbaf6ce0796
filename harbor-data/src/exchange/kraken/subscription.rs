use harbor_integration::{Validator, error::SocketError};
use serde::{Deserialize, Serialize};

/// [`Kraken`](super::Kraken) subscription response message.
///
/// ### Raw Payload Examples
/// See docs: <https://docs.kraken.com/api/docs/websocket-v2/book>
/// #### Subscription Success
/// ```json
/// {
///     "method": "subscribe",
///     "success": true,
///     "result": {"channel": "book", "symbol": "BTC/USD", "depth": 10},
///     "time_in": "2023-09-25T09:04:31.742599Z",
///     "time_out": "2023-09-25T09:04:31.742727Z"
/// }
/// ```
///
/// #### Subscription Failure
/// ```json
/// {
///     "method": "subscribe",
///     "success": false,
///     "error": "Currency pair not supported"
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct KrakenSubResponse {
    pub method: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl Validator for KrakenSubResponse {
    fn validate(self) -> Result<Self, SocketError>
    where
        Self: Sized,
    {
        if self.success {
            Ok(self)
        } else {
            Err(SocketError::Subscribe(format!(
                "received failure subscription response: {}",
                self.error.unwrap_or_default()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_and_validate_kraken_sub_response() {
        let success = r#"
        {
            "method": "subscribe",
            "success": true,
            "result": {"channel": "book", "symbol": "BTC/USD", "depth": 10},
            "time_in": "2023-09-25T09:04:31.742599Z",
            "time_out": "2023-09-25T09:04:31.742727Z"
        }
        "#;
        assert!(
            serde_json::from_str::<KrakenSubResponse>(success)
                .unwrap()
                .validate()
                .is_ok()
        );

        let failure = r#"
        {
            "method": "subscribe",
            "success": false,
            "error": "Currency pair not supported"
        }
        "#;
        assert!(
            serde_json::from_str::<KrakenSubResponse>(failure)
                .unwrap()
                .validate()
                .is_err()
        );
    }
}
