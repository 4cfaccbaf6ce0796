use harbor_integration::{Validator, error::SocketError};
use serde::{Deserialize, Serialize};

/// [`Okx`](super::Okx) subscription response message.
///
/// ### Raw Payload Examples
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api-subscribe>
/// #### Subscription Success
/// ```json
/// {"event": "subscribe", "arg": {"channel": "trades", "instId": "BTC-USDT"}}
/// ```
///
/// #### Subscription Failure
/// ```json
/// {"event": "error", "code": "60012", "msg": "Invalid request"}
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OkxSubResponse {
    pub event: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl Validator for OkxSubResponse {
    fn validate(self) -> Result<Self, SocketError>
    where
        Self: Sized,
    {
        if self.event == "subscribe" {
            Ok(self)
        } else {
            Err(SocketError::Subscribe(format!(
                "received failure subscription response code: {} with message: {}",
                self.code.unwrap_or_default(),
                self.msg.unwrap_or_default(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_and_validate_okx_sub_response() {
        let success = r#"{"event": "subscribe", "arg": {"channel": "trades", "instId": "BTC-USDT"}}"#;
        assert!(
            serde_json::from_str::<OkxSubResponse>(success)
                .unwrap()
                .validate()
                .is_ok()
        );

        let failure = r#"{"event": "error", "code": "60012", "msg": "Invalid request"}"#;
        assert!(
            serde_json::from_str::<OkxSubResponse>(failure)
                .unwrap()
                .validate()
                .is_err()
        );
    }
}
