use harbor_integration::{Validator, error::SocketError};
use serde::{Deserialize, Serialize};

/// [`Binance`](super::Binance) subscription response message.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#live-subscribing-unsubscribing-to-streams>
/// #### Subscription Success
/// ```json
/// {
///     "id":1,
///     "result":null
/// }
/// ```
///
/// #### Subscription Failure
/// ```json
/// {
///     "id":1,
///     "result":[]
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub struct BinanceSubResponse {
    result: Option<Vec<String>>,
    id: u32,
}

impl Validator for BinanceSubResponse {
    fn validate(self) -> Result<Self, SocketError>
    where
        Self: Sized,
    {
        if self.result.is_none() {
            Ok(self)
        } else {
            Err(SocketError::Subscribe(
                "received failure subscription response".to_owned(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_binance_sub_response() {
        struct TestCase {
            input: &'static str,
            expected: BinanceSubResponse,
        }

        let cases = vec![
            TestCase {
                // TC0: input response is Subscribed
                input: r#"{"id":1,"result":null}"#,
                expected: BinanceSubResponse {
                    result: None,
                    id: 1,
                },
            },
            TestCase {
                // TC1: input response is failed subscription
                input: r#"{"result": [], "id": 1}"#,
                expected: BinanceSubResponse {
                    result: Some(vec![]),
                    id: 1,
                },
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = serde_json::from_str::<BinanceSubResponse>(test.input).unwrap();
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_validate_binance_sub_response() {
        assert!(
            BinanceSubResponse {
                result: None,
                id: 1
            }
            .validate()
            .is_ok()
        );
        assert!(
            BinanceSubResponse {
                result: Some(vec![]),
                id: 1
            }
            .validate()
            .is_err()
        );
    }
}
