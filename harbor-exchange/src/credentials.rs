use crate::error::VenueError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smol_str::SmolStr;

/// API credentials for one venue account.
///
/// Which components are required varies per venue and is declared with a
/// [`CredentialsRequirement`]. Credentials are carried in a call-scoped parameter and resolved
/// against configured defaults with [`resolve_credentials`]; they are never read from process
/// globals.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct Credentials {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub sub_account: String,
    #[serde(default)]
    pub pem_key: String,
    #[serde(default)]
    pub one_time_password: String,
}

impl Credentials {
    /// Determine if every component is empty.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
            && self.secret.is_empty()
            && self.client_id.is_empty()
            && self.sub_account.is_empty()
            && self.pem_key.is_empty()
    }

    /// Validate this [`Credentials`] against the venue's [`CredentialsRequirement`], decoding a
    /// base64 secret in place exactly once if required.
    pub fn validate(&mut self, requirement: &CredentialsRequirement) -> Result<(), VenueError> {
        if self.is_empty() {
            return Err(VenueError::CredentialsEmpty);
        }
        if requirement.key && self.key.is_empty() {
            return Err(VenueError::RequiresKey);
        }
        if requirement.secret && self.secret.is_empty() {
            return Err(VenueError::RequiresSecret);
        }
        if requirement.client_id && self.client_id.is_empty() {
            return Err(VenueError::RequiresClientId);
        }
        if requirement.pem_key && self.pem_key.is_empty() {
            return Err(VenueError::RequiresPem);
        }
        if requirement.base64_secret && !self.secret.is_empty() {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(self.secret.as_bytes())
                .map_err(|error| VenueError::Base64DecodeFailure(error.to_string()))?;
            self.secret = String::from_utf8(decoded)
                .map_err(|error| VenueError::Base64DecodeFailure(error.to_string()))?;
        }
        Ok(())
    }

    /// Stable fingerprint identifying this credential set, used to partition the account
    /// balance registry so multiple keys coexist for the same venue.
    pub fn fingerprint(&self) -> CredentialsFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.key.as_bytes());
        hasher.update(b"|");
        hasher.update(self.client_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.sub_account.as_bytes());
        let digest = hasher.finalize();
        CredentialsFingerprint(SmolStr::from(hex::encode(&digest[..8])))
    }
}

/// Stable identifier derived from credential components (never the secret).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct CredentialsFingerprint(pub SmolStr);

impl std::fmt::Display for CredentialsFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which [`Credentials`] components a venue requires.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct CredentialsRequirement {
    pub key: bool,
    pub secret: bool,
    pub client_id: bool,
    pub pem_key: bool,
    pub base64_secret: bool,
}

/// Resolve the [`Credentials`] for one operation: a call-scoped credential always beats the
/// configured default, and both absent is an error.
pub fn resolve_credentials<'a>(
    call_scoped: Option<&'a Credentials>,
    configured: Option<&'a Credentials>,
) -> Result<&'a Credentials, VenueError> {
    call_scoped
        .or(configured)
        .filter(|credentials| !credentials.is_empty())
        .ok_or(VenueError::CredentialsEmpty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_missing_components() {
        struct TestCase {
            credentials: Credentials,
            requirement: CredentialsRequirement,
            expected: Result<(), VenueError>,
        }

        let tests = vec![
            TestCase {
                // TC0: empty credentials
                credentials: Credentials::default(),
                requirement: CredentialsRequirement::default(),
                expected: Err(VenueError::CredentialsEmpty),
            },
            TestCase {
                // TC1: key present, secret required but missing
                credentials: Credentials {
                    key: "key".to_string(),
                    ..Default::default()
                },
                requirement: CredentialsRequirement {
                    key: true,
                    secret: true,
                    ..Default::default()
                },
                expected: Err(VenueError::RequiresSecret),
            },
            TestCase {
                // TC2: key & secret present and required
                credentials: Credentials {
                    key: "key".to_string(),
                    secret: "secret".to_string(),
                    ..Default::default()
                },
                requirement: CredentialsRequirement {
                    key: true,
                    secret: true,
                    ..Default::default()
                },
                expected: Ok(()),
            },
            TestCase {
                // TC3: client id required but missing
                credentials: Credentials {
                    key: "key".to_string(),
                    secret: "secret".to_string(),
                    ..Default::default()
                },
                requirement: CredentialsRequirement {
                    client_id: true,
                    ..Default::default()
                },
                expected: Err(VenueError::RequiresClientId),
            },
        ];

        for (index, mut test) in tests.into_iter().enumerate() {
            let actual = test.credentials.validate(&test.requirement);
            match (actual, test.expected) {
                (Ok(()), Ok(())) => {}
                (Err(_), Err(_)) => {}
                (actual, expected) => {
                    panic!("TC{index} failed. \nActual: {actual:?}\nExpected: {expected:?}\n")
                }
            }
        }
    }

    #[test]
    fn test_validate_decodes_base64_secret_in_place() {
        let mut credentials = Credentials {
            key: "key".to_string(),
            secret: "aGFyYm9y".to_string(),
            ..Default::default()
        };

        credentials
            .validate(&CredentialsRequirement {
                secret: true,
                base64_secret: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(credentials.secret, "harbor");
    }

    #[test]
    fn test_validate_rejects_malformed_base64() {
        let mut credentials = Credentials {
            secret: "not base64!!!".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            credentials.validate(&CredentialsRequirement {
                base64_secret: true,
                ..Default::default()
            }),
            Err(VenueError::Base64DecodeFailure(_))
        ));
    }

    #[test]
    fn test_resolve_credentials_prefers_call_scope() {
        let call_scoped = Credentials {
            key: "call".to_string(),
            ..Default::default()
        };
        let configured = Credentials {
            key: "configured".to_string(),
            ..Default::default()
        };

        let resolved = resolve_credentials(Some(&call_scoped), Some(&configured)).unwrap();
        assert_eq!(resolved.key, "call");

        let resolved = resolve_credentials(None, Some(&configured)).unwrap();
        assert_eq!(resolved.key, "configured");

        assert!(matches!(
            resolve_credentials(None, None),
            Err(VenueError::CredentialsEmpty)
        ));
    }

    #[test]
    fn test_fingerprint_is_stable_and_distinct() {
        let a = Credentials {
            key: "key-a".to_string(),
            ..Default::default()
        };
        let b = Credentials {
            key: "key-b".to_string(),
            ..Default::default()
        };

        assert_eq!(a.fingerprint(), a.fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
