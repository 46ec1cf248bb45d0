//! Authentication module
//!
//! The vendor API uses HTTP Basic authentication built from an access key
//! and a secret key.

use base64::Engine as _;
use std::fmt;

/// Access/secret key pair for the vendor API
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    access_key: String,
    secret_key: String,
}

impl ApiCredentials {
    /// Create a credential pair
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Access key (safe to log)
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// `base64(access_key:secret_key)`
    pub fn encoded(&self) -> String {
        base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.access_key, self.secret_key))
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("Basic {}", self.encoded())
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"****")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_header() {
        let creds = ApiCredentials::new("user", "pass");
        // base64("user:pass")
        assert_eq!(creds.encoded(), "dXNlcjpwYXNz");
        assert_eq!(creds.authorization_header(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_debug_masks_secret() {
        let creds = ApiCredentials::new("ak_live", "very-secret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("ak_live"));
        assert!(!debug.contains("very-secret"));
    }
}
