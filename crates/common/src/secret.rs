//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for every credential the session
//! controller handles: the Redis URL (which may embed a password) and the
//! media provider's API secret.
//!
//! `SecretString` implements `Debug` with redaction, so a config struct that
//! derives or hand-writes `Debug` cannot leak the value through `{:?}` or
//! tracing fields. Values are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let provider_secret = SecretString::from("MY_SECRET");
//! assert!(!format!("{provider_secret:?}").contains("MY_SECRET"));
//!
//! // Reading the value is always explicit.
//! let raw: &str = provider_secret.expose_secret();
//! assert_eq!(raw, "MY_SECRET");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("redis://:hunter2@cache:6379");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("provider-secret");
        assert_eq!(secret.expose_secret(), "provider-secret");
    }

    #[test]
    fn test_deserialized_provider_credentials_stay_redacted() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct ProviderCredentials {
            url: String,
            secret: SecretString,
        }

        let json = r#"{"url": "https://media.example.com", "secret": "s3cr3t-value"}"#;
        let creds: ProviderCredentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.secret.expose_secret(), "s3cr3t-value");

        let debug = format!("{creds:?}");
        assert!(debug.contains("media.example.com"));
        assert!(!debug.contains("s3cr3t-value"));
    }

    #[test]
    fn test_clone_keeps_value() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
