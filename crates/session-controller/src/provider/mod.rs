//! Media provider integration.
//!
//! The controller never generates media credentials itself. It asks the
//! provider to open a backing session and to mint per-participant tokens.

pub mod http;
pub mod mock;

pub use http::HttpMediaProvider;

use crate::errors::ScError;

/// Capability requested for a participant token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Receive only.
    Subscriber,
    /// Send and receive.
    Publisher,
    /// Publisher plus moderation rights.
    Moderator,
}

impl Capability {
    /// Role string understood by the provider API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::Subscriber => "SUBSCRIBER",
            Capability::Publisher => "PUBLISHER",
            Capability::Moderator => "MODERATOR",
        }
    }
}

/// Backing media service.
#[async_trait::async_trait]
pub trait MediaProvider: Send + Sync {
    /// Open a new backing session. Returns the provider's session ID.
    async fn create_session(&self) -> Result<String, ScError>;

    /// Mint an access token for `participant_name` in `provider_session_id`.
    ///
    /// The participant name is attached as connection data.
    async fn mint_token(
        &self,
        provider_session_id: &str,
        participant_name: &str,
        capability: Capability,
    ) -> Result<String, ScError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_role_strings() {
        assert_eq!(Capability::Subscriber.as_str(), "SUBSCRIBER");
        assert_eq!(Capability::Publisher.as_str(), "PUBLISHER");
        assert_eq!(Capability::Moderator.as_str(), "MODERATOR");
    }
}
