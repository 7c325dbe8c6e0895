//! HTTP client for an OpenVidu-compatible media server REST API.
//!
//! # Security
//!
//! - Requests authenticate with HTTP basic auth (`OPENVIDUAPP:<secret>`)
//! - The secret is held in a `SecretString` and never logged
//! - Timeouts prevent hanging connections
//! - Provider error bodies are logged server-side only

use super::{Capability, MediaProvider};
use crate::errors::ScError;
use crate::observability::metrics;

use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Fixed basic-auth user name of the provider API.
const PROVIDER_AUTH_USER: &str = "OPENVIDUAPP";

/// Connect timeout, independent of the request timeout.
const PROVIDER_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Response to session creation.
#[derive(Debug, Clone, Deserialize)]
struct CreateSessionResponse {
    id: String,
}

/// Request body for a new connection.
#[derive(Debug, Clone, Serialize)]
struct ConnectionRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    role: &'static str,
    data: &'a str,
}

/// Response to connection creation.
#[derive(Debug, Clone, Deserialize)]
struct ConnectionResponse {
    token: String,
}

/// REST media provider.
#[derive(Clone)]
pub struct HttpMediaProvider {
    client: Client,
    base_url: String,
    secret: SecretString,
}

impl HttpMediaProvider {
    /// Create a provider client.
    ///
    /// # Errors
    ///
    /// Returns `ScError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: &str, secret: SecretString, timeout: Duration) -> Result<Self, ScError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(PROVIDER_CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "sc.provider", error = %e, "Failed to build HTTP client");
                ScError::Config(format!("failed to build provider client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
        })
    }

    /// Send a POST and decode a successful JSON response.
    async fn post_json<B, R>(&self, operation: &'static str, url: &str, body: &B) -> Result<R, ScError>
    where
        B: Serialize + ?Sized + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let started = Instant::now();
        let result = self.send(operation, url, body).await;
        metrics::record_provider_request(operation, result.is_ok(), started.elapsed());
        result
    }

    async fn send<B, R>(&self, operation: &'static str, url: &str, body: &B) -> Result<R, ScError>
    where
        B: Serialize + ?Sized + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .basic_auth(PROVIDER_AUTH_USER, Some(self.secret.expose_secret()))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "sc.provider", operation, error = %e, "Provider request failed");
                ScError::ProviderUnavailable(format!("{operation}: request failed"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(
                target: "sc.provider",
                operation,
                status = %status,
                body = %error_body,
                "Provider returned error status"
            );
            return Err(ScError::ProviderUnavailable(format!(
                "{operation}: provider returned {status}"
            )));
        }

        response.json().await.map_err(|e| {
            error!(target: "sc.provider", operation, error = %e, "Failed to parse provider response");
            ScError::ProviderUnavailable(format!("{operation}: malformed response"))
        })
    }
}

#[async_trait::async_trait]
impl MediaProvider for HttpMediaProvider {
    #[instrument(skip_all, name = "sc.provider.create_session")]
    async fn create_session(&self) -> Result<String, ScError> {
        let url = format!("{}/openvidu/api/sessions", self.base_url);
        let response: CreateSessionResponse = self
            .post_json("create_session", &url, &serde_json::json!({}))
            .await?;
        Ok(response.id)
    }

    #[instrument(skip_all, name = "sc.provider.mint_token", fields(provider_session_id = %provider_session_id))]
    async fn mint_token(
        &self,
        provider_session_id: &str,
        participant_name: &str,
        capability: Capability,
    ) -> Result<String, ScError> {
        let url = format!(
            "{}/openvidu/api/sessions/{provider_session_id}/connection",
            self.base_url
        );
        let request = ConnectionRequest {
            kind: "WEBRTC",
            role: capability.as_str(),
            data: participant_name,
        };
        let response: ConnectionResponse = self.post_json("mint_token", &url, &request).await?;
        Ok(response.token)
    }
}
