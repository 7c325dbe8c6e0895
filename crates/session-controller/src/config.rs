//! Session Controller configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default bind address for the HTTP server (health, metrics, WebSocket).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default maximum roster size enforced by the assignment policy.
pub const DEFAULT_SESSION_CAPACITY: usize = 6;

/// Default scheduler tick interval in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default timeout for a single media provider request.
pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "sc";

/// Session Controller configuration.
#[derive(Clone)]
pub struct Config {
    /// Redis connection URL for the durable flag store.
    /// Protected by `SecretString` because it may embed a password.
    pub redis_url: SecretString,

    /// Base URL of the media provider REST API.
    pub provider_url: String,

    /// Media provider API secret (HTTP basic auth).
    pub provider_secret: SecretString,

    /// Timeout for a single provider request.
    pub provider_timeout_seconds: u64,

    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum roster size used by the assignment policy (default: 6).
    pub session_capacity: usize,

    /// Roster size at which a session's scheduler is started automatically.
    /// Defaults to `session_capacity`.
    pub start_threshold: usize,

    /// Scheduler tick interval in milliseconds (default: 1000).
    pub tick_interval_ms: u64,

    /// Unique identifier for this instance (used in logs).
    pub instance_id: String,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("provider_url", &self.provider_url)
            .field("provider_secret", &"[REDACTED]")
            .field("provider_timeout_seconds", &self.provider_timeout_seconds)
            .field("bind_address", &self.bind_address)
            .field("session_capacity", &self.session_capacity)
            .field("start_threshold", &self.start_threshold)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis_url = SecretString::from(required(vars, "REDIS_URL")?);
        let provider_url = required(vars, "SC_PROVIDER_URL")?;
        let provider_secret = SecretString::from(required(vars, "SC_PROVIDER_SECRET")?);

        let bind_address = vars
            .get("SC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let session_capacity = parse_positive(vars, "SC_SESSION_CAPACITY")?
            .unwrap_or(DEFAULT_SESSION_CAPACITY as u64);
        let session_capacity = usize::try_from(session_capacity).map_err(|_| {
            ConfigError::InvalidValue("SC_SESSION_CAPACITY is too large".to_string())
        })?;

        let start_threshold = match parse_positive(vars, "SC_START_THRESHOLD")? {
            Some(value) => usize::try_from(value).map_err(|_| {
                ConfigError::InvalidValue("SC_START_THRESHOLD is too large".to_string())
            })?,
            None => session_capacity,
        };

        let tick_interval_ms =
            parse_positive(vars, "SC_TICK_INTERVAL_MS")?.unwrap_or(DEFAULT_TICK_INTERVAL_MS);

        let provider_timeout_seconds = parse_positive(vars, "SC_PROVIDER_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECONDS);

        // Generate instance ID
        let instance_id = vars.get("SC_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().simple().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            redis_url,
            provider_url,
            provider_secret,
            provider_timeout_seconds,
            bind_address,
            session_capacity,
            start_threshold,
            tick_interval_ms,
            instance_id,
        })
    }

    /// Scheduler tick interval as a `Duration`.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Provider request timeout as a `Duration`.
    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds)
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Parse an optional strictly positive integer.
fn parse_positive(vars: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(None);
    };

    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue(format!(
            "{name} must be greater than zero"
        ))),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(ConfigError::InvalidValue(format!("{name}: {e}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "REDIS_URL".to_string(),
                "redis://:hunter2@localhost:6379".to_string(),
            ),
            (
                "SC_PROVIDER_URL".to_string(),
                "https://media.example.com".to_string(),
            ),
            (
                "SC_PROVIDER_SECRET".to_string(),
                "provider-secret-value".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = base_vars();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(
            config.redis_url.expose_secret(),
            "redis://:hunter2@localhost:6379"
        );
        assert_eq!(config.provider_url, "https://media.example.com");
        assert_eq!(config.provider_secret.expose_secret(), "provider-secret-value");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.session_capacity, DEFAULT_SESSION_CAPACITY);
        assert_eq!(config.start_threshold, DEFAULT_SESSION_CAPACITY);
        assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(
            config.provider_timeout(),
            Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECONDS)
        );
        assert!(config.instance_id.starts_with("sc-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("SC_BIND_ADDRESS".to_string(), "127.0.0.1:9090".to_string());
        vars.insert("SC_SESSION_CAPACITY".to_string(), "4".to_string());
        vars.insert("SC_START_THRESHOLD".to_string(), "2".to_string());
        vars.insert("SC_TICK_INTERVAL_MS".to_string(), "250".to_string());
        vars.insert("SC_PROVIDER_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert("SC_INSTANCE_ID".to_string(), "sc-custom-001".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9090");
        assert_eq!(config.session_capacity, 4);
        assert_eq!(config.start_threshold, 2);
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.provider_timeout(), Duration::from_secs(3));
        assert_eq!(config.instance_id, "sc-custom-001");
    }

    #[test]
    fn test_start_threshold_follows_capacity() {
        let mut vars = base_vars();
        vars.insert("SC_SESSION_CAPACITY".to_string(), "8".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.start_threshold, 8);
    }

    #[test]
    fn test_from_vars_missing_required() {
        for name in ["REDIS_URL", "SC_PROVIDER_URL", "SC_PROVIDER_SECRET"] {
            let mut vars = base_vars();
            vars.remove(name);

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == name),
                "expected MissingEnvVar for {name}"
            );
        }
    }

    #[test]
    fn test_zero_and_garbage_values_rejected() {
        let mut vars = base_vars();
        vars.insert("SC_SESSION_CAPACITY".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut vars = base_vars();
        vars.insert("SC_TICK_INTERVAL_MS".to_string(), "fast".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let vars = base_vars();
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("provider-secret-value"));
        assert!(debug_output.contains("media.example.com"));
    }
}
