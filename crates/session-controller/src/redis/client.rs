//! Redis-backed session flag store.
//!
//! # Key Patterns
//!
//! - `session:{id}:timerFlag` - set to `"true"` once the session's scheduler started
//!
//! # Connection Pattern
//!
//! The redis-rs `MultiplexedConnection` is cheap to clone and safe to use
//! concurrently. Each operation clones it; no locking is needed.

use crate::errors::ScError;
use crate::flags::{flag_key, SessionFlagStore};
use crate::observability::metrics;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, error, instrument, warn};

/// Value stored under a set flag.
const FLAG_VALUE: &str = "true";

/// Redis flag store.
#[derive(Clone)]
pub struct RedisFlagStore {
    connection: MultiplexedConnection,
}

impl RedisFlagStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `ScError::FlagStore` if the URL is invalid or the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, ScError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Do NOT log redis_url; it may embed a password.
            error!(target: "sc.flag_store", error = %e, "Failed to open Redis client");
            ScError::FlagStore(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "sc.flag_store", error = %e, "Failed to connect to Redis");
                ScError::FlagStore(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }
}

fn flag_store_error(operation: &'static str, session: &str, e: &redis::RedisError) -> ScError {
    metrics::record_flag_store_error(operation);
    warn!(
        target: "sc.flag_store",
        operation,
        session = %session,
        error = %e,
        "Flag store operation failed"
    );
    ScError::FlagStore(format!("{operation} failed: {e}"))
}

#[async_trait::async_trait]
impl SessionFlagStore for RedisFlagStore {
    #[instrument(skip_all, fields(session = %session))]
    async fn get(&self, session: &str) -> Result<Option<bool>, ScError> {
        let mut conn = self.connection.clone();

        let value: Option<String> = conn
            .get(flag_key(session))
            .await
            .map_err(|e| flag_store_error("get", session, &e))?;

        Ok(value.map(|v| v == FLAG_VALUE))
    }

    #[instrument(skip_all, fields(session = %session))]
    async fn set(&self, session: &str) -> Result<(), ScError> {
        let mut conn = self.connection.clone();

        conn.set::<_, _, ()>(flag_key(session), FLAG_VALUE)
            .await
            .map_err(|e| flag_store_error("set", session, &e))?;

        debug!(target: "sc.flag_store", session = %session, "Flag set");
        Ok(())
    }

    #[instrument(skip_all, fields(session = %session))]
    async fn delete(&self, session: &str) -> Result<(), ScError> {
        let mut conn = self.connection.clone();

        conn.del::<_, ()>(flag_key(session))
            .await
            .map_err(|e| flag_store_error("delete", session, &e))?;

        debug!(target: "sc.flag_store", session = %session, "Flag deleted");
        Ok(())
    }

    #[instrument(skip_all, fields(session = %session))]
    async fn try_set(&self, session: &str) -> Result<bool, ScError> {
        let mut conn = self.connection.clone();

        // SET NX replies OK when the key was written and nil otherwise.
        let reply: Option<String> = redis::cmd("SET")
            .arg(flag_key(session))
            .arg(FLAG_VALUE)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| flag_store_error("try_set", session, &e))?;

        let acquired = reply.is_some();
        debug!(target: "sc.flag_store", session = %session, acquired, "Flag try_set");
        Ok(acquired)
    }
}
