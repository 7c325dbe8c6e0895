//! In-process media provider for tests.

use super::{Capability, MediaProvider};
use crate::errors::ScError;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Mock provider that hands out sequential IDs and deterministic tokens.
#[derive(Debug, Default)]
pub struct MockMediaProvider {
    sessions_created: AtomicUsize,
    tokens_minted: AtomicUsize,
    fail_create: AtomicBool,
    failing_names: Mutex<HashSet<String>>,
    capabilities: Mutex<Vec<Capability>>,
}

impl MockMediaProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose session creation always fails.
    #[must_use]
    pub fn failing() -> Self {
        let provider = Self::default();
        provider.set_fail_create(true);
        provider
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make token requests for `name` fail.
    pub fn fail_token_for(&self, name: &str) {
        self.failing_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    /// Number of successful `create_session` calls.
    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    /// Number of `mint_token` calls, successful or not.
    pub fn token_requests(&self) -> usize {
        self.tokens_minted.load(Ordering::SeqCst)
    }

    /// Capabilities requested so far, in call order.
    pub fn requested_capabilities(&self) -> Vec<Capability> {
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl MediaProvider for MockMediaProvider {
    async fn create_session(&self) -> Result<String, ScError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ScError::ProviderUnavailable(
                "mock provider configured to fail".to_string(),
            ));
        }
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ses_mock_{n}"))
    }

    async fn mint_token(
        &self,
        provider_session_id: &str,
        participant_name: &str,
        capability: Capability,
    ) -> Result<String, ScError> {
        self.tokens_minted.fetch_add(1, Ordering::SeqCst);
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(capability);

        if self
            .failing_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(participant_name)
        {
            return Err(ScError::ProviderUnavailable(format!(
                "mock token failure for {participant_name}"
            )));
        }

        Ok(format!("tok_{provider_session_id}_{participant_name}"))
    }
}
