//! Provider fallback management
//!
//! A single manager instance is shared by every pipeline stage. Any stage
//! observing a quota failure triggers the switch; all subsequent oracle
//! calls, from any stage, immediately see the secondary provider. The
//! transition is one-way for the process lifetime; a fresh process starts
//! back at the primary.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::warn;

use super::LlmClient;
use super::Oracle;
use crate::errors::NewsRecError;
use crate::Result;

/// Maximum attempts for one logical oracle call: primary, then secondary.
pub const MAX_ORACLE_ATTEMPTS: usize = 2;

/// Which provider currently backs oracle calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Primary,
    Secondary,
}

/// Process-wide provider selector with a one-way fallback transition
pub struct ProviderManager {
    primary: Arc<dyn Oracle>,
    secondary: Arc<dyn Oracle>,
    degraded: AtomicBool,
}

impl ProviderManager {
    /// Create a manager over explicit oracle instances
    pub fn new(primary: Arc<dyn Oracle>, secondary: Arc<dyn Oracle>) -> Self {
        Self {
            primary,
            secondary,
            degraded: AtomicBool::new(false),
        }
    }

    /// Build both provider clients from application configuration
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        let timeout = config.oracle_timeout_secs();
        let primary = LlmClient::new(config.primary_provider(), timeout)?;
        let secondary = LlmClient::new(config.secondary_provider(), timeout)?;
        Ok(Self::new(Arc::new(primary), Arc::new(secondary)))
    }

    /// The provider all oracle calls are currently bound to
    pub fn current(&self) -> Provider {
        if self.degraded.load(Ordering::SeqCst) {
            Provider::Secondary
        } else {
            Provider::Primary
        }
    }

    /// An oracle bound to the current provider
    pub fn oracle(&self) -> Arc<dyn Oracle> {
        match self.current() {
            Provider::Primary => Arc::clone(&self.primary),
            Provider::Secondary => Arc::clone(&self.secondary),
        }
    }

    /// One-way transition to the secondary provider.
    ///
    /// Idempotent: switching while already degraded is a no-op, so
    /// concurrent callers converge without coordination.
    pub fn switch_to_secondary(&self) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!("Quota exceeded on primary provider; switching to secondary for the rest of this run");
        }
    }

    /// Run one logical oracle call with the bounded fallback retry.
    ///
    /// Attempt 1 runs on the current provider; a quota failure switches the
    /// manager and attempt 2 runs on the (possibly new) provider. Any other
    /// error, or a second quota failure, propagates to the caller.
    pub async fn complete_with_fallback(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.oracle().complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) if should_retry(attempt, &err) => {
                    self.switch_to_secondary();
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Retry decision as a pure function of attempt count and last error
fn should_retry(attempt: usize, err: &NewsRecError) -> bool {
    attempt + 1 < MAX_ORACLE_ATTEMPTS && err.is_quota_exceeded()
}
