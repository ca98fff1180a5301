//! Conduit configuration.
//!
//! [`ConduitConfig`] is plain data assembled by
//! [`ConduitBuilder`](super::ConduitBuilder). It is validated once, at build
//! time, and shared read-only by every channel afterwards.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use crate::control::DEFAULT_STATUS_POLL_INTERVAL;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of extra reconnect attempts.
pub const DEFAULT_RECONNECT_RETRIES: u32 = 32;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_millis(256);

// ============================================================================
// ReconnectOptions
// ============================================================================

/// Retry budget for [`Channel::reconnect_with`](crate::Channel::reconnect_with).
///
/// A reconnect makes one attempt plus up to `retries` more, waiting
/// `timeout` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectOptions {
    /// Attempts allowed after the first one.
    pub retries: u32,

    /// Delay between attempts.
    pub timeout: Duration,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_RETRIES, DEFAULT_RECONNECT_TIMEOUT)
    }
}

impl ReconnectOptions {
    /// Creates reconnect options.
    #[inline]
    #[must_use]
    pub const fn new(retries: u32, timeout: Duration) -> Self {
        Self { retries, timeout }
    }

    /// Single attempt, no retries.
    #[inline]
    #[must_use]
    pub const fn once() -> Self {
        Self::new(0, DEFAULT_RECONNECT_TIMEOUT)
    }

    /// Sets the retry count.
    #[inline]
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the delay between attempts.
    #[inline]
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upper bound on connect attempts made by one reconnect.
    #[inline]
    #[must_use]
    pub const fn max_attempts(&self) -> u64 {
        self.retries as u64 + 1
    }
}

// ============================================================================
// ConduitConfig
// ============================================================================

/// Validated conduit settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ConduitConfig {
    /// Top-level client id, the second path segment of every socket URL.
    pub client_id: String,

    /// Shared key for channels that do not set their own.
    pub shared_key: String,

    /// Initial process default port, 0 when unknown.
    pub port: u16,

    /// Defaults for reconnects and the resume sweep.
    pub reconnect: ReconnectOptions,

    /// Delay between readiness polls.
    pub status_poll_interval: Duration,

    /// Readiness poll budget per connect; `None` polls until active.
    pub max_status_polls: Option<u32>,
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            shared_key: String::new(),
            port: 0,
            reconnect: ReconnectOptions::default(),
            status_poll_interval: DEFAULT_STATUS_POLL_INTERVAL,
            max_status_polls: None,
        }
    }
}

impl fmt::Debug for ConduitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConduitConfig")
            .field("client_id", &self.client_id)
            .field("shared_key", &"<redacted>")
            .field("port", &self.port)
            .field("reconnect", &self.reconnect)
            .field("status_poll_interval", &self.status_poll_interval)
            .field("max_status_polls", &self.max_status_polls)
            .finish()
    }
}

impl ConduitConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client id is empty or the poll
    /// interval or poll budget is zero.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(Error::config(
                "Client id is required. Use .client_id() to set it.\n\
                 Example: Conduit::builder().client_id(\"top\")",
            ));
        }

        if self.status_poll_interval.is_zero() {
            return Err(Error::config("Status poll interval must be greater than zero"));
        }

        if self.max_status_polls == Some(0) {
            return Err(Error::config("Status poll budget must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
