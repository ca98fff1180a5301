//! Builder pattern for conduit configuration.
//!
//! Provides a fluent API for configuring and creating [`Conduit`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use runtime_conduit::{Conduit, ControlApi, ReconnectOptions};
//!
//! # fn example(api: Arc<dyn ControlApi>) -> runtime_conduit::Result<()> {
//! let conduit = Conduit::builder()
//!     .control(api)
//!     .client_id("top")
//!     .shared_key("abc")
//!     .reconnect(ReconnectOptions::new(8, Duration::from_millis(500)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::control::{ControlApi, ControlFacade};
use crate::error::{Error, Result};

use super::config::{ConduitConfig, ReconnectOptions};
use super::core::Conduit;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable holding the default shared key.
pub const ENV_SHARED_KEY: &str = "CONDUIT_SHARED_KEY";

/// Environment variable holding the default port.
pub const ENV_PORT: &str = "CONDUIT_PORT";

/// Environment variable holding the client id.
pub const ENV_CLIENT_ID: &str = "CONDUIT_CLIENT_ID";

// ============================================================================
// ConduitBuilder
// ============================================================================

/// Builder for configuring a [`Conduit`] instance.
///
/// Use [`Conduit::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConduitBuilder {
    /// Control API access.
    control: Option<Arc<dyn ControlApi>>,
    /// Configuration collected so far.
    config: ConduitConfig,
    /// Runtime override.
    runtime: Option<Handle>,
}

impl fmt::Debug for ConduitBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConduitBuilder")
            .field("has_control", &self.control.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConduitBuilder Implementation
// ============================================================================

impl ConduitBuilder {
    /// Creates a new builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder seeded from the process environment.
    ///
    /// Reads `CONDUIT_SHARED_KEY`, `CONDUIT_PORT` and `CONDUIT_CLIENT_ID`;
    /// unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `CONDUIT_PORT` is not a valid port.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::new();

        if let Some(shared_key) = lookup(ENV_SHARED_KEY) {
            builder = builder.shared_key(shared_key);
        }

        if let Some(port) = lookup(ENV_PORT) {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::config(format!("{ENV_PORT} is not a valid port: {e}")))?;
            builder = builder.port(port);
        }

        if let Some(client_id) = lookup(ENV_CLIENT_ID) {
            builder = builder.client_id(client_id);
        }

        Ok(builder)
    }

    /// Sets the control API used to start and poll the host listener.
    #[inline]
    #[must_use]
    pub fn control(mut self, api: Arc<dyn ControlApi>) -> Self {
        self.control = Some(api);
        self
    }

    /// Sets the top-level client id.
    #[inline]
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    /// Sets the default shared key for new channels.
    #[inline]
    #[must_use]
    pub fn shared_key(mut self, shared_key: impl Into<String>) -> Self {
        self.config.shared_key = shared_key.into();
        self
    }

    /// Sets the initial process default port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the default reconnect budget.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, options: ReconnectOptions) -> Self {
        self.config.reconnect = options;
        self
    }

    /// Sets the delay between readiness polls.
    #[inline]
    #[must_use]
    pub fn status_poll_interval(mut self, interval: Duration) -> Self {
        self.config.status_poll_interval = interval;
        self
    }

    /// Bounds the readiness polls of each connect.
    #[inline]
    #[must_use]
    pub fn max_status_polls(mut self, polls: u32) -> Self {
        self.config.max_status_polls = Some(polls);
        self
    }

    /// Sets the runtime for background tasks. Defaults to the current one.
    #[inline]
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the conduit with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the control API or client id is not set
    /// - [`Error::Config`] if the poll settings are zero
    /// - [`Error::Config`] if no runtime was given and none is current
    pub fn build(self) -> Result<Conduit> {
        let control = self.validate_control()?;
        self.config.validate()?;
        let runtime = self.resolve_runtime()?;

        let facade = ControlFacade::new(control, self.config.status_poll_interval);
        Ok(Conduit::new(self.config, facade, runtime))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConduitBuilder {
    /// Validates the control API configuration.
    fn validate_control(&self) -> Result<Arc<dyn ControlApi>> {
        self.control.clone().ok_or_else(|| {
            Error::config(
                "Control API is required. Use .control() to set it.\n\
                 Example: Conduit::builder().control(Arc::new(api))",
            )
        })
    }

    /// Resolves the runtime for background tasks.
    fn resolve_runtime(&self) -> Result<Handle> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.clone()),
            None => Handle::try_current().map_err(|_| {
                Error::config(
                    "No tokio runtime available. Build the conduit inside a runtime \
                     or pass one with .runtime()",
                )
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::ScriptedControl;

    fn api() -> Arc<dyn ControlApi> {
        ScriptedControl::active(1)
    }

    #[test]
    fn test_new_creates_default_builder() {
        let builder = ConduitBuilder::new();
        assert!(builder.control.is_none());
        assert_eq!(builder.config, ConduitConfig::default());
    }

    #[test]
    fn test_setters() {
        let builder = ConduitBuilder::new()
            .client_id("top")
            .shared_key("abc")
            .port(4242)
            .max_status_polls(5)
            .status_poll_interval(Duration::from_millis(10));

        assert_eq!(builder.config.client_id, "top");
        assert_eq!(builder.config.shared_key, "abc");
        assert_eq!(builder.config.port, 4242);
        assert_eq!(builder.config.max_status_polls, Some(5));
        assert_eq!(builder.config.status_poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_build_fails_without_control() {
        let err = ConduitBuilder::new().client_id("top").build().unwrap_err();
        assert!(err.to_string().contains("Control API"));
    }

    #[test]
    fn test_build_fails_without_client_id() {
        let err = ConduitBuilder::new().control(api()).build().unwrap_err();
        assert!(err.to_string().contains("Client id"));
    }

    #[test]
    fn test_build_fails_outside_runtime() {
        let err = ConduitBuilder::new()
            .control(api())
            .client_id("top")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("tokio runtime"));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let conduit = ConduitBuilder::new()
            .control(api())
            .client_id("top")
            .port(4242)
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        assert_eq!(conduit.default_port(), 4242);
    }

    #[test]
    fn test_from_lookup() {
        let builder = ConduitBuilder::from_lookup(|name| match name {
            ENV_SHARED_KEY => Some("abc".into()),
            ENV_PORT => Some(" 4242 ".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(builder.config.shared_key, "abc");
        assert_eq!(builder.config.port, 4242);
        assert!(builder.config.client_id.is_empty());
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let err = ConduitBuilder::from_lookup(|name| (name == ENV_PORT).then(|| "70000".into()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_PORT));
    }
}
