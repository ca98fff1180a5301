//! Conduit owner and channel factory.
//!
//! The [`Conduit`] struct holds everything channels share: configuration,
//! the control facade, the channel pool, the pause flag and the process
//! default port.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use runtime_conduit::{Conduit, ControlApi};
//!
//! # async fn example(api: Arc<dyn ControlApi>) -> runtime_conduit::Result<()> {
//! let conduit = Conduit::builder()
//!     .control(api)
//!     .client_id("top")
//!     .build()?;
//!
//! let channel = conduit.channel().id("7").connect().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::control::{ConduitDiagnostics, ConduitStatus, ControlFacade};
use crate::error::Result;
use crate::transport::{Channel, ChannelPool, DEFAULT_CHANNEL_ID};

use super::builder::ConduitBuilder;
use super::config::ConduitConfig;
use super::lifecycle::LifecycleCoordinator;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the conduit.
pub(crate) struct ConduitShared {
    /// Validated configuration.
    pub config: ConduitConfig,

    /// Control API operations.
    pub control: ControlFacade,

    /// Live channels.
    pub pool: ChannelPool,

    /// Set while the process is paused.
    pub paused: AtomicBool,

    /// Process default port, 0 when unknown.
    pub default_port: AtomicU16,

    /// Runtime reconnects and socket tasks are spawned on.
    pub runtime: Handle,
}

impl ConduitShared {
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    #[inline]
    pub fn default_port(&self) -> u16 {
        self.default_port.load(Ordering::Acquire)
    }
}

// ============================================================================
// Conduit
// ============================================================================

/// Process-scoped owner of the conduit channels.
///
/// Cloning is cheap; clones share channels and state.
#[derive(Clone)]
pub struct Conduit {
    /// Shared inner state.
    pub(crate) inner: Arc<ConduitShared>,
}

// ============================================================================
// Conduit - Display
// ============================================================================

impl fmt::Debug for Conduit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conduit")
            .field("client_id", &self.inner.config.client_id)
            .field("default_port", &self.default_port())
            .field("paused", &self.is_paused())
            .field("channel_count", &self.channel_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Conduit - Construction
// ============================================================================

impl Conduit {
    /// Creates a configuration builder for the conduit.
    #[inline]
    #[must_use]
    pub fn builder() -> ConduitBuilder {
        ConduitBuilder::new()
    }

    /// Creates a conduit from validated parts.
    pub(crate) fn new(config: ConduitConfig, control: ControlFacade, runtime: Handle) -> Self {
        let port = config.port;
        debug!(client_id = %config.client_id, port, "Conduit created");

        Self {
            inner: Arc::new(ConduitShared {
                config,
                control,
                pool: ChannelPool::default(),
                paused: AtomicBool::new(false),
                default_port: AtomicU16::new(port),
                runtime,
            }),
        }
    }
}

// ============================================================================
// Conduit - Public API
// ============================================================================

impl Conduit {
    /// Creates a channel builder.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> ChannelBuilder<'_> {
        ChannelBuilder::new(self)
    }

    /// Returns the pause/resume coordinator.
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleCoordinator {
        LifecycleCoordinator::new(Arc::clone(&self.inner))
    }

    /// Returns the control facade.
    #[inline]
    #[must_use]
    pub fn control(&self) -> &ControlFacade {
        &self.inner.control
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConduitConfig {
        &self.inner.config
    }

    /// Returns the channel pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ChannelPool {
        &self.inner.pool
    }

    /// Returns the number of live channels.
    #[inline]
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.pool.len()
    }

    /// Returns `true` while the process is paused.
    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    /// Returns the process default port, 0 when unknown.
    #[inline]
    #[must_use]
    pub fn default_port(&self) -> u16 {
        self.inner.default_port()
    }

    /// Sets the process default port. Zero is ignored.
    pub fn set_default_port(&self, port: u16) {
        if port == 0 {
            return;
        }
        self.inner.default_port.store(port, Ordering::Release);
        debug!(port, "Default port set");
    }

    /// Closes every channel.
    ///
    /// Returns the number of channels closed.
    pub fn shutdown(&self) -> usize {
        let count = self.inner.pool.close_all();
        info!(count, "Conduit shut down");
        count
    }
}

// ============================================================================
// Conduit - Control
// ============================================================================

impl Conduit {
    /// Queries the host listener status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`](crate::Error::Control) if the query fails.
    pub async fn status(&self) -> Result<ConduitStatus> {
        self.inner.control.status().await
    }

    /// Polls status until the listener is active, honouring the configured
    /// poll budget.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`](crate::Error::NotReady) if the budget runs out
    /// - [`Error::Control`](crate::Error::Control) if a query fails
    pub async fn wait_for_active_state(&self) -> Result<ConduitStatus> {
        let status = self
            .inner
            .control
            .wait_for_active_state(self.inner.config.max_status_polls)
            .await?;
        self.set_default_port(status.port);
        Ok(status)
    }

    /// Reads the host shared key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`](crate::Error::Control) if the request fails.
    pub async fn shared_key(&self) -> Result<String> {
        self.inner.control.shared_key().await
    }

    /// Replaces the host shared key, returning the key now in effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`](crate::Error::Control) if the request fails.
    pub async fn set_shared_key(&self, shared_key: impl Into<String>) -> Result<String> {
        self.inner.control.set_shared_key(shared_key).await
    }

    /// Queries host-side handle counts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`](crate::Error::Control) if the query fails.
    pub async fn diagnostics(&self) -> Result<ConduitDiagnostics> {
        self.inner.control.diagnostics().await
    }

    /// Stops the host listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`](crate::Error::Control) if the request fails.
    pub async fn stop(&self) -> Result<()> {
        self.inner.control.stop().await
    }
}

// ============================================================================
// ChannelBuilder
// ============================================================================

/// Builder for conduit channels.
///
/// # Example
///
/// ```no_run
/// # use runtime_conduit::Conduit;
/// # async fn example(conduit: &Conduit) -> runtime_conduit::Result<()> {
/// let channel = conduit.channel()
///     .id("7")
///     .shared_key("abc")
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ChannelBuilder<'a> {
    /// Owning conduit.
    conduit: &'a Conduit,
    /// Channel id.
    id: String,
    /// Shared key override.
    shared_key: Option<String>,
}

impl<'a> ChannelBuilder<'a> {
    /// Creates a new channel builder.
    pub(crate) fn new(conduit: &'a Conduit) -> Self {
        Self {
            conduit,
            id: DEFAULT_CHANNEL_ID.to_string(),
            shared_key: None,
        }
    }

    /// Sets the channel id. Defaults to `"0"`.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the shared key. Defaults to the conduit's key.
    #[must_use]
    pub fn shared_key(mut self, shared_key: impl Into<String>) -> Self {
        self.shared_key = Some(shared_key.into());
        self
    }

    /// Creates and registers the channel without connecting.
    #[must_use]
    pub fn build(self) -> Channel {
        let shared_key = self
            .shared_key
            .unwrap_or_else(|| self.conduit.inner.config.shared_key.clone());

        Channel::new(Arc::clone(&self.conduit.inner), self.id, shared_key)
    }

    /// Creates the channel and starts connecting in the background.
    ///
    /// Failures are reported through the channel's error events and logged.
    #[must_use]
    pub fn open(self) -> Channel {
        let channel = self.build();
        channel.spawn_connect();
        channel
    }

    /// Creates the channel and waits for it to connect.
    ///
    /// A channel that fails to connect is closed.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Channel::connect`] returns.
    pub async fn connect(self) -> Result<Channel> {
        let channel = self.build();

        if let Err(e) = channel.connect().await {
            warn!(channel = %channel.id(), error = %e, "Channel failed to connect");
            channel.close();
            return Err(e);
        }

        Ok(channel)
    }
}

// ============================================================================
// Tests
// ============================================================================
