//! Conduit ownership, configuration and lifecycle.
//!
//! [`Conduit`] replaces process-wide globals: it owns the channel pool, the
//! paused flag and the default port, and several independent instances can
//! coexist (one per test, for example).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use runtime_conduit::{Conduit, ControlApi};
//!
//! # async fn example(api: Arc<dyn ControlApi>) -> runtime_conduit::Result<()> {
//! let conduit = Conduit::builder().control(api).client_id("top").build()?;
//!
//! let channel = conduit.channel().open();
//! conduit.lifecycle().pause();
//! conduit.lifecycle().resume();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for conduit configuration.
pub mod builder;

/// Conduit settings and reconnect options.
pub mod config;

/// Conduit owner and channel factory.
pub mod core;

/// Pause/resume coordination.
pub mod lifecycle;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{ConduitBuilder, ENV_CLIENT_ID, ENV_PORT, ENV_SHARED_KEY};
pub use config::{
    ConduitConfig, DEFAULT_RECONNECT_RETRIES, DEFAULT_RECONNECT_TIMEOUT, ReconnectOptions,
};
pub use self::core::{ChannelBuilder, Conduit};
pub use lifecycle::{LifecycleCallback, LifecycleCoordinator, LifecycleHooks};
