//! Runtime Conduit - framed duplex channels to a host control process.
//!
//! This library lets application code exchange binary messages with a host
//! process over a loopback WebSocket, without going through the host's
//! request/response RPC layer.
//!
//! # Architecture
//!
//! The conduit follows a client-listener model:
//!
//! - **Host**: runs the conduit listener, started and polled through the
//!   control API ([`ControlApi`])
//! - **Client (Rust)**: opens one socket per [`Channel`], sends and receives
//!   framed [`Message`]s
//!
//! Key design principles:
//!
//! - Each [`Channel`] owns: one socket + its event loop task
//! - Frames carry a small option header and a binary payload
//! - Host-side disconnects trigger bounded fixed-delay reconnects
//! - Application pause drops every socket; resume reconnects them
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use runtime_conduit::{Conduit, ControlApi, Message, Result};
//!
//! async fn run(api: Arc<dyn ControlApi>) -> Result<()> {
//!     let conduit = Conduit::builder()
//!         .control(api)
//!         .client_id("top")
//!         .shared_key("abc")
//!         .build()?;
//!
//!     let channel = conduit.channel().id("7").connect().await?;
//!
//!     channel.receive(|message| match message {
//!         Ok(message) => println!("received {} bytes", message.payload.len()),
//!         Err(e) => eprintln!("channel error: {e}"),
//!     });
//!
//!     channel.send_message(&Message::new().with_option("type", "ping"));
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`control`] | Control API seam and typed operations |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frame format and message types |
//! | [`runtime`] | [`Conduit`], configuration and lifecycle |
//! | [`transport`] | Channels, sockets and the channel pool |

// ============================================================================
// Modules
// ============================================================================

/// Host control API access.
///
/// Implement [`ControlApi`] over your RPC layer to plug the conduit in.
pub mod control;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for conduit entities.
pub mod identifiers;

/// Frame format and message types.
pub mod protocol;

/// Conduit ownership, configuration and lifecycle.
///
/// Use [`Conduit::builder()`] to create a configured conduit.
pub mod runtime;

/// WebSocket transport layer.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Control types
pub use control::{
    ConduitDiagnostics, ConduitStatus, ControlApi, ControlCommand, ControlFacade,
    HandleDiagnostics, StartReply,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ChannelKey, ListenerId};

// Protocol types
pub use protocol::{Message, OptionValue, Options, decode_message, encode_message};

// Runtime types
pub use runtime::{
    ChannelBuilder, Conduit, ConduitBuilder, ConduitConfig, LifecycleCallback,
    LifecycleCoordinator, LifecycleHooks, ReconnectOptions,
};

// Transport types
pub use transport::{Channel, ChannelEvent, ChannelPool, EventHandler, EventKind};
