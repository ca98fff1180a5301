//! WebSocket transport layer.
//!
//! This module handles the client side of the conduit: channels that dial
//! the host listener, the socket task behind each of them, and the pool the
//! lifecycle sweeps walk.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Channel        │                              │  Host           │
//! │                 │         WebSocket            │                 │
//! │  Socket         │─────────────────────────────►│  Conduit        │
//! │  → event loop   │  localhost:PORT/id/client    │  listener       │
//! │                 │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `internal.conduit.start` - Ask the host to start its listener
//! 2. `internal.conduit.status` - Poll until the listener is active
//! 3. `connect_async` - Open the socket
//! 4. `Socket` - Send frames, receive frames
//! 5. Host close - Reconnect with the default retry budget
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Channel state machine |
//! | `connection` | Socket handle and event loop |
//! | `event` | Channel events and listeners |
//! | `pool` | Registry of live channels |

// ============================================================================
// Submodules
// ============================================================================

/// Channel state machine.
pub mod channel;

/// Socket handle and event loop.
pub(crate) mod connection;

/// Channel events and listeners.
pub mod event;

/// Registry of live channels.
pub mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{Channel, DEFAULT_CHANNEL_ID, socket_url};
pub use event::{ChannelEvent, EventHandler, EventKind};
pub use pool::ChannelPool;
