//! Error types for the conduit.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use runtime_conduit::{Channel, Result};
//!
//! async fn example(channel: &Channel) -> Result<()> {
//!     channel.connect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Framing | [`Error::Encode`], [`Error::Decode`] |
//! | Control API | [`Error::Control`], [`Error::NotReady`] |
//! | Connection | [`Error::Connection`], [`Error::AlreadyConnecting`], [`Error::Cancelled`] |
//! | Lifecycle | [`Error::Paused`], [`Error::ChannelClosed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when conduit configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// A message violates the wire size limits.
    #[error("Encode error: {message}")]
    Encode {
        /// Which limit was exceeded.
        message: String,
    },

    /// A frame could not be decoded.
    ///
    /// Returned for truncated or otherwise malformed buffers.
    #[error("Decode error at offset {offset}: {message}")]
    Decode {
        /// Byte offset where decoding failed.
        offset: usize,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Control API Errors
    // ========================================================================
    /// The control API rejected a request.
    #[error("Control request {method} failed: {message}")]
    Control {
        /// Control method that failed.
        method: String,
        /// Error reported by the host.
        message: String,
    },

    /// Host listener did not become active within the poll budget.
    #[error("Conduit not active after {polls} status polls")]
    NotReady {
        /// Number of status polls performed.
        polls: u32,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// A connect attempt is already in flight for this channel.
    #[error("Channel is already connecting")]
    AlreadyConnecting,

    /// The connect attempt was superseded by pause, close or a newer attempt.
    #[error("Connect attempt cancelled")]
    Cancelled,

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The application is paused; no I/O is attempted.
    #[error("Application is paused")]
    Paused,

    /// The channel was explicitly closed.
    #[error("Channel closed")]
    ChannelClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an encode error.
    #[inline]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a decode error at the given offset.
    #[inline]
    pub fn decode(offset: usize, message: impl Into<String>) -> Self {
        Self::Decode {
            offset,
            message: message.into(),
        }
    }

    /// Creates a control API error.
    #[inline]
    pub fn control(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Control {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates a not-ready error.
    #[inline]
    pub fn not_ready(polls: u32) -> Self {
        Self::NotReady { polls }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::AlreadyConnecting
                | Self::Cancelled
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a frame decode error.
    #[inline]
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry; the reconnect loop keeps
    /// spending its budget on them and stops on everything else.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Control { .. }
                | Self::NotReady { .. }
                | Self::Connection { .. }
                | Self::Io(_)
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
