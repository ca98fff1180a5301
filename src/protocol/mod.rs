//! Conduit wire protocol.
//!
//! Every WebSocket binary frame carries exactly one [`Message`]: a set of
//! string-keyed options followed by a length-prefixed payload.
//!
//! # Frame Limits
//!
//! | Field | Width | Limit |
//! |-------|-------|-------|
//! | option count | `u8` | 255 |
//! | key length | `u8` | 255 bytes |
//! | value length | `u16` BE | 65535 bytes |
//! | payload length | `u16` BE | 65535 bytes |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Frame encoding and bounds-checked decoding |
//! | `message` | [`Message`] and [`OptionValue`] types |

// ============================================================================
// Submodules
// ============================================================================

/// Frame encoding and decoding.
pub mod codec;

/// Message and option value types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{
    MAX_KEY_LEN, MAX_OPTIONS, MAX_PAYLOAD_LEN, MAX_VALUE_LEN, decode_message, encode_message,
};
pub use message::{Message, OptionValue, Options};
