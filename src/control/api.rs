//! Control API seam.
//!
//! The conduit never talks to the host's request/response RPC layer
//! directly. It issues [`ControlCommand`]s through a [`ControlApi`]
//! implementation supplied by the embedding application.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;

// ============================================================================
// ControlCommand
// ============================================================================

/// Requests the conduit sends to the host's control API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ControlCommand {
    /// Start the host-side listener if it is not running.
    #[serde(rename = "internal.conduit.start")]
    Start,

    /// Stop the host-side listener.
    #[serde(rename = "internal.conduit.stop")]
    Stop,

    /// Query listener port, activity and shared key.
    #[serde(rename = "internal.conduit.status")]
    Status,

    /// Read the shared key.
    #[serde(rename = "internal.conduit.getSharedKey")]
    GetSharedKey,

    /// Replace the shared key.
    #[serde(rename = "internal.conduit.setSharedKey")]
    SetSharedKey {
        /// New key.
        #[serde(rename = "sharedKey")]
        shared_key: String,
    },

    /// Runtime diagnostics query; the conduit reads its `conduit` member.
    #[serde(rename = "diagnostics.query")]
    Diagnostics,
}

impl ControlCommand {
    /// Returns the RPC method name.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Start => "internal.conduit.start",
            Self::Stop => "internal.conduit.stop",
            Self::Status => "internal.conduit.status",
            Self::GetSharedKey => "internal.conduit.getSharedKey",
            Self::SetSharedKey { .. } => "internal.conduit.setSharedKey",
            Self::Diagnostics => "diagnostics.query",
        }
    }

    /// Returns the request parameters, `null` when there are none.
    #[must_use]
    pub fn params(&self) -> Value {
        match self {
            Self::SetSharedKey { shared_key } => json!({ "sharedKey": shared_key }),
            _ => Value::Null,
        }
    }
}

// ============================================================================
// ControlApi
// ============================================================================

/// Request/response access to the host's control API.
///
/// Implementations resolve with the reply's `data` member and map a
/// host-reported error to [`Error::Control`](crate::Error::Control).
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Sends `command` and waits for its reply.
    async fn request(&self, command: &ControlCommand) -> Result<Value>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_match_serde() {
        let commands = [
            ControlCommand::Start,
            ControlCommand::Stop,
            ControlCommand::Status,
            ControlCommand::GetSharedKey,
            ControlCommand::SetSharedKey {
                shared_key: "k".into(),
            },
            ControlCommand::Diagnostics,
        ];

        for command in commands {
            let json = serde_json::to_value(&command).unwrap();
            assert_eq!(json["method"], command.method());
        }
    }

    #[test]
    fn test_params() {
        assert_eq!(ControlCommand::Status.params(), Value::Null);

        let command = ControlCommand::SetSharedKey {
            shared_key: "secret".into(),
        };
        assert_eq!(command.params(), json!({ "sharedKey": "secret" }));

        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["params"], command.params());
    }
}
