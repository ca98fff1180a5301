//! Control API reply types.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// ConduitStatus
// ============================================================================

/// Host-side listener status.
///
/// Missing fields default to "not running": port 0, inactive, no key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConduitStatus {
    /// Listener port, 0 when unknown.
    #[serde(default)]
    pub port: u16,

    /// Whether the listener accepts connections.
    #[serde(default)]
    pub is_active: bool,

    /// Current shared key.
    #[serde(default)]
    pub shared_key: Option<String>,
}

// ============================================================================
// StartReply
// ============================================================================

/// Reply to `internal.conduit.start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReply {
    /// Port the listener was started on.
    #[serde(default)]
    pub port: u16,
}

// ============================================================================
// SharedKeyReply
// ============================================================================

/// Reply to the shared-key get/set requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SharedKeyReply {
    /// The key now in effect.
    #[serde(default)]
    pub shared_key: String,
}

// ============================================================================
// ConduitDiagnostics
// ============================================================================

/// Host-reported conduit handle counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConduitDiagnostics {
    /// Whether the listener is running.
    #[serde(default)]
    pub is_active: bool,

    /// Connected client handles.
    #[serde(default)]
    pub handles: HandleDiagnostics,
}

/// Connected client handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleDiagnostics {
    /// Client ids. The host may report them as numbers or strings.
    #[serde(default, deserialize_with = "ids_as_strings")]
    pub ids: Vec<String>,

    /// Number of connected clients.
    #[serde(default)]
    pub count: usize,
}

fn ids_as_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{from_value, json};

    #[test]
    fn test_status_defaults() {
        let status: ConduitStatus = from_value(json!({})).unwrap();
        assert_eq!(status, ConduitStatus::default());
        assert_eq!(status.port, 0);
        assert!(!status.is_active);
    }

    #[test]
    fn test_status_camel_case() {
        let status: ConduitStatus =
            from_value(json!({ "port": 4242, "isActive": true, "sharedKey": "abc" })).unwrap();
        assert_eq!(status.port, 4242);
        assert!(status.is_active);
        assert_eq!(status.shared_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_diagnostics_numeric_ids() {
        let diagnostics: ConduitDiagnostics = from_value(json!({
            "isActive": true,
            "handles": { "ids": [12, "34"], "count": 2 }
        }))
        .unwrap();

        assert!(diagnostics.is_active);
        assert_eq!(diagnostics.handles.ids, vec!["12", "34"]);
        assert_eq!(diagnostics.handles.count, 2);
    }
}
