//! Typed wrappers over the control API.
//!
//! [`ControlFacade`] holds no conduit state of its own. Each method is one
//! request/response round trip, except the readiness wait which polls the
//! status request on a fixed interval.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::api::{ControlApi, ControlCommand};
use super::types::{ConduitDiagnostics, ConduitStatus, SharedKeyReply, StartReply};

// ============================================================================
// Constants
// ============================================================================

/// Default delay between readiness polls.
pub const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_millis(256);

// ============================================================================
// ControlFacade
// ============================================================================

/// Conduit operations layered on a [`ControlApi`].
#[derive(Clone)]
pub struct ControlFacade {
    /// Underlying RPC access.
    api: Arc<dyn ControlApi>,
    /// Delay between readiness polls.
    poll_interval: Duration,
}

impl fmt::Debug for ControlFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlFacade")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl ControlFacade {
    /// Creates a facade over `api`.
    #[must_use]
    pub fn new(api: Arc<dyn ControlApi>, poll_interval: Duration) -> Self {
        Self { api, poll_interval }
    }

    /// Returns the delay between readiness polls.
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Asks the host to start its listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`] if the host refuses or replies malformed.
    pub async fn start(&self) -> Result<StartReply> {
        self.call(ControlCommand::Start).await
    }

    /// Asks the host to stop its listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`] if the host refuses.
    pub async fn stop(&self) -> Result<()> {
        self.api.request(&ControlCommand::Stop).await.map(drop)
    }

    /// Queries the listener status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`] if the host refuses or replies malformed.
    pub async fn status(&self) -> Result<ConduitStatus> {
        self.call(ControlCommand::Status).await
    }

    /// Polls [`status`](Self::status) until the listener is active.
    ///
    /// `max_polls` of `None` waits forever.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] if the poll budget runs out
    /// - [`Error::Control`] if a status query fails
    pub async fn wait_for_active_state(&self, max_polls: Option<u32>) -> Result<ConduitStatus> {
        self.poll_until_active(max_polls, || false).await
    }

    /// Readiness wait that gives up with [`Error::Cancelled`] as soon as
    /// `cancelled` returns `true` between polls.
    pub(crate) async fn poll_until_active(
        &self,
        max_polls: Option<u32>,
        cancelled: impl Fn() -> bool,
    ) -> Result<ConduitStatus> {
        let mut polls = 0u32;

        while max_polls.is_none_or(|max| polls < max) {
            if cancelled() {
                return Err(Error::Cancelled);
            }

            polls = polls.saturating_add(1);
            let status = self.status().await?;

            if status.is_active {
                debug!(polls, port = status.port, "Conduit listener active");
                return Ok(status);
            }

            trace!(polls, "Conduit listener not active yet");
            sleep(self.poll_interval).await;
        }

        Err(Error::not_ready(polls))
    }

    /// Reads the shared key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`] if the host refuses or replies malformed.
    pub async fn shared_key(&self) -> Result<String> {
        let reply: SharedKeyReply = self.call(ControlCommand::GetSharedKey).await?;
        Ok(reply.shared_key)
    }

    /// Replaces the shared key, returning the key now in effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`] if the host refuses or replies malformed.
    pub async fn set_shared_key(&self, shared_key: impl Into<String>) -> Result<String> {
        let command = ControlCommand::SetSharedKey {
            shared_key: shared_key.into(),
        };
        let reply: SharedKeyReply = self.call(command).await?;
        Ok(reply.shared_key)
    }

    /// Queries host-side handle counts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`] if the host refuses or replies malformed.
    pub async fn diagnostics(&self) -> Result<ConduitDiagnostics> {
        let command = ControlCommand::Diagnostics;
        let mut reply = self.api.request(&command).await?;
        let conduit = reply
            .get_mut("conduit")
            .map(Value::take)
            .unwrap_or(Value::Null);

        if conduit.is_null() {
            return Ok(ConduitDiagnostics::default());
        }

        Self::parse(&command, conduit)
    }

    /// Sends `command` and deserializes its reply.
    async fn call<T: DeserializeOwned>(&self, command: ControlCommand) -> Result<T> {
        let reply = self.api.request(&command).await?;
        trace!(method = command.method(), "Control reply received");
        Self::parse(&command, reply)
    }

    fn parse<T: DeserializeOwned>(command: &ControlCommand, value: Value) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| Error::control(command.method(), format!("malformed reply: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::testing::ScriptedControl;

    fn facade(control: &Arc<ScriptedControl>) -> ControlFacade {
        ControlFacade::new(
            Arc::clone(control) as Arc<dyn ControlApi>,
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_status() {
        let control = ScriptedControl::active(4242);
        let status = facade(&control).status().await.unwrap();
        assert_eq!(status.port, 4242);
        assert!(status.is_active);
    }

    #[tokio::test]
    async fn test_wait_for_active_state_polls_until_active() {
        let control = ScriptedControl::active(4242);
        control.set_inactive_polls(3);

        let status = facade(&control).wait_for_active_state(None).await.unwrap();
        assert!(status.is_active);
        assert_eq!(control.calls(&ControlCommand::Status), 4);
    }

    #[tokio::test]
    async fn test_wait_for_active_state_budget() {
        let control = ScriptedControl::active(4242);
        control.set_inactive_polls(10);

        let err = facade(&control)
            .wait_for_active_state(Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotReady { polls: 2 }));
        assert_eq!(control.calls(&ControlCommand::Status), 2);
    }

    #[tokio::test]
    async fn test_poll_cancelled() {
        let control = ScriptedControl::active(4242);
        let err = facade(&control)
            .poll_until_active(None, || true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(control.calls(&ControlCommand::Status), 0);
    }

    #[tokio::test]
    async fn test_shared_key_round_trip() {
        let control = ScriptedControl::active(1);
        let facade = facade(&control);

        assert_eq!(facade.set_shared_key("abc12345").await.unwrap(), "abc12345");
        assert_eq!(facade.shared_key().await.unwrap(), "abc12345");
    }

    #[tokio::test]
    async fn test_start_failure() {
        let control = ScriptedControl::active(1);
        control.fail_starts(1);

        let err = facade(&control).start().await.unwrap_err();
        assert!(matches!(err, Error::Control { .. }));
    }

    #[tokio::test]
    async fn test_diagnostics() {
        let control = ScriptedControl::active(1);
        control.set_diagnostics(json!({
            "conduit": { "isActive": true, "handles": { "ids": ["7"], "count": 1 } }
        }));

        let diagnostics = facade(&control).diagnostics().await.unwrap();
        assert!(diagnostics.is_active);
        assert_eq!(diagnostics.handles.count, 1);
    }

    #[tokio::test]
    async fn test_malformed_reply() {
        let control = ScriptedControl::active(1);
        control.set_diagnostics(json!({ "conduit": { "isActive": "yes" } }));

        let err = facade(&control).diagnostics().await.unwrap_err();
        assert!(matches!(err, Error::Control { .. }));
    }
}
