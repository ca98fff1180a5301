//! Registry of live channels.
//!
//! Every channel registers itself on creation and leaves on
//! [`Channel::close`] or when its last handle is dropped. The pool is what
//! the lifecycle sweeps walk on pause and resume.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             ChannelPool                 │
//! │  ┌─────────────────────────────────┐    │
//! │  │ ChannelKey=1 → Weak<channel 1>  │    │
//! │  │ ChannelKey=2 → Weak<channel 2>  │    │
//! │  │ ChannelKey=3 → Weak<channel 3>  │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Entries are weak, so the pool never keeps an abandoned channel alive.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::identifiers::ChannelKey;
use crate::runtime::ReconnectOptions;

use super::channel::{Channel, ChannelInner};

// ============================================================================
// ChannelPool
// ============================================================================

/// Live channels keyed by [`ChannelKey`].
#[derive(Default)]
pub struct ChannelPool {
    /// Registered channels.
    channels: RwLock<FxHashMap<ChannelKey, Weak<ChannelInner>>>,
}

impl fmt::Debug for ChannelPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPool")
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// ChannelPool - Registry
// ============================================================================

impl ChannelPool {
    /// Registers a channel.
    pub(crate) fn insert(&self, channel: &Channel) {
        self.channels
            .write()
            .insert(channel.key(), Arc::downgrade(&channel.inner));
    }

    /// Unregisters a channel. Returns `true` if it was registered.
    pub(crate) fn remove(&self, key: ChannelKey) -> bool {
        self.channels.write().remove(&key).is_some()
    }

    /// Drops the entry of a channel that is being destroyed.
    pub(crate) fn forget(&self, key: ChannelKey) {
        if self.remove(key) {
            debug!(key = %key, "Channel dropped without close");
        }
    }

    /// Returns `true` if a live channel is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: ChannelKey) -> bool {
        self.channels
            .read()
            .get(&key)
            .is_some_and(|channel| channel.strong_count() > 0)
    }

    /// Returns the number of live channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels
            .read()
            .values()
            .filter(|channel| channel.strong_count() > 0)
            .count()
    }

    /// Returns `true` if no live channel is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns handles to every live channel.
    #[must_use]
    pub fn channels(&self) -> Vec<Channel> {
        let inners: Vec<Arc<ChannelInner>> = self
            .channels
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        // Handles are built outside the lock so a last-reference drop
        // cannot re-enter the pool while it is locked.
        inners.into_iter().map(|inner| Channel { inner }).collect()
    }
}

// ============================================================================
// ChannelPool - Sweeps
// ============================================================================

impl ChannelPool {
    /// Drops the socket of every channel. Returns the number swept.
    pub(crate) fn suspend_all(&self) -> usize {
        let channels = self.channels();

        for channel in &channels {
            channel.suspend();
        }

        info!(count = channels.len(), "Channels suspended");
        channels.len()
    }

    /// Reconnects every channel that still wants to, and removes the rest.
    ///
    /// Returns the number of channels a reconnect was requested for.
    pub(crate) fn resume_all(&self, options: ReconnectOptions) -> usize {
        self.channels
            .write()
            .retain(|_, channel| channel.strong_count() > 0);

        let mut resumed = 0;

        for channel in self.channels() {
            if channel.should_reconnect() {
                channel.resume(options);
                resumed += 1;
            } else {
                self.remove(channel.key());
            }
        }

        info!(count = resumed, "Channels resumed");
        resumed
    }

    /// Closes every channel. Returns the number closed.
    pub(crate) fn close_all(&self) -> usize {
        let channels = self.channels();

        for channel in &channels {
            channel.close();
        }

        channels.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::control::ControlCommand;
    use crate::testing::{ScriptedControl, conduit};

    #[tokio::test]
    async fn test_registry() {
        let control = ScriptedControl::active(1);
        let conduit = conduit(&control);
        let pool = conduit.pool();

        let first = conduit.channel().build();
        let second = conduit.channel().id("2").build();
        assert_eq!(pool.len(), 2);
        assert!(pool.contains(first.key()));

        first.close();
        assert!(!pool.contains(first.key()));
        assert_eq!(pool.channels().len(), 1);
        assert_eq!(pool.channels()[0].key(), second.key());
    }

    #[tokio::test]
    async fn test_suspend_all_invalidates_attempts() {
        let control = ScriptedControl::active(1);
        control.set_inactive_polls(u32::MAX);
        let conduit = conduit(&control);
        let channel = conduit.channel().build();

        let pending = tokio::spawn({
            let channel = channel.clone();
            async move { channel.connect().await }
        });
        while !channel.is_connecting() {
            tokio::task::yield_now().await;
        }

        assert_eq!(conduit.pool().suspend_all(), 1);
        assert!(!channel.is_connecting());

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(crate::Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_resume_all_skips_closed_channels() {
        let control = ScriptedControl::active(1);
        control.fail_starts(u32::MAX);
        let conduit = conduit(&control);
        let open = conduit.channel().build();
        let closed = conduit.channel().build();

        // Closed but still registered, as if close raced the sweep.
        closed.close();
        conduit.pool().insert(&closed);

        let resumed = conduit
            .pool()
            .resume_all(ReconnectOptions::new(0, Duration::from_millis(1)));
        assert_eq!(resumed, 1);
        assert!(!conduit.pool().contains(closed.key()));
        assert!(conduit.pool().contains(open.key()));

        tokio::time::timeout(Duration::from_secs(5), async {
            while control.calls(&ControlCommand::Start) < 1 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
    }
}
