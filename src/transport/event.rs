//! Channel events and listener registry.
//!
//! Each channel reports four kinds of events: `open`, `message`, `error`
//! and `close`. Listeners subscribe per kind and are called in
//! registration order. Slot handlers (`on_open` and friends) hold at most
//! one handler per kind and replace it on every assignment.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::identifiers::ListenerId;

// ============================================================================
// Types
// ============================================================================

/// Event listener callback.
pub type EventHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

// ============================================================================
// EventKind
// ============================================================================

/// The four observable channel events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Socket opened.
    Open,
    /// Frame received.
    Message,
    /// Socket or connect error.
    Error,
    /// Socket closed.
    Close,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Error => "error",
            Self::Close => "close",
        })
    }
}

// ============================================================================
// ChannelEvent
// ============================================================================

/// An event emitted by a channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The socket is open and the channel is active.
    Open,
    /// A raw frame arrived. Decode it with
    /// [`Message::decode`](crate::Message::decode).
    Message(Arc<[u8]>),
    /// Connecting failed or the socket reported an error.
    Error(Arc<Error>),
    /// The socket closed.
    Close,
}

impl ChannelEvent {
    /// Returns the kind of this event.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Error(_) => EventKind::Error,
            Self::Close => EventKind::Close,
        }
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// One registered listener.
struct Listener {
    id: ListenerId,
    kind: EventKind,
    handler: EventHandler,
}

/// Per-channel listener registry.
#[derive(Default)]
pub(crate) struct Listeners {
    /// Subscribed listeners in registration order.
    entries: Mutex<Vec<Listener>>,
    /// Slot handler id per kind.
    slots: Mutex<FxHashMap<EventKind, ListenerId>>,
}

impl Listeners {
    /// Registers `handler` for events of `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> ListenerId {
        let id = ListenerId::next();
        self.entries.lock().push(Listener { id, kind, handler });
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|listener| listener.id != id);
        entries.len() != before
    }

    /// Replaces the slot handler for `kind`; `None` clears it.
    pub fn set_slot(&self, kind: EventKind, handler: Option<EventHandler>) {
        let mut slots = self.slots.lock();

        if let Some(previous) = slots.remove(&kind) {
            self.unsubscribe(previous);
        }

        if let Some(handler) = handler {
            slots.insert(kind, self.subscribe(kind, handler));
        }
    }

    /// Returns the number of listeners for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|listener| listener.kind == kind)
            .count()
    }

    /// Calls every listener for the event's kind.
    ///
    /// Handlers run after the registry lock is released, so they may
    /// subscribe or unsubscribe.
    pub fn emit(&self, event: &ChannelEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .entries
            .lock()
            .iter()
            .filter(|listener| listener.kind == kind)
            .map(|listener| Arc::clone(&listener.handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
