//! Conduit channel state machine.
//!
//! A [`Channel`] owns at most one socket to the host conduit listener.
//! Connecting runs the three-step sequence
//!
//! 1. `internal.conduit.start` on the control API
//! 2. status polling until the listener reports active
//! 3. opening `ws://localhost:{port}/{id}/{client}?key={key}`
//!
//! and the resulting socket is kept open until the channel is closed, the
//! process is paused, or the host drops it. A host-side close schedules a
//! reconnect with the conduit's default retry budget.
//!
//! Every connect attempt is numbered. Pausing, closing or starting another
//! connect bumps the number, and an attempt that finds itself outdated at
//! one of its suspension points gives up instead of installing its socket.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{ChannelKey, ListenerId};
use crate::protocol::{Message, Options, encode_message};
use crate::runtime::ReconnectOptions;
use crate::runtime::core::ConduitShared;

use super::connection::{Socket, SocketObserver, WsStream};
use super::event::{ChannelEvent, EventHandler, EventKind, Listeners};

// ============================================================================
// Constants
// ============================================================================

/// Channel id used when none is given.
pub const DEFAULT_CHANNEL_ID: &str = "0";

// ============================================================================
// Socket URL
// ============================================================================

/// Builds the socket URL for a channel.
///
/// Path segments and the key are percent-encoded.
#[must_use]
pub fn socket_url(port: u16, id: &str, client_id: &str, shared_key: &str) -> String {
    format!(
        "ws://localhost:{port}/{}/{}?key={}",
        urlencoding::encode(id),
        urlencoding::encode(client_id),
        urlencoding::encode(shared_key)
    )
}

// ============================================================================
// ChannelState
// ============================================================================

/// Mutable channel state, guarded by one lock.
struct ChannelState {
    /// Last known listener port.
    port: u16,
    /// A connect attempt is in flight.
    is_connecting: bool,
    /// The socket is open and usable.
    is_active: bool,
    /// Cleared by [`Channel::close`]; never set again.
    should_reconnect: bool,
    /// The current socket, if any.
    socket: Option<Socket>,
    /// Number of the newest connect attempt.
    attempt: u64,
    /// Serial handed to the next socket.
    next_serial: u64,
}

impl ChannelState {
    fn owns(&self, serial: u64) -> bool {
        self.socket.as_ref().is_some_and(|socket| socket.serial() == serial)
    }
}

// ============================================================================
// ChannelInner
// ============================================================================

/// Shared channel data behind every [`Channel`] handle.
pub(crate) struct ChannelInner {
    /// Self reference for spawning tasks from observer callbacks.
    this: Weak<ChannelInner>,
    /// Pool identity.
    key: ChannelKey,
    /// Channel id, the first URL path segment.
    id: String,
    /// Key sent in the URL query.
    shared_key: String,
    /// Owning conduit.
    conduit: Arc<ConduitShared>,
    /// Event listeners.
    listeners: Listeners,
    /// Connection state.
    state: Mutex<ChannelState>,
}

impl ChannelInner {
    /// Checks that `attempt` is still the one the channel is waiting for.
    fn ensure_current(&self, attempt: u64) -> Result<()> {
        let state = self.state.lock();

        if !state.should_reconnect {
            Err(Error::ChannelClosed)
        } else if self.conduit.is_paused() {
            Err(Error::Paused)
        } else if state.attempt != attempt {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    #[inline]
    fn is_current(&self, attempt: u64) -> bool {
        self.ensure_current(attempt).is_ok()
    }

    /// Clears the connecting flags if `attempt` is still current.
    fn end_attempt(&self, attempt: u64) -> bool {
        let mut state = self.state.lock();

        if state.attempt != attempt {
            return false;
        }

        state.is_connecting = false;
        state.is_active = false;
        true
    }

    /// Installs a freshly opened stream as the channel socket.
    fn attach(&self, attempt: u64, stream: WsStream) -> Result<()> {
        let (serial, port, driver) = {
            let mut state = self.state.lock();

            if state.attempt != attempt || !state.should_reconnect || self.conduit.is_paused() {
                drop(state);
                // The unused stream is dropped on return.
                return Err(self.ensure_current(attempt).err().unwrap_or(Error::Cancelled));
            }

            state.next_serial += 1;
            let serial = state.next_serial;
            let (socket, driver) = Socket::pair(serial);

            state.socket = Some(socket);
            state.is_active = true;
            state.is_connecting = false;
            (serial, state.port, driver)
        };

        info!(channel = %self.id, port, serial, "Channel open");
        self.listeners.emit(&ChannelEvent::Open);

        let observer: Weak<dyn SocketObserver> = self.this.clone();
        driver.spawn(&self.conduit.runtime, stream, observer);
        Ok(())
    }

    /// Reports a socket that failed to open.
    fn fail_open(&self, attempt: u64, error: Error) -> Error {
        if !self.end_attempt(attempt) {
            return self.ensure_current(attempt).err().unwrap_or(Error::Cancelled);
        }

        warn!(channel = %self.id, error = %error, "Failed to open socket");
        let message = error.to_string();
        self.listeners.emit(&ChannelEvent::Error(Arc::new(error)));

        if self.conduit.is_paused() {
            Error::Paused
        } else {
            Error::connection(message)
        }
    }

    /// Starts a reconnect loop unless a connect is already in flight.
    fn schedule_reconnect(&self, options: ReconnectOptions) -> Option<JoinHandle<()>> {
        if self.state.lock().is_connecting {
            trace!(channel = %self.id, "Reconnect skipped, already connecting");
            return None;
        }

        debug!(channel = %self.id, retries = options.retries, "Reconnect scheduled");
        Some(
            self.conduit
                .runtime
                .spawn(reconnect_loop(self.this.clone(), options)),
        )
    }

    /// Drops the socket and invalidates any attempt in flight.
    fn suspend(&self) {
        let socket = {
            let mut state = self.state.lock();
            state.is_connecting = false;
            state.is_active = false;
            state.attempt += 1;
            state.socket.take()
        };

        if let Some(socket) = socket {
            debug!(channel = %self.id, serial = socket.serial(), "Socket suspended");
            socket.close();
        }
    }
}

impl SocketObserver for ChannelInner {
    fn on_frame(&self, serial: u64, frame: Arc<[u8]>) {
        {
            let mut state = self.state.lock();
            if !state.owns(serial) {
                return;
            }
            state.is_active = true;
            state.is_connecting = false;
        }

        self.listeners.emit(&ChannelEvent::Message(frame));
    }

    fn on_error(&self, serial: u64, error: Error) {
        {
            let mut state = self.state.lock();
            if !state.owns(serial) {
                return;
            }
            state.is_active = false;
            state.is_connecting = false;
        }

        self.listeners.emit(&ChannelEvent::Error(Arc::new(error)));
    }

    fn on_closed(&self, serial: u64) {
        let reconnect = {
            let mut state = self.state.lock();
            let current = state.owns(serial);

            if current {
                state.socket = None;
                state.is_active = false;
                state.is_connecting = false;
            }

            current && state.should_reconnect && !self.conduit.is_paused()
        };

        debug!(channel = %self.id, serial, reconnect, "Socket closed");
        self.listeners.emit(&ChannelEvent::Close);

        if reconnect {
            self.schedule_reconnect(self.conduit.config.reconnect);
        }
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        if let Some(socket) = self.state.get_mut().socket.take() {
            debug!(channel = %self.id, "Channel dropped while open, closing socket");
            socket.close();
        }

        self.conduit.pool.forget(self.key);
    }
}

// ============================================================================
// Reconnect Loop
// ============================================================================

/// Connects until success, a non-recoverable error, or the budget runs out.
///
/// Holds the channel weakly between attempts so an abandoned channel ends
/// the loop.
async fn reconnect_loop(channel: Weak<ChannelInner>, options: ReconnectOptions) {
    let mut retries = options.retries;

    loop {
        let Some(inner) = channel.upgrade() else {
            return;
        };
        let handle = Channel { inner };

        match handle.connect().await {
            Ok(()) => return,

            Err(e) if !e.is_recoverable() => {
                debug!(channel = %handle.id(), error = %e, "Reconnect stopped");
                return;
            }

            Err(e) => {
                if retries == 0 {
                    warn!(channel = %handle.id(), error = %e, "Reconnect attempts exhausted");
                    return;
                }

                debug!(channel = %handle.id(), retries, error = %e, "Reconnect attempt failed");
                retries -= 1;
            }
        }

        drop(handle);
        sleep(options.timeout).await;
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Handle to one conduit channel.
///
/// Cloning is cheap and every clone refers to the same channel. The
/// channel is closed by [`close`](Self::close); dropping the last handle
/// without closing only closes the socket on a best-effort basis.
#[derive(Clone)]
pub struct Channel {
    pub(crate) inner: Arc<ChannelInner>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Channel")
            .field("key", &self.inner.key)
            .field("id", &self.inner.id)
            .field("port", &state.port)
            .field("is_active", &state.is_active)
            .field("is_connecting", &state.is_connecting)
            .field("should_reconnect", &state.should_reconnect)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Channel - Construction
// ============================================================================

impl Channel {
    /// Creates a channel and registers it in the conduit pool.
    ///
    /// Does not connect.
    pub(crate) fn new(conduit: Arc<ConduitShared>, id: String, shared_key: String) -> Self {
        let port = conduit.default_port();
        let inner = Arc::new_cyclic(|this| ChannelInner {
            this: this.clone(),
            key: ChannelKey::next(),
            id,
            shared_key,
            conduit,
            listeners: Listeners::default(),
            state: Mutex::new(ChannelState {
                port,
                is_connecting: false,
                is_active: false,
                should_reconnect: true,
                socket: None,
                attempt: 0,
                next_serial: 0,
            }),
        });

        let channel = Self { inner };
        channel.inner.conduit.pool.insert(&channel);
        debug!(channel = %channel.inner.id, key = %channel.inner.key, "Channel created");
        channel
    }

    /// Connects in the background, logging a failure.
    pub(crate) fn spawn_connect(&self) {
        let channel = Arc::downgrade(&self.inner);

        self.inner.conduit.runtime.spawn(async move {
            let Some(inner) = channel.upgrade() else {
                return;
            };
            let handle = Channel { inner };

            if let Err(e) = handle.connect().await {
                warn!(channel = %handle.id(), error = %e, "Initial connect failed");
            }
        });
    }
}

// ============================================================================
// Channel - Accessors
// ============================================================================

impl Channel {
    /// Returns the pool key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> ChannelKey {
        self.inner.key
    }

    /// Returns the channel id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns the shared key sent when connecting.
    #[inline]
    #[must_use]
    pub fn shared_key(&self) -> &str {
        &self.inner.shared_key
    }

    /// Returns the last known listener port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.state.lock().port
    }

    /// Returns the socket URL for the current port.
    #[must_use]
    pub fn url(&self) -> String {
        socket_url(
            self.port(),
            &self.inner.id,
            &self.inner.conduit.config.client_id,
            &self.inner.shared_key,
        )
    }

    /// Returns `true` while the socket is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().is_active
    }

    /// Returns `true` while a connect attempt is in flight.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.inner.state.lock().is_connecting
    }

    /// Returns `false` once the channel has been closed.
    #[must_use]
    pub fn should_reconnect(&self) -> bool {
        self.inner.state.lock().should_reconnect
    }
}

// ============================================================================
// Channel - Connection
// ============================================================================

impl Channel {
    /// Connects to the host conduit listener.
    ///
    /// Any existing socket is closed first.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] if the channel was closed
    /// - [`Error::Paused`] if the process is paused
    /// - [`Error::AlreadyConnecting`] if another connect is in flight
    /// - [`Error::Control`] if a control request fails
    /// - [`Error::NotReady`] if the listener never reported active
    /// - [`Error::Connection`] if the socket failed to open
    /// - [`Error::Cancelled`] if a newer attempt, pause or close superseded this one
    pub async fn connect(&self) -> Result<()> {
        let (attempt, previous) = {
            let mut state = self.inner.state.lock();

            if !state.should_reconnect {
                return Err(Error::ChannelClosed);
            }
            if self.inner.conduit.is_paused() {
                return Err(Error::Paused);
            }
            if state.is_connecting {
                return Err(Error::AlreadyConnecting);
            }

            state.is_active = false;
            state.is_connecting = true;
            state.attempt += 1;
            (state.attempt, state.socket.take())
        };

        if let Some(socket) = previous {
            debug!(channel = %self.inner.id, serial = socket.serial(), "Replacing open socket");
            socket.close();
        }

        debug!(channel = %self.inner.id, attempt, "Connecting");

        let result = self.establish(attempt).await;
        if let Err(e) = &result {
            self.inner.end_attempt(attempt);
            debug!(channel = %self.inner.id, attempt, error = %e, "Connect attempt failed");
        }
        result
    }

    async fn establish(&self, attempt: u64) -> Result<()> {
        let inner = &self.inner;
        let conduit = &inner.conduit;

        let started = conduit.control.start().await;
        inner.ensure_current(attempt)?;
        let started = started?;

        let status = conduit
            .control
            .poll_until_active(conduit.config.max_status_polls, || !inner.is_current(attempt))
            .await;
        inner.ensure_current(attempt)?;
        let status = status?;

        let port = if status.port != 0 { status.port } else { started.port };
        inner.state.lock().port = port;

        let url = socket_url(port, &inner.id, &conduit.config.client_id, &inner.shared_key);
        let url = Url::parse(&url).map_err(|e| Error::config(format!("invalid socket url: {e}")))?;

        debug!(channel = %inner.id, port, attempt, "Opening socket");

        match connect_async(url.as_str()).await {
            Ok((stream, _)) => inner.attach(attempt, stream),
            Err(e) => Err(inner.fail_open(attempt, Error::WebSocket(e))),
        }
    }

    /// Reconnects with the conduit's default retry budget.
    ///
    /// Returns `None` when a connect is already in flight.
    pub fn reconnect(&self) -> Option<JoinHandle<()>> {
        self.inner
            .schedule_reconnect(self.inner.conduit.config.reconnect)
    }

    /// Reconnects, retrying recoverable failures up to `options.retries`
    /// times with `options.timeout` between attempts.
    ///
    /// Returns `None` when a connect is already in flight.
    pub fn reconnect_with(&self, options: ReconnectOptions) -> Option<JoinHandle<()>> {
        self.inner.schedule_reconnect(options)
    }

    /// Closes the channel for good.
    ///
    /// The socket is closed, pending attempts are abandoned, no reconnect
    /// happens afterwards and the channel leaves the pool. Idempotent.
    pub fn close(&self) {
        let socket = {
            let mut state = self.inner.state.lock();
            state.should_reconnect = false;
            state.is_connecting = false;
            state.is_active = false;
            state.attempt += 1;
            state.socket.take()
        };

        if let Some(socket) = socket {
            socket.close();
        }

        if self.inner.conduit.pool.remove(self.inner.key) {
            info!(channel = %self.inner.id, "Channel closed");
        }
    }

    /// Process pause: drop the socket without closing the channel.
    pub(crate) fn suspend(&self) {
        self.inner.suspend();
    }

    /// Schedules a reconnect for the resume sweep.
    pub(crate) fn resume(&self, options: ReconnectOptions) -> Option<JoinHandle<()>> {
        self.inner.schedule_reconnect(options)
    }
}

// ============================================================================
// Channel - Messaging
// ============================================================================

impl Channel {
    /// Encodes and sends one message.
    ///
    /// Returns `false` without sending when the process is paused, the
    /// channel is not active, or the message cannot be encoded.
    pub fn send(&self, options: &Options, payload: &[u8]) -> bool {
        if self.inner.conduit.is_paused() {
            return false;
        }

        let state = self.inner.state.lock();
        let Some(socket) = state
            .socket
            .as_ref()
            .filter(|socket| state.is_active && socket.is_open())
        else {
            return false;
        };

        match encode_message(options, payload) {
            Ok(frame) => socket.send(frame),
            Err(e) => {
                warn!(channel = %self.inner.id, error = %e, "Dropping unencodable message");
                false
            }
        }
    }

    /// Sends a [`Message`]. See [`send`](Self::send).
    pub fn send_message(&self, message: &Message) -> bool {
        self.send(&message.options, &message.payload)
    }

    /// Delivers decoded messages and channel errors to `callback`.
    ///
    /// Returns the two listener ids (error, message) for
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn receive<F>(&self, callback: F) -> [ListenerId; 2]
    where
        F: Fn(std::result::Result<Message, Arc<Error>>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let on_error = Arc::clone(&callback);

        let error_id = self.subscribe(EventKind::Error, move |event| {
            if let ChannelEvent::Error(e) = event {
                on_error(Err(Arc::clone(e)));
            }
        });

        let message_id = self.subscribe(EventKind::Message, move |event| {
            if let ChannelEvent::Message(frame) = event {
                callback(Message::decode(frame).map_err(Arc::new));
            }
        });

        [error_id, message_id]
    }
}

// ============================================================================
// Channel - Events
// ============================================================================

impl Channel {
    /// Subscribes to events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(kind, Arc::new(handler))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Sets the single open handler, replacing the previous one.
    pub fn on_open(&self, handler: Option<EventHandler>) {
        self.inner.listeners.set_slot(EventKind::Open, handler);
    }

    /// Sets the single message handler, replacing the previous one.
    pub fn on_message(&self, handler: Option<EventHandler>) {
        self.inner.listeners.set_slot(EventKind::Message, handler);
    }

    /// Sets the single error handler, replacing the previous one.
    pub fn on_error(&self, handler: Option<EventHandler>) {
        self.inner.listeners.set_slot(EventKind::Error, handler);
    }

    /// Sets the single close handler, replacing the previous one.
    pub fn on_close(&self, handler: Option<EventHandler>) {
        self.inner.listeners.set_slot(EventKind::Close, handler);
    }

    /// Returns the number of listeners for `kind`, slot handler included.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.count(kind)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::control::ControlCommand;
    use crate::protocol::OptionValue;
    use crate::testing::{EchoHost, ScriptedControl, conduit};

    const WAIT: Duration = Duration::from_secs(5);

    fn events(channel: &Channel, kind: EventKind) -> mpsc::UnboundedReceiver<ChannelEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        channel.subscribe(kind, move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    #[test]
    fn test_socket_url() {
        assert_eq!(socket_url(4242, "7", "top", "abc"), "ws://localhost:4242/7/top?key=abc");
        assert_eq!(socket_url(1, "0", "top", "a b&c"), "ws://localhost:1/0/top?key=a%20b%26c");
    }

    #[tokio::test]
    async fn test_connect_opens_socket() {
        let host = EchoHost::bind().await;
        let control = ScriptedControl::active(host.port());
        let conduit = conduit(&control);
        let channel = conduit.channel().id("7").build();
        let mut opens = events(&channel, EventKind::Open);

        channel.connect().await.unwrap();

        assert!(channel.is_active());
        assert!(!channel.is_connecting());
        assert_eq!(channel.port(), host.port());
        assert_eq!(channel.url(), format!("ws://localhost:{}/7/top?key=abc", host.port()));
        assert!(matches!(opens.try_recv(), Ok(ChannelEvent::Open)));
        assert_eq!(host.paths(), vec!["/7/top?key=abc".to_string()]);
        assert_eq!(control.calls(&ControlCommand::Start), 1);
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let host = EchoHost::bind().await;
        let control = ScriptedControl::active(host.port());
        let conduit = conduit(&control);
        let channel = conduit.channel().build();

        let (tx, mut rx) = mpsc::unbounded_channel();
        channel.receive(move |result| {
            let _ = tx.send(result);
        });
        channel.connect().await.unwrap();

        let message = Message::new().with_option("a", "1").with_payload(vec![1, 2]);
        assert!(channel.send_message(&message));

        let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap().unwrap();
        assert_eq!(received.get("a"), Some(&OptionValue::Number(1.0)));
        assert_eq!(received.payload, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_receive_reports_decode_errors() {
        let host = EchoHost::bind().await;
        let control = ScriptedControl::active(host.port());
        let conduit = conduit(&control);
        let channel = conduit.channel().build();

        let (tx, mut rx) = mpsc::unbounded_channel();
        channel.receive(move |result| {
            let _ = tx.send(result);
        });
        channel.connect().await.unwrap();
        channel.inner.on_frame(1, Arc::from(vec![1u8, 3, b'a']));

        let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(received.unwrap_err().is_decode_error());
    }

    #[tokio::test]
    async fn test_send_requires_active_channel() {
        let control = ScriptedControl::active(1);
        let conduit = conduit(&control);
        let channel = conduit.channel().build();

        assert!(!channel.send(&Options::new(), &[1]));
    }

    #[tokio::test]
    async fn test_connect_while_connecting() {
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

        assert!(matches!(channel.connect().await, Err(Error::AlreadyConnecting)));
        assert!(channel.reconnect().is_none());

        channel.close();
        let result = timeout(WAIT, pending).await.unwrap().unwrap();
        assert!(matches!(result, Err(Error::ChannelClosed)));
        assert!(!channel.is_connecting());
    }

    #[tokio::test]
    async fn test_connect_not_ready() {
        let control = ScriptedControl::active(1);
        control.set_inactive_polls(10);
        let conduit = crate::Conduit::builder()
            .control(Arc::clone(&control) as Arc<dyn crate::ControlApi>)
            .client_id("top")
            .status_poll_interval(Duration::from_millis(1))
            .max_status_polls(3)
            .build()
            .unwrap();
        let channel = conduit.channel().build();

        let err = channel.connect().await.unwrap_err();
        assert!(matches!(err, Error::NotReady { polls: 3 }));
        assert!(!channel.is_connecting());
    }

    #[tokio::test]
    async fn test_connect_while_paused() {
        let control = ScriptedControl::active(1);
        let conduit = conduit(&control);
        let channel = conduit.channel().build();

        conduit.lifecycle().pause();

        assert!(matches!(channel.connect().await, Err(Error::Paused)));
        assert_eq!(control.calls(&ControlCommand::Start), 0);
    }

    #[tokio::test]
    async fn test_reconnect_attempt_bound() {
        let control = ScriptedControl::active(1);
        control.fail_starts(u32::MAX);
        let conduit = conduit(&control);
        let channel = conduit.channel().build();

        let handle = channel
            .reconnect_with(ReconnectOptions::new(3, Duration::from_millis(1)))
            .unwrap();
        timeout(WAIT, handle).await.unwrap().unwrap();

        assert_eq!(control.calls(&ControlCommand::Start), 4);
        assert!(!channel.is_active());
        assert!(!channel.is_connecting());
    }

    #[tokio::test]
    async fn test_reconnect_stops_on_success() {
        let host = EchoHost::bind().await;
        let control = ScriptedControl::active(host.port());
        control.fail_starts(2);
        let conduit = conduit(&control);
        let channel = conduit.channel().build();

        let handle = channel
            .reconnect_with(ReconnectOptions::new(5, Duration::from_millis(1)))
            .unwrap();
        timeout(WAIT, handle).await.unwrap().unwrap();

        assert_eq!(control.calls(&ControlCommand::Start), 3);
        assert!(channel.is_active());
    }

    #[tokio::test]
    async fn test_host_close_triggers_reconnect() {
        let host = EchoHost::bind().await;
        let control = ScriptedControl::active(host.port());
        let conduit = conduit(&control);
        let channel = conduit.channel().build();
        let mut opens = events(&channel, EventKind::Open);
        let mut closes = events(&channel, EventKind::Close);

        channel.connect().await.unwrap();
        timeout(WAIT, opens.recv()).await.unwrap().unwrap();

        host.disconnect_all();

        timeout(WAIT, closes.recv()).await.unwrap().unwrap();
        timeout(WAIT, opens.recv()).await.unwrap().unwrap();
        assert!(channel.is_active());
        assert_eq!(control.calls(&ControlCommand::Start), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_emits_error() {
        // Nothing listens on the reported port.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let control = ScriptedControl::active(port);
        let conduit = conduit(&control);
        let channel = conduit.channel().build();
        let mut errors = events(&channel, EventKind::Error);

        let err = channel.connect().await.unwrap_err();
        assert!(err.is_connection_error());
        assert!(matches!(errors.try_recv(), Ok(ChannelEvent::Error(_))));
        assert!(!channel.is_active());
        assert!(!channel.is_connecting());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let host = EchoHost::bind().await;
        let control = ScriptedControl::active(host.port());
        let conduit = conduit(&control);
        let channel = conduit.channel().build();
        let mut closes = events(&channel, EventKind::Close);

        channel.connect().await.unwrap();
        assert_eq!(conduit.channel_count(), 1);

        channel.close();
        channel.close();

        timeout(WAIT, closes.recv()).await.unwrap().unwrap();
        assert!(!channel.is_active());
        assert!(!channel.should_reconnect());
        assert_eq!(conduit.channel_count(), 0);
        assert!(matches!(channel.connect().await, Err(Error::ChannelClosed)));
        assert!(!channel.send(&Options::new(), &[]));
    }

    #[tokio::test]
    async fn test_slot_handlers() {
        let control = ScriptedControl::active(1);
        let conduit = conduit(&control);
        let channel = conduit.channel().build();

        channel.on_close(Some(Arc::new(|_| {})));
        channel.on_close(Some(Arc::new(|_| {})));
        channel.subscribe(EventKind::Close, |_| {});
        assert_eq!(channel.listener_count(EventKind::Close), 2);

        channel.on_close(None);
        assert_eq!(channel.listener_count(EventKind::Close), 1);
    }

    #[tokio::test]
    async fn test_drop_forgets_pool_entry() {
        let control = ScriptedControl::active(1);
        let conduit = conduit(&control);
        let channel = conduit.channel().build();
        assert_eq!(conduit.channel_count(), 1);

        drop(channel);
        assert_eq!(conduit.channel_count(), 0);
    }
}
