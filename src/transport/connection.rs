//! WebSocket socket and event loop.
//!
//! Each open socket is driven by one spawned tokio task that handles:
//!
//! - Incoming frames from the host (forwarded to the owning channel)
//! - Outgoing frames queued by [`Socket::send`]
//! - Close requests and remote close
//!
//! A socket is created as a [`Socket`] handle plus a [`SocketDriver`]; the
//! driver is spawned once the owning channel has recorded the handle. The
//! task reports back through a [`SocketObserver`] held weakly, so an
//! abandoned channel does not keep its socket task alive. Dropping the
//! [`Socket`] handle drops the command sender, which closes the socket.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use crate::error::Error;

// ============================================================================
// Types
// ============================================================================

/// Client WebSocket stream type.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives notifications from a socket task.
///
/// Every call carries the socket serial so the observer can ignore
/// notifications from a socket it has already replaced.
pub(crate) trait SocketObserver: Send + Sync {
    /// A frame arrived.
    fn on_frame(&self, serial: u64, frame: Arc<[u8]>);

    /// The socket failed. [`on_closed`](Self::on_closed) follows.
    fn on_error(&self, serial: u64, error: Error);

    /// The socket task finished.
    fn on_closed(&self, serial: u64);
}

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the event loop.
enum SocketCommand {
    /// Transmit one binary frame.
    Send(Vec<u8>),
    /// Close the socket.
    Close,
}

// ============================================================================
// Socket
// ============================================================================

/// Handle to an open conduit socket.
///
/// Owned exclusively by one channel; never cloned.
pub(crate) struct Socket {
    /// Per-channel sequence number of this socket.
    serial: u64,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Cleared once the socket starts closing.
    open: Arc<AtomicBool>,
}

impl Socket {
    /// Creates a socket handle and the driver that will run its event loop.
    ///
    /// Commands queued before the driver is spawned are processed once it
    /// starts.
    pub fn pair(serial: u64) -> (Self, SocketDriver) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let driver = SocketDriver {
            serial,
            command_rx,
            open: Arc::clone(&open),
        };

        (
            Self {
                serial,
                command_tx,
                open,
            },
            driver,
        )
    }

    /// Returns the socket serial.
    #[inline]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns `true` while the socket is open and its task is running.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.command_tx.is_closed()
    }

    /// Queues a frame. Returns `false` if the socket is not open.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        if !self.is_open() {
            return false;
        }

        self.command_tx.send(SocketCommand::Send(frame)).is_ok()
    }

    /// Starts closing the socket.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self.command_tx.send(SocketCommand::Close);
    }
}

// ============================================================================
// SocketDriver
// ============================================================================

/// Event loop half of a [`Socket`], not yet running.
pub(crate) struct SocketDriver {
    /// Socket serial, echoed in observer calls.
    serial: u64,
    /// Commands from the [`Socket`] handle.
    command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    /// Shared open flag.
    open: Arc<AtomicBool>,
}

impl SocketDriver {
    /// Spawns the event loop for an established stream.
    pub fn spawn(self, runtime: &Handle, ws_stream: WsStream, observer: Weak<dyn SocketObserver>) {
        runtime.spawn(self.run_event_loop(ws_stream, observer));
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(self, ws_stream: WsStream, observer: Weak<dyn SocketObserver>) {
        let Self {
            serial,
            mut command_rx,
            open,
        } = self;
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the host
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Binary(data))) => {
                            trace!(serial, len = data.len(), "Frame received");
                            notify(&observer, |o| o.on_frame(serial, Arc::from(data.as_ref())));
                        }

                        Some(Ok(Message::Text(text))) => {
                            trace!(serial, len = text.len(), "Text frame received");
                            notify(&observer, |o| o.on_frame(serial, Arc::from(text.as_bytes())));
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(serial, "WebSocket closed by host");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(serial, error = %e, "WebSocket error");
                            open.store(false, Ordering::Release);
                            notify(&observer, |o| o.on_error(serial, Error::WebSocket(e)));
                            break;
                        }

                        None => {
                            debug!(serial, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Ping, Pong, Frame
                        _ => {}
                    }
                }

                // Commands from the channel
                command = command_rx.recv() => {
                    match command {
                        Some(SocketCommand::Send(frame)) => {
                            let len = frame.len();
                            if let Err(e) = ws_write.send(Message::Binary(frame.into())).await {
                                warn!(serial, error = %e, "Failed to send frame");
                                open.store(false, Ordering::Release);
                                notify(&observer, |o| o.on_error(serial, Error::WebSocket(e)));
                                break;
                            }
                            trace!(serial, len, "Frame sent");
                        }

                        Some(SocketCommand::Close) | None => {
                            debug!(serial, "Closing socket");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        open.store(false, Ordering::Release);
        notify(&observer, |o| o.on_closed(serial));

        debug!(serial, "Socket event loop terminated");
    }
}

/// Calls `f` if the observer is still alive.
fn notify(observer: &Weak<dyn SocketObserver>, f: impl FnOnce(&dyn SocketObserver)) {
    if let Some(observer) = observer.upgrade() {
        f(observer.as_ref());
    }
}

// ============================================================================
// Tests
// ============================================================================
