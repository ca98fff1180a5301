//! Test doubles shared by the unit tests.
//!
//! - [`ScriptedControl`] answers control requests from in-memory state.
//! - [`EchoHost`] is a loopback WebSocket host that echoes binary frames.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use crate::control::{ControlApi, ControlCommand};
use crate::error::{Error, Result};
use crate::runtime::{Conduit, ReconnectOptions};

// ============================================================================
// ScriptedControl
// ============================================================================

struct Script {
    port: u16,
    inactive_polls: u32,
    failing_starts: u32,
    shared_key: String,
    diagnostics: Value,
    calls: FxHashMap<&'static str, usize>,
}

/// In-memory [`ControlApi`].
pub(crate) struct ScriptedControl {
    script: Mutex<Script>,
}

impl ScriptedControl {
    /// Control whose listener is active on `port`.
    pub fn active(port: u16) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                port,
                inactive_polls: 0,
                failing_starts: 0,
                shared_key: String::new(),
                diagnostics: json!({}),
                calls: FxHashMap::default(),
            }),
        })
    }

    pub fn set_port(&self, port: u16) {
        self.script.lock().port = port;
    }

    /// The next `polls` status requests report an inactive listener.
    pub fn set_inactive_polls(&self, polls: u32) {
        self.script.lock().inactive_polls = polls;
    }

    /// The next `count` start requests fail.
    pub fn fail_starts(&self, count: u32) {
        self.script.lock().failing_starts = count;
    }

    pub fn set_diagnostics(&self, reply: Value) {
        self.script.lock().diagnostics = reply;
    }

    /// Number of requests made for the method of `command`.
    pub fn calls(&self, command: &ControlCommand) -> usize {
        self.script
            .lock()
            .calls
            .get(command.method())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ControlApi for ScriptedControl {
    async fn request(&self, command: &ControlCommand) -> Result<Value> {
        let mut script = self.script.lock();
        *script.calls.entry(command.method()).or_default() += 1;

        match command {
            ControlCommand::Start => {
                if script.failing_starts > 0 {
                    script.failing_starts -= 1;
                    return Err(Error::control(command.method(), "listener unavailable"));
                }
                Ok(json!({ "port": script.port }))
            }
            ControlCommand::Stop => Ok(Value::Null),
            ControlCommand::Status => {
                let is_active = script.inactive_polls == 0;
                script.inactive_polls = script.inactive_polls.saturating_sub(1);
                Ok(json!({
                    "port": script.port,
                    "isActive": is_active,
                    "sharedKey": script.shared_key,
                }))
            }
            ControlCommand::GetSharedKey => Ok(json!({ "sharedKey": script.shared_key })),
            ControlCommand::SetSharedKey { shared_key } => {
                script.shared_key.clone_from(shared_key);
                Ok(json!({ "sharedKey": script.shared_key }))
            }
            ControlCommand::Diagnostics => Ok(script.diagnostics.clone()),
        }
    }
}

/// Conduit over `control` with fast polling and a single-attempt reconnect.
pub(crate) fn conduit(control: &Arc<ScriptedControl>) -> Conduit {
    Conduit::builder()
        .control(Arc::clone(control) as Arc<dyn ControlApi>)
        .client_id("top")
        .shared_key("abc")
        .status_poll_interval(Duration::from_millis(1))
        .reconnect(ReconnectOptions::new(0, Duration::from_millis(1)))
        .build()
        .expect("test conduit")
}

// ============================================================================
// EchoHost
// ============================================================================

/// Loopback WebSocket host echoing binary frames back to the sender.
pub(crate) struct EchoHost {
    port: u16,
    paths: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    disconnect: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl EchoHost {
    /// Binds to a random loopback port and starts accepting.
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let paths = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (disconnect, _) = broadcast::channel(4);

        let task = tokio::spawn(Self::accept_loop(
            listener,
            Arc::clone(&paths),
            Arc::clone(&connections),
            disconnect.clone(),
        ));

        Self {
            port,
            paths,
            connections,
            disconnect,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Request paths (with query) of every accepted handshake.
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Closes every connected socket from the host side.
    pub fn disconnect_all(&self) {
        let _ = self.disconnect.send(());
    }

    async fn accept_loop(
        listener: TcpListener,
        paths: Arc<Mutex<Vec<String>>>,
        connections: Arc<AtomicUsize>,
        disconnect: broadcast::Sender<()>,
    ) {
        while let Ok((stream, _)) = listener.accept().await {
            let paths = Arc::clone(&paths);
            let connections = Arc::clone(&connections);
            let mut disconnect = disconnect.subscribe();

            tokio::spawn(async move {
                let record = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
                    paths.lock().push(request.uri().to_string());
                    Ok(response)
                };

                let Ok(ws) = accept_hdr_async(stream, record).await else {
                    return;
                };
                connections.fetch_add(1, Ordering::SeqCst);

                let (mut write, mut read) = ws.split();
                loop {
                    tokio::select! {
                        message = read.next() => match message {
                            Some(Ok(Message::Binary(data))) => {
                                if write.send(Message::Binary(data)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                        _ = disconnect.recv() => {
                            let _ = write.close().await;
                            break;
                        }
                    }
                }
            });
        }
    }
}

impl Drop for EchoHost {
    fn drop(&mut self) {
        self.task.abort();
    }
}
