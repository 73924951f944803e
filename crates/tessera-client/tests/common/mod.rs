//! In-memory link and a scripted fake server for integration tests.
//!
//! [`MemoryConnector`] hands every new link's far end to a [`FakeServer`],
//! which the test drives by hand: accept, handshake, read requests, reply,
//! push events, or drop the connection.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::channel::mpsc as link_channel;
use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use serde_json::{Value, json};
use tessera_client::{ClientConfig, Connector, EventReceiver, Link, Transport, TransportError};
use tessera_types::{ClientToken, ServerEvent};
use tokio::sync::mpsc;

/// Token every test client presents.
pub const TOKEN: &str = "test-token";

pub struct MemoryConnector {
    accept: mpsc::UnboundedSender<ServerConn>,
    refuse: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl Connector for MemoryConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Link, TransportError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return async {
                Err(TransportError::Io(std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                )))
            }
            .boxed();
        }
        let (client_tx, server_rx) = link_channel::unbounded::<String>();
        let (server_tx, client_rx) = link_channel::unbounded::<Result<String, TransportError>>();
        let conn = ServerConn {
            inbound: server_rx,
            outbound: server_tx,
        };
        let result = if self.accept.send(conn).is_ok() {
            Ok(Link::new(
                client_tx.sink_map_err(|_disconnected| TransportError::Closed),
                client_rx,
            ))
        } else {
            Err(TransportError::Closed)
        };
        async move { result }.boxed()
    }
}

/// Server side of one link.
pub struct ServerConn {
    inbound: link_channel::UnboundedReceiver<String>,
    outbound: link_channel::UnboundedSender<Result<String, TransportError>>,
}

impl ServerConn {
    /// Next frame from the client, parsed.
    pub async fn recv(&mut self) -> Option<Value> {
        let frame = self.inbound.next().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Next request that is not a keepalive. Pings are answered.
    pub async fn recv_request(&mut self) -> Option<Value> {
        loop {
            let frame = self.recv().await?;
            if frame["type"] == "ping" {
                self.reply(&frame, json!({"type": "pong"}));
                continue;
            }
            return Some(frame);
        }
    }

    /// Read the token frame and acknowledge it.
    pub async fn handshake(&mut self) -> Option<Value> {
        let hello = self.recv().await?;
        self.send(json!({"type": "connect"}));
        Some(hello)
    }

    pub fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    pub fn send_raw(&self, frame: &str) {
        let _ = self.outbound.unbounded_send(Ok(frame.to_owned()));
    }

    /// Answer `request` with `body`, echoing its correlation id.
    pub fn reply(&self, request: &Value, mut body: Value) {
        body["request_id"] = request["request_id"].clone();
        self.send(body);
    }

    /// Stop accepting frames from the client while keeping the server's
    /// own half open, so the client's next write fails.
    pub fn close_inbound(&mut self) {
        self.inbound.close();
    }

    /// Break the link with an I/O error.
    pub fn fail(&self) {
        let _ = self.outbound.unbounded_send(Err(TransportError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        ))));
    }
}

/// Accepts links opened through the paired [`MemoryConnector`].
pub struct FakeServer {
    accept: mpsc::UnboundedReceiver<ServerConn>,
    refuse: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl FakeServer {
    pub async fn accept(&mut self) -> ServerConn {
        self.accept.recv().await.unwrap()
    }

    pub async fn accept_and_handshake(&mut self) -> ServerConn {
        let mut conn = self.accept().await;
        let hello = conn.handshake().await.unwrap();
        assert_eq!(hello, json!({"token": TOKEN}));
        conn
    }

    /// Make connection attempts fail until called again with `false`.
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Connection attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

pub fn memory_link() -> (Arc<MemoryConnector>, FakeServer) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    let refuse = Arc::new(AtomicBool::new(false));
    let attempts = Arc::new(AtomicUsize::new(0));
    let connector = MemoryConnector {
        accept: accept_tx,
        refuse: Arc::clone(&refuse),
        attempts: Arc::clone(&attempts),
    };
    let server = FakeServer {
        accept: accept_rx,
        refuse,
        attempts,
    };
    (Arc::new(connector), server)
}

pub fn config() -> ClientConfig {
    let mut config = ClientConfig::new("memory:0");
    config.client_token = ClientToken::new(TOKEN);
    config
}

pub fn transport_with(config: ClientConfig) -> (Transport, EventReceiver, FakeServer) {
    let (connector, server) = memory_link();
    let (transport, events) = Transport::new(config, connector);
    (transport, events, server)
}

pub fn transport() -> (Transport, EventReceiver, FakeServer) {
    transport_with(config())
}

/// A started transport with its first link handshaken and the `connect`
/// event consumed.
pub async fn connected_with(
    config: ClientConfig,
) -> (Transport, EventReceiver, FakeServer, ServerConn) {
    let (transport, mut events, mut server) = transport_with(config);
    let (started, conn) = tokio::join!(transport.start(), server.accept_and_handshake());
    started.unwrap();
    assert_eq!(events.recv().await, Some(ServerEvent::Connect));
    (transport, events, server, conn)
}

pub async fn connected() -> (Transport, EventReceiver, FakeServer, ServerConn) {
    connected_with(config()).await
}
