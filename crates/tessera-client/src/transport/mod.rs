//! Persistent connection with request/response correlation.
//!
//! [`Transport`] presents `send(request) -> response` over a single link
//! that may drop at any time. A supervisor task ticks at a fixed interval:
//! while disconnected it re-establishes the link, while connected and idle
//! it sends a keepalive `ping`. Establishing a link is a two-phase
//! handshake (open the link, then exchange the token for a `connect`
//! acknowledgement); only after both succeed does the state become
//! [`ConnectionState::Connected`] and a synthetic `connect` event fire.
//!
//! # State machine
//!
//! ```text
//! Disconnected --tick--> Connecting --ack--> Connected
//!       ^                    |                   |
//!       +------ failure -----+---- close/error --+
//! ```
//!
//! Inbound frames whose `request_id` matches a pending request resolve it;
//! every other frame becomes a [`ServerEvent`] on the ordered event
//! channel returned by [`Transport::new`]. Requests outstanding across a
//! disconnect keep waiting toward their own deadline.

mod codec;
mod connector;
mod correlator;

pub use connector::{Connector, FrameSink, FrameStream, Link, TcpConnector};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tessera_types::{Request, ServerEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};

use self::codec::Inbound;
use self::correlator::Correlator;

/// Floor for the supervisor period; a zero interval cannot tick.
const MIN_SUPERVISOR_PERIOD: Duration = Duration::from_millis(1);

/// Ordered stream of unsolicited events, including the synthetic
/// `connect` and `disconnected` events.
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link. The supervisor will attempt one on its next tick.
    #[default]
    Disconnected,
    /// A link is being opened or handshaken.
    Connecting,
    /// Handshake acknowledged; requests can be sent.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Point-in-time transport counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStats {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Successful handshakes since creation.
    pub connects: u64,
    /// Requests written to a link.
    pub requests_sent: u64,
    /// Requests that hit their deadline.
    pub timeouts: u64,
    /// Requests still awaiting a response.
    pub pending: usize,
    /// When the current link was established.
    pub connected_since: Option<DateTime<Utc>>,
}

/// The writer for the live link, tagged with the link's epoch.
struct LiveSink {
    epoch: u64,
    sink: FrameSink,
}

struct Inner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    started: AtomicBool,
    writer: tokio::sync::Mutex<Option<LiveSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    correlator: Correlator,
    events: mpsc::UnboundedSender<ServerEvent>,
    next_request_id: AtomicU64,
    /// Epoch of the live link, zero when there is none.
    live_epoch: AtomicU64,
    next_epoch: AtomicU64,
    last_sent: Mutex<Instant>,
    connected_since: Mutex<Option<DateTime<Utc>>>,
    connects: AtomicU64,
    requests_sent: AtomicU64,
    timeouts: AtomicU64,
}

/// Cheaply cloneable handle to one persistent connection.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("server_addr", &self.inner.config.server_addr)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Create a transport. Nothing is spawned until [`Transport::start`].
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            config,
            connector,
            state: watch::Sender::new(ConnectionState::Disconnected),
            shutdown: watch::Sender::new(false),
            started: AtomicBool::new(false),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
            correlator: Correlator::default(),
            events,
            next_request_id: AtomicU64::new(1),
            live_epoch: AtomicU64::new(0),
            next_epoch: AtomicU64::new(1),
            last_sent: Mutex::new(Instant::now()),
            connected_since: Mutex::new(None),
            connects: AtomicU64::new(0),
            requests_sent: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Create a transport speaking newline-delimited JSON over TCP to
    /// `config.server_addr`.
    pub fn tcp(config: ClientConfig) -> (Self, EventReceiver) {
        let connector = Arc::new(TcpConnector::new(config.server_addr.clone()));
        Self::new(config, connector)
    }

    /// Launch the connection supervisor (once) and wait for the first
    /// successful connection.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Shutdown`] if the transport is shut down
    /// before a connection is established.
    pub async fn start(&self) -> Result<(), ClientError> {
        if *self.inner.shutdown.borrow() {
            return Err(ClientError::Shutdown);
        }
        if !self.inner.started.swap(true, Ordering::AcqRel) {
            let period = self.inner.config.supervisor_interval().max(MIN_SUPERVISOR_PERIOD);
            info!(
                server_addr = %self.inner.config.server_addr,
                supervisor_interval_ms = period.as_millis(),
                "starting connection supervisor"
            );
            tokio::spawn(supervise(
                Arc::downgrade(&self.inner),
                self.inner.shutdown.subscribe(),
                period,
            ));
        }

        let mut state = self.inner.state.subscribe();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::select! {
            connected = state.wait_for(|s| *s == ConnectionState::Connected) => {
                connected.map(|_| ()).map_err(|_closed| ClientError::Shutdown)
            }
            _ = shutdown.wait_for(|stopped| *stopped) => Err(ClientError::Shutdown),
        }
    }

    /// Send a request and wait for its correlated response.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] if the frame could not be written
    /// - [`ClientError::RequestTimeout`] if no response arrived in time
    /// - [`ClientError::RemoteError`] if the server rejected the request
    /// - [`ClientError::Shutdown`] if the transport was shut down meanwhile
    pub async fn send(&self, request: Request) -> Result<Value, ClientError> {
        let inner = &self.inner;
        if *inner.shutdown.borrow() {
            return Err(ClientError::Shutdown);
        }

        let request_id = inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let kind = request.kind();
        let timeout = inner.config.request_timeout();
        let frame = codec::encode_request(&request, request_id, &inner.config.client_token)?;

        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now);
        let slot = inner.correlator.register(request_id, deadline);

        if let Err(e) = inner.write(frame).await {
            inner.correlator.discard(request_id);
            debug!(request_id, kind, error = %e, "request write failed");
            return Err(e.into());
        }
        inner.requests_sent.fetch_add(1, Ordering::Relaxed);
        debug!(request_id, kind, "request sent");

        match tokio::time::timeout_at(deadline, slot).await {
            Ok(Ok(body)) => codec::into_response(body),
            Ok(Err(_closed)) if Instant::now() < deadline => Err(ClientError::Shutdown),
            Ok(Err(_)) | Err(_) => {
                inner.correlator.discard(request_id);
                inner.timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(request_id, kind, timeout_ms = timeout.as_millis(), "request timed out");
                Err(ClientError::RequestTimeout {
                    request_id,
                    timeout,
                })
            }
        }
    }

    /// Send a request and decode the response payload.
    ///
    /// # Errors
    ///
    /// Everything [`Transport::send`] returns, plus [`ClientError::Decode`]
    /// if the payload does not match `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: Request) -> Result<T, ClientError> {
        let body = self.send(request).await?;
        serde_json::from_value(body).map_err(ClientError::Decode)
    }

    /// Issue a request without waiting for it. Failures are logged.
    ///
    /// For use from event handlers, which must never block on a response.
    pub fn fire(&self, request: Request) {
        let transport = self.clone();
        tokio::spawn(async move {
            let kind = request.kind();
            if let Err(e) = transport.send(request).await {
                warn!(kind, error = %e, "fire-and-continue request failed");
            }
        });
    }

    /// Stop the supervisor, close the link and fail every pending request
    /// with [`ClientError::Shutdown`].
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if inner.shutdown.send_replace(true) {
            return;
        }
        if let Some(reader) = inner.take_reader() {
            reader.abort();
        }
        let live = inner.writer.lock().await.take();
        let closed = match live {
            Some(mut live) => live.sink.close().await,
            None => Ok(()),
        };
        if let Err(e) = closed {
            debug!(error = %e, "error closing link during shutdown");
        }
        inner.live_epoch.store(0, Ordering::Release);
        inner.set_state(ConnectionState::Disconnected);
        inner.correlator.clear();
        info!("transport shut down");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.len()
    }

    /// Snapshot of the transport counters.
    pub fn stats(&self) -> TransportStats {
        let inner = &self.inner;
        TransportStats {
            state: self.state(),
            connects: inner.connects.load(Ordering::Relaxed),
            requests_sent: inner.requests_sent.load(Ordering::Relaxed),
            timeouts: inner.timeouts.load(Ordering::Relaxed),
            pending: inner.correlator.len(),
            connected_since: *inner
                .connected_since
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// The configuration this transport was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(from = %current, to = %next, "connection state changed");
            *current = next;
            true
        });
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn emit(&self, event: ServerEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }

    fn touch(&self) {
        *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        let last = *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner);
        Instant::now().saturating_duration_since(last)
    }

    fn take_reader(&self) -> Option<JoinHandle<()>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Write one frame to the live link.
    async fn write(&self, frame: String) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let live_epoch = self.live_epoch.load(Ordering::Acquire);
        let Some(live) = writer.as_mut().filter(|live| live.epoch == live_epoch) else {
            return Err(TransportError::NotConnected);
        };
        let epoch = live.epoch;
        match live.sink.send(frame).await {
            Ok(()) => {
                self.touch();
                Ok(())
            }
            Err(e) => {
                writer.take();
                drop(writer);
                self.connection_lost(epoch, format!("write failed: {e}"));
                Err(e)
            }
        }
    }

    /// One supervisor tick.
    async fn supervise_tick(self: &Arc<Self>) {
        let swept = self.correlator.sweep_expired(Instant::now());
        if swept > 0 {
            debug!(swept, "dropped abandoned pending requests");
        }

        match self.current_state() {
            ConnectionState::Disconnected => {
                if let Err(e) = self.establish().await {
                    warn!(error = %e, "connection attempt failed");
                    self.set_state(ConnectionState::Disconnected);
                }
            }
            ConnectionState::Connected => {
                let idle = self.idle_for();
                if idle >= self.config.keepalive_idle() {
                    debug!(idle_ms = idle.as_millis(), "connection idle, sending keepalive");
                    self.touch();
                    Transport {
                        inner: Arc::clone(self),
                    }
                    .fire(Request::Ping);
                }
            }
            ConnectionState::Connecting => {}
        }
    }

    /// Open a link and run the handshake.
    async fn establish(self: &Arc<Self>) -> Result<(), TransportError> {
        self.set_state(ConnectionState::Connecting);
        let timeout = self.config.request_timeout();

        let Link {
            mut sink,
            mut stream,
        } = tokio::time::timeout(timeout, self.connector.connect())
            .await
            .map_err(|elapsed| TransportError::Handshake(format!("link open {elapsed}")))??;

        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now);
        tokio::time::timeout_at(
            deadline,
            sink.send(codec::encode_handshake(&self.config.client_token)),
        )
        .await
        .map_err(|elapsed| TransportError::Handshake(format!("token not written: {elapsed}")))??;
        let ack = tokio::time::timeout_at(deadline, stream.next())
            .await
            .map_err(|elapsed| {
                TransportError::Handshake(format!("no connect acknowledgement: {elapsed}"))
            })?;
        match ack {
            Some(Ok(frame)) if codec::is_connect_ack(&frame) => {}
            Some(Ok(frame)) => {
                warn!(frame, "handshake rejected");
                return Err(TransportError::Handshake(format!(
                    "unexpected first frame: {frame}"
                )));
            }
            Some(Err(e)) => return Err(e),
            None => return Err(TransportError::Closed),
        }

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        *self.writer.lock().await = Some(LiveSink { epoch, sink });
        self.live_epoch.store(epoch, Ordering::Release);
        self.touch();
        self.connects.fetch_add(1, Ordering::Relaxed);
        *self
            .connected_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        self.set_state(ConnectionState::Connected);
        self.emit(ServerEvent::Connect);

        let reader = tokio::spawn(read_loop(Arc::downgrade(self), stream, epoch));
        let previous = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(reader);
        if let Some(previous) = previous {
            previous.abort();
        }
        info!(epoch, "connected");
        Ok(())
    }

    /// Mark the link of `epoch` as gone. No-op if a newer link is live.
    fn connection_lost(&self, epoch: u64, reason: String) {
        if self
            .live_epoch
            .compare_exchange(epoch, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        *self
            .connected_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        warn!(epoch, reason, pending = self.correlator.len(), "connection lost");
        self.set_state(ConnectionState::Disconnected);
        self.emit(ServerEvent::Disconnected { reason });
    }

    /// Route one inbound frame.
    fn route(&self, frame: &str) {
        if frame.trim().is_empty() {
            return;
        }
        let decoded = match codec::decode(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                return;
            }
        };
        let body = match decoded.request_id {
            Some(request_id) => match self.correlator.resolve(request_id, decoded.body) {
                Ok(()) => return,
                Err(body) => {
                    debug!(request_id, "response matches no pending request");
                    body
                }
            },
            None => decoded.body,
        };
        match codec::into_event(body) {
            Inbound::Event(event) => self.emit(event),
            Inbound::Unknown(kind) => debug!(kind, "ignoring unknown event kind"),
            Inbound::Malformed { kind, error } => {
                warn!(kind, error = %error, "dropping malformed event");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let reader = self
            .reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reader) = reader {
            reader.abort();
        }
    }
}

async fn supervise(inner: Weak<Inner>, mut shutdown: watch::Receiver<bool>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stopped| *stopped) => break,
        }
        let Some(inner) = inner.upgrade() else { break };
        inner.supervise_tick().await;
    }
    debug!("connection supervisor stopped");
}

async fn read_loop(inner: Weak<Inner>, mut stream: FrameStream, epoch: u64) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(frame)) => {
                let Some(inner) = inner.upgrade() else { return };
                inner.route(&frame);
            }
            Some(Err(e)) => break e.to_string(),
            None => break "closed by server".to_owned(),
        }
    };
    if let Some(inner) = inner.upgrade() {
        inner.connection_lost(epoch, reason);
    }
}
