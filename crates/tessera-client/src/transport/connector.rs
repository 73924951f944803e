//! Pluggable link establishment.
//!
//! A [`Connector`] opens one [`Link`]: a sink of outbound text frames and a
//! stream of inbound ones. The transport owns everything above that
//! (handshake, correlation, reconnection), so a connector only has to know
//! how to reach the server and how frames are delimited on its medium.

use std::pin::Pin;

use futures::future::BoxFuture;
use futures::{FutureExt, Sink, Stream};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::TransportError;

/// Outbound half of a link.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a link. Ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// One open, not yet handshaken, connection to the server.
pub struct Link {
    /// Where outbound frames are written.
    pub sink: FrameSink,
    /// Where inbound frames arrive.
    pub stream: FrameStream,
}

impl Link {
    /// Bundle a sink and a stream into a link.
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<String, Error = TransportError> + Send + 'static,
        R: Stream<Item = Result<String, TransportError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Opens links to the server. Called once per connection attempt.
pub trait Connector: Send + Sync + 'static {
    /// Attempt to open a new link.
    fn connect(&self) -> BoxFuture<'static, Result<Link, TransportError>>;
}

/// Newline-delimited JSON over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Connector for `host:port`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Link, TransportError>> {
        let addr = self.addr.clone();
        async move {
            let socket = TcpStream::connect(&addr).await?;
            socket.set_nodelay(true)?;
            debug!(addr, "tcp link opened");
            let (read, write) = socket.into_split();

            let lines = BufReader::new(read).lines();
            let stream = futures::stream::unfold(Some(lines), |state| async move {
                let mut lines = state?;
                match lines.next_line().await {
                    Ok(Some(line)) => Some((Ok(line), Some(lines))),
                    Ok(None) => None,
                    Err(e) => Some((Err(TransportError::Io(e)), None)),
                }
            });

            let sink = futures::sink::unfold(write, |mut write, frame: String| async move {
                write.write_all(frame.as_bytes()).await?;
                write.write_all(b"\n").await?;
                write.flush().await?;
                Ok::<_, TransportError>(write)
            });

            Ok(Link::new(sink, stream))
        }
        .boxed()
    }
}
