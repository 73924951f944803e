//! Client core for a server-authoritative hex-grid simulation.
//!
//! Keeps a local view of a live game consistent over one persistent,
//! possibly-dropping connection. Inbound frames either resolve a pending
//! request or become events; events run through a dispatch table whose
//! built-in handlers mutate the session's entity store. A renderer reads
//! the store, drains change notifications and recycles visual handles
//! through the pool; it never mutates the store itself.
//!
//! # Modules
//!
//! - [`transport`] -- Connection lifecycle, handshake, keepalive,
//!   request/response correlation.
//! - [`dispatch`] -- Event fan-out keyed by [`EventKind`].
//! - [`store`] -- Entity map with spatial and kind indices.
//! - [`pool`] -- Keyed freelist of recyclable presentation handles.
//! - [`scheduler`] -- Per-frame animation tasks and tweens.
//! - [`stockpile`] -- Resource totals.
//! - [`session`] -- Per-game context and the join/leave lifecycle.
//! - [`config`] -- Settings from environment or YAML.
//! - [`error`] -- Error types.
//!
//! [`EventKind`]: tessera_types::EventKind

pub mod config;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod scheduler;
pub mod session;
pub mod stockpile;
pub mod store;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use dispatch::{Dispatcher, Handler, HandlerId};
pub use error::{ClientError, HandlerError, StoreError, TransportError};
pub use pool::{PoolStats, Pooled, ResourcePool};
pub use scheduler::{Scheduler, Step, TaskId, Tween};
pub use session::{Session, SessionContext};
pub use stockpile::Stockpile;
pub use store::{ChangeSet, EntityField, EntityStore, StoreChange};
pub use transport::{
    ConnectionState, Connector, EventReceiver, Link, TcpConnector, Transport, TransportStats,
};
