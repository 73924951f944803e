//! Shared type definitions for the Tessera client.
//!
//! This crate is the single source of truth for everything that crosses the
//! wire between the client and the simulation server.
//!
//! # Modules
//!
//! - [`ids`] -- Typed string identifiers and the client token
//! - [`enums`] -- Entity kinds, alignments, resource types, game states
//! - [`entity`] -- The entity record and its partial-update patch
//! - [`protocol`] -- Outbound requests, inbound events, snapshots

pub mod entity;
pub mod enums;
pub mod ids;
pub mod protocol;

// Re-export all public types at crate root for convenience.
pub use entity::{Entity, EntityPatch};
pub use enums::{Alignment, EntityKind, GameState, ResourceType};
pub use ids::{ChannelId, ClientToken, EntityId, GameId};
pub use protocol::{EventKind, GameOutcome, GameSnapshot, Request, ServerEvent};
pub use tessera_grid::Hex;
