//! Messages exchanged with the simulation server.
//!
//! Outbound: [`Request`], serialized with a `type` tag; the transport adds
//! the correlation id and client token. Inbound: unsolicited
//! [`ServerEvent`]s, keyed for dispatch by [`EventKind`], plus request
//! responses whose payload shape depends on the request.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_grid::Hex;

use crate::entity::{Entity, EntityPatch};
use crate::enums::{GameState, ResourceType};
use crate::ids::{ChannelId, EntityId, GameId};

/// A request the client can issue. Every request expects exactly one
/// correlated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Keepalive. Answered with `pong`.
    #[serde(rename = "ping")]
    Ping,
    /// Fetch the authenticated user.
    #[serde(rename = "user/get")]
    UserGet,
    /// Fetch a linked channel.
    #[serde(rename = "channel/get")]
    ChannelGet {
        /// Channel to fetch.
        channel: ChannelId,
    },
    /// Create a game hosted by a channel.
    #[serde(rename = "game/create")]
    GameCreate {
        /// Hosting channel.
        channel: ChannelId,
    },
    /// Fetch a full game snapshot.
    #[serde(rename = "game/get")]
    GameGet {
        /// Game to fetch.
        game: GameId,
    },
    /// Start receiving a game's event stream on this connection.
    #[serde(rename = "game/subscribe")]
    GameSubscribe {
        /// Game to follow.
        game: GameId,
    },
}

impl Request {
    /// The wire `type` of this request, for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::UserGet => "user/get",
            Self::ChannelGet { .. } => "channel/get",
            Self::GameCreate { .. } => "game/create",
            Self::GameGet { .. } => "game/get",
            Self::GameSubscribe { .. } => "game/subscribe",
        }
    }
}

/// How a game ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    /// Whether the local player won, when the server says.
    #[serde(default)]
    pub victory: Option<bool>,
    /// Free-form reason.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Unsolicited inbound messages, plus the synthetic connection events the
/// transport emits itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A new entity appeared.
    #[serde(rename = "entity/add")]
    EntityAdd {
        /// The full entity.
        entity: Entity,
    },
    /// Some fields of an entity changed.
    #[serde(rename = "entity/update")]
    EntityUpdate {
        /// Entity to update.
        id: EntityId,
        /// Changed fields.
        #[serde(default)]
        fields: EntityPatch,
    },
    /// An entity moved to a new cell.
    #[serde(rename = "entity/move")]
    EntityMove {
        /// Entity that moved.
        id: EntityId,
        /// Destination cell.
        position: Hex,
    },
    /// An entity is gone.
    #[serde(rename = "entity/remove")]
    EntityRemove {
        /// Entity to remove.
        id: EntityId,
    },
    /// One entity attacked another. Presentation only.
    #[serde(rename = "entity/attack")]
    EntityAttack {
        /// Attacker.
        id: EntityId,
        /// Target, when there is one.
        #[serde(default)]
        target: Option<EntityId>,
    },
    /// A status effect was applied.
    #[serde(rename = "entity/status/add")]
    EntityStatusAdd {
        /// Affected entity.
        id: EntityId,
        /// Status name.
        status: String,
    },
    /// A status effect expired.
    #[serde(rename = "entity/status/remove")]
    EntityStatusRemove {
        /// Affected entity.
        id: EntityId,
        /// Status name.
        status: String,
    },
    /// An entity's activity progressed.
    #[serde(rename = "entity/progress")]
    EntityProgress {
        /// Affected entity.
        id: EntityId,
        /// New progress value.
        progress: Decimal,
    },
    /// Resources were added to (or, when negative, taken from) the stockpile.
    #[serde(rename = "resource")]
    Resource {
        /// Which resource.
        resource_type: ResourceType,
        /// Signed amount.
        amount: Decimal,
    },
    /// Cells became visible.
    #[serde(rename = "reveal")]
    Reveal {
        /// Newly visible cells.
        #[serde(default)]
        cells: Vec<Hex>,
    },
    /// The game is over.
    #[serde(rename = "game/end")]
    GameEnd(GameOutcome),
    /// Keepalive answer that arrived without a matching request.
    #[serde(rename = "pong")]
    Pong,
    /// The connection is up and the handshake succeeded.
    #[serde(rename = "connect")]
    Connect,
    /// The connection dropped. Emitted locally by the transport.
    #[serde(rename = "disconnected")]
    Disconnected {
        /// Human-readable cause.
        #[serde(default)]
        reason: String,
    },
}

impl ServerEvent {
    /// The dispatch key for this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::EntityAdd { .. } => EventKind::EntityAdd,
            Self::EntityUpdate { .. } => EventKind::EntityUpdate,
            Self::EntityMove { .. } => EventKind::EntityMove,
            Self::EntityRemove { .. } => EventKind::EntityRemove,
            Self::EntityAttack { .. } => EventKind::EntityAttack,
            Self::EntityStatusAdd { .. } => EventKind::EntityStatusAdd,
            Self::EntityStatusRemove { .. } => EventKind::EntityStatusRemove,
            Self::EntityProgress { .. } => EventKind::EntityProgress,
            Self::Resource { .. } => EventKind::Resource,
            Self::Reveal { .. } => EventKind::Reveal,
            Self::GameEnd(_) => EventKind::GameEnd,
            Self::Pong => EventKind::Pong,
            Self::Connect => EventKind::Connect,
            Self::Disconnected { .. } => EventKind::Disconnected,
        }
    }
}

/// The fixed catalog of inbound event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// `entity/add`
    EntityAdd,
    /// `entity/update`
    EntityUpdate,
    /// `entity/move`
    EntityMove,
    /// `entity/remove`
    EntityRemove,
    /// `entity/attack`
    EntityAttack,
    /// `entity/status/add`
    EntityStatusAdd,
    /// `entity/status/remove`
    EntityStatusRemove,
    /// `entity/progress`
    EntityProgress,
    /// `resource`
    Resource,
    /// `reveal`
    Reveal,
    /// `game/end`
    GameEnd,
    /// `pong`
    Pong,
    /// `connect` (synthetic)
    Connect,
    /// `disconnected` (synthetic)
    Disconnected,
}

impl EventKind {
    /// Every kind in the catalog.
    pub const ALL: [Self; 14] = [
        Self::EntityAdd,
        Self::EntityUpdate,
        Self::EntityMove,
        Self::EntityRemove,
        Self::EntityAttack,
        Self::EntityStatusAdd,
        Self::EntityStatusRemove,
        Self::EntityProgress,
        Self::Resource,
        Self::Reveal,
        Self::GameEnd,
        Self::Pong,
        Self::Connect,
        Self::Disconnected,
    ];

    /// The wire `type` string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EntityAdd => "entity/add",
            Self::EntityUpdate => "entity/update",
            Self::EntityMove => "entity/move",
            Self::EntityRemove => "entity/remove",
            Self::EntityAttack => "entity/attack",
            Self::EntityStatusAdd => "entity/status/add",
            Self::EntityStatusRemove => "entity/status/remove",
            Self::EntityProgress => "entity/progress",
            Self::Resource => "resource",
            Self::Reveal => "reveal",
            Self::GameEnd => "game/end",
            Self::Pong => "pong",
            Self::Connect => "connect",
            Self::Disconnected => "disconnected",
        }
    }

    /// Look up a kind by its wire `type` string.
    pub fn from_wire(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full game state as returned by `game/get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Game id.
    pub id: GameId,
    /// Owning player's user id.
    #[serde(default)]
    pub player: String,
    /// Lifecycle phase.
    #[serde(default)]
    pub state: GameState,
    /// Every live entity, keyed by id.
    #[serde(default)]
    pub entities: BTreeMap<EntityId, Entity>,
    /// Food stockpile.
    #[serde(default)]
    pub food: Decimal,
    /// Gold stockpile.
    #[serde(default)]
    pub gold: Decimal,
    /// Stone stockpile.
    #[serde(default)]
    pub stone: Decimal,
    /// Wood stockpile.
    #[serde(default)]
    pub wood: Decimal,
    /// Aether stockpile.
    #[serde(default)]
    pub aether: Decimal,
}

impl GameSnapshot {
    /// Stockpile totals, one per resource type.
    pub const fn totals(&self) -> [(ResourceType, Decimal); 5] {
        [
            (ResourceType::Food, self.food),
            (ResourceType::Gold, self.gold),
            (ResourceType::Stone, self.stone),
            (ResourceType::Wood, self.wood),
            (ResourceType::Aether, self.aether),
        ]
    }
}
