//! Enumeration types shared between the wire protocol and the entity store.

use serde::{Deserialize, Serialize};

/// What an entity is. Drives the store's kind indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A mobile unit. The server calls its own units workers.
    #[serde(alias = "worker")]
    Unit,
    /// A harvestable resource node.
    Resource,
    /// A building.
    Structure,
}

impl EntityKind {
    /// Every kind, in index order.
    pub const ALL: [Self; 3] = [Self::Unit, Self::Resource, Self::Structure];
}

/// Which side an entity is on, from the local player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Owned by the local player.
    Player,
    /// Owned by nobody.
    #[default]
    Neutral,
    /// Hostile to the local player.
    Enemy,
}

/// Stockpiled resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Feeds units.
    Food,
    /// Currency.
    Gold,
    /// Building material.
    Stone,
    /// Building material.
    Wood,
    /// Enchanting material.
    Aether,
}

impl ResourceType {
    /// Every resource type, in display order.
    pub const ALL: [Self; 5] = [Self::Food, Self::Gold, Self::Stone, Self::Wood, Self::Aether];
}

/// Lifecycle phase of a game on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    /// Waiting to start.
    #[default]
    Lobby,
    /// In progress.
    Active,
}
