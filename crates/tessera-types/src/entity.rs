//! The entity record mirrored from the server, and partial updates to it.
//!
//! Only the fields the client core reasons about are typed. Everything
//! else the server sends (`name`, `image`, `structure_type`, `job`, carried
//! resources ...) lands in the opaque `visual` map and is handed to the
//! renderer untouched.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tessera_grid::Hex;

use crate::enums::{Alignment, EntityKind};
use crate::ids::EntityId;

/// A live entity as last reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Server-issued identity.
    pub id: EntityId,
    /// Unit, resource node or structure.
    #[serde(rename = "entity_type")]
    pub kind: EntityKind,
    /// Cell the entity occupies.
    pub position: Hex,
    /// Current health. Zero together with `max_hp == 0` means no health bar.
    #[serde(default)]
    pub hp: u32,
    /// Maximum health. Zero means the entity has no health bar.
    #[serde(default)]
    pub max_hp: u32,
    /// Side the entity fights for.
    #[serde(default)]
    pub alignment: Alignment,
    /// Active status effects, by name.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub statuses: BTreeSet<String>,
    /// Progress of the entity's current activity (construction, training).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Decimal>,
    /// Presentation fields passed through to the renderer.
    #[serde(flatten)]
    pub visual: Map<String, Value>,
}

impl Entity {
    /// Create a bare entity with no health bar and no visual descriptor.
    pub fn new(id: impl Into<EntityId>, kind: EntityKind, position: Hex) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            hp: 0,
            max_hp: 0,
            alignment: Alignment::Neutral,
            statuses: BTreeSet::new(),
            progress: None,
            visual: Map::new(),
        }
    }

    /// Set the alignment.
    #[must_use]
    pub const fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set current and maximum health.
    #[must_use]
    pub const fn with_health(mut self, hp: u32, max_hp: u32) -> Self {
        self.hp = hp;
        self.max_hp = max_hp;
        self
    }

    /// Add one visual descriptor field.
    #[must_use]
    pub fn with_visual(mut self, key: &str, value: Value) -> Self {
        self.visual.insert(key.to_owned(), value);
        self
    }

    /// `(hp, max_hp)` when the entity should show a health bar.
    pub const fn health_bar(&self) -> Option<(u32, u32)> {
        if self.max_hp == 0 {
            None
        } else {
            Some((self.hp, self.max_hp))
        }
    }

    /// Whether this entity counts toward the hostile-unit counter.
    pub fn is_hostile_unit(&self) -> bool {
        self.kind == EntityKind::Unit && self.alignment == Alignment::Enemy
    }
}

/// A partial update: every present field overwrites the stored value.
///
/// Visual keys are merged into the stored descriptor one by one; a JSON
/// `null` removes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityPatch {
    /// New kind.
    #[serde(rename = "entity_type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
    /// New cell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Hex>,
    /// New current health.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<u32>,
    /// New maximum health.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<u32>,
    /// New alignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    /// Full replacement of the status set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuses: Option<BTreeSet<String>>,
    /// New activity progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Decimal>,
    /// Visual descriptor keys to overwrite.
    #[serde(flatten)]
    pub visual: Map<String, Value>,
}

impl EntityPatch {
    /// A patch that only moves the entity.
    pub fn position(position: Hex) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// A patch that only changes health.
    pub fn hp(hp: u32) -> Self {
        Self {
            hp: Some(hp),
            ..Self::default()
        }
    }

    /// Whether the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.position.is_none()
            && self.hp.is_none()
            && self.max_hp.is_none()
            && self.alignment.is_none()
            && self.statuses.is_none()
            && self.progress.is_none()
            && self.visual.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn entity_parses_server_model() {
        let raw = json!({
            "entity_type": "worker",
            "id": "6600aa",
            "name": "<Unknown>",
            "position": {"q": 1, "r": -1},
            "hp": 1,
            "max_hp": 1,
            "image": null,
            "job": "miner",
            "carry_amount": 0
        });
        let entity: Entity = serde_json::from_value(raw).unwrap_or_else(|_| {
            Entity::new("unreachable", EntityKind::Resource, Hex::ORIGIN)
        });
        assert_eq!(entity.id, EntityId::new("6600aa"));
        assert_eq!(entity.kind, EntityKind::Unit);
        assert_eq!(entity.position, Hex::new(1, -1));
        assert_eq!(entity.alignment, Alignment::Neutral);
        assert_eq!(entity.health_bar(), Some((1, 1)));
        assert_eq!(entity.visual.get("job"), Some(&json!("miner")));
        assert_eq!(entity.visual.get("name"), Some(&json!("<Unknown>")));
        assert!(!entity.visual.contains_key("position"));
    }

    #[test]
    fn missing_health_means_no_bar() {
        let entity: Result<Entity, _> = serde_json::from_value(json!({
            "entity_type": "resource",
            "id": "r1",
            "position": {"q": 0, "r": 0},
            "resource_type": "wood"
        }));
        assert_eq!(entity.ok().and_then(|e| e.health_bar()), None);
    }

    #[test]
    fn hostile_unit_detection() {
        let enemy = Entity::new("e", EntityKind::Unit, Hex::ORIGIN).with_alignment(Alignment::Enemy);
        let enemy_tower =
            Entity::new("t", EntityKind::Structure, Hex::ORIGIN).with_alignment(Alignment::Enemy);
        let friend = Entity::new("f", EntityKind::Unit, Hex::ORIGIN).with_alignment(Alignment::Player);
        assert!(enemy.is_hostile_unit());
        assert!(!enemy_tower.is_hostile_unit());
        assert!(!friend.is_hostile_unit());
    }

    #[test]
    fn patch_collects_unknown_keys_as_visual() {
        let patch: EntityPatch = serde_json::from_value(json!({
            "hp": 3,
            "progress": 0.5,
            "image": "tower_damaged.png"
        }))
        .unwrap_or_default();
        assert_eq!(patch.hp, Some(3));
        assert_eq!(patch.progress, Some(dec!(0.5)));
        assert_eq!(patch.position, None);
        assert_eq!(patch.visual.get("image"), Some(&json!("tower_damaged.png")));
        assert!(!patch.is_empty());
    }

    #[test]
    fn empty_patch() {
        let patch: EntityPatch = serde_json::from_value(json!({})).unwrap_or_else(|_| EntityPatch::hp(9));
        assert!(patch.is_empty());
    }
}
