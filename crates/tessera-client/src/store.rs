//! The local mirror of live entities.
//!
//! [`EntityStore`] keeps four structures consistent under add/update/remove:
//!
//! - the entity map, keyed by id
//! - the spatial index, cell to occupant ids
//! - one id set per [`EntityKind`]
//! - the hostile-unit counter (live `Unit` entities with `Enemy` alignment)
//!
//! Every mutation takes `&mut self`, so no reader can observe the
//! structures between the steps of one operation. After each call:
//!
//! - every `(cell, id)` pair in the spatial index matches the entity's
//!   stored position, and every live entity has exactly one pair
//! - `hostile_count()` equals the number of hostile units in the map
//!
//! A cell may hold more than one id. The server is expected to keep cells
//! exclusive, so a second occupant is logged; [`EntityStore::at`] returns
//! the most recent arrival.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde_json::Value;
use tessera_grid::Hex;
use tessera_types::{Entity, EntityId, EntityKind, EntityPatch};
use tracing::{debug, warn};

use crate::error::StoreError;

/// A stored field that an operation can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityField {
    /// `entity_type`
    Kind,
    /// Cell position.
    Position,
    /// Current health.
    Hp,
    /// Maximum health.
    MaxHp,
    /// Alignment.
    Alignment,
    /// Status effect set.
    Statuses,
    /// Activity progress.
    Progress,
    /// Any key of the visual descriptor.
    Visual,
}

/// What an update actually changed, for deciding what to animate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Fields whose stored value differs from before the operation.
    pub fields: BTreeSet<EntityField>,
    /// Position before the move, when the position changed.
    pub previous_position: Option<Hex>,
    /// Health before the change, when health changed.
    pub previous_hp: Option<u32>,
}

impl ChangeSet {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `field` changed.
    pub fn contains(&self, field: EntityField) -> bool {
        self.fields.contains(&field)
    }
}

/// A notification for the renderer, in the order the store changed.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    /// A new entity is live.
    Added(EntityId),
    /// Some fields of a live entity changed.
    Changed {
        /// The entity.
        id: EntityId,
        /// What changed.
        changes: ChangeSet,
    },
    /// An entity is gone; this is its last known state, for exit
    /// presentation.
    Removed(Entity),
    /// An entity attacked. Presentation only.
    Attacked {
        /// Attacker.
        attacker: EntityId,
        /// Target, when known.
        target: Option<EntityId>,
    },
}

/// Entity map with its spatial and kind indices.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: HashMap<EntityId, Entity>,
    cells: HashMap<Hex, Vec<EntityId>>,
    kinds: HashMap<EntityKind, BTreeSet<EntityId>>,
    hostile: usize,
}

impl EntityStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateEntity`] if the id is already live;
    /// the store is left unchanged.
    pub fn apply_add(&mut self, entity: Entity) -> Result<(), StoreError> {
        if self.entities.contains_key(&entity.id) {
            return Err(StoreError::DuplicateEntity(entity.id));
        }
        let id = entity.id.clone();
        self.index_cell(entity.position, &id);
        self.kinds.entry(entity.kind).or_default().insert(id.clone());
        if entity.is_hostile_unit() {
            self.hostile = self.hostile.saturating_add(1);
        }
        debug!(entity = %id, kind = ?entity.kind, cell = %entity.position, "entity added");
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Overwrite the fields present in `patch`.
    ///
    /// A position change moves the spatial index entry in the same call.
    /// Visual keys are merged one by one; a `null` value removes the key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownEntity`] if the id is not live.
    pub fn apply_update(&mut self, id: &EntityId, patch: &EntityPatch) -> Result<ChangeSet, StoreError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownEntity(id.clone()))?;

        let before_kind = entity.kind;
        let before_position = entity.position;
        let before_hp = entity.hp;
        let was_hostile = entity.is_hostile_unit();

        let mut changes = ChangeSet::default();
        let mut mark = |field, changed: bool| {
            if changed {
                changes.fields.insert(field);
            }
        };
        mark(EntityField::Kind, assign(&mut entity.kind, patch.kind));
        mark(EntityField::Position, assign(&mut entity.position, patch.position));
        mark(EntityField::Hp, assign(&mut entity.hp, patch.hp));
        mark(EntityField::MaxHp, assign(&mut entity.max_hp, patch.max_hp));
        mark(EntityField::Alignment, assign(&mut entity.alignment, patch.alignment));
        mark(
            EntityField::Statuses,
            assign(&mut entity.statuses, patch.statuses.clone()),
        );
        mark(
            EntityField::Progress,
            assign(&mut entity.progress, patch.progress.map(Some)),
        );
        mark(EntityField::Visual, merge_visual(entity, &patch.visual));

        let after_kind = entity.kind;
        let after_position = entity.position;
        let is_hostile = entity.is_hostile_unit();

        if after_position != before_position {
            self.unindex_cell(before_position, id);
            self.index_cell(after_position, id);
            changes.previous_position = Some(before_position);
        }
        if after_kind != before_kind {
            self.unindex_kind(before_kind, id);
            self.kinds.entry(after_kind).or_default().insert(id.clone());
        }
        self.adjust_hostile(was_hostile, is_hostile);
        if changes.contains(EntityField::Hp) {
            changes.previous_hp = Some(before_hp);
        }
        Ok(changes)
    }

    /// Delete an entity and return its last known state.
    ///
    /// Removing an id that is not live is a no-op returning `None`, so
    /// re-delivered removes are harmless.
    pub fn apply_remove(&mut self, id: &EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        self.unindex_cell(entity.position, id);
        self.unindex_kind(entity.kind, id);
        self.adjust_hostile(entity.is_hostile_unit(), false);
        debug!(entity = %id, "entity removed");
        Some(entity)
    }

    /// Apply a status effect.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownEntity`] if the id is not live.
    pub fn add_status(&mut self, id: &EntityId, status: &str) -> Result<ChangeSet, StoreError> {
        let entity = self.get_mut(id)?;
        let changed = entity.statuses.insert(status.to_owned());
        Ok(single(EntityField::Statuses, changed))
    }

    /// Clear a status effect.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownEntity`] if the id is not live.
    pub fn remove_status(&mut self, id: &EntityId, status: &str) -> Result<ChangeSet, StoreError> {
        let entity = self.get_mut(id)?;
        let changed = entity.statuses.remove(status);
        Ok(single(EntityField::Statuses, changed))
    }

    /// Record activity progress.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownEntity`] if the id is not live.
    pub fn set_progress(&mut self, id: &EntityId, progress: Decimal) -> Result<ChangeSet, StoreError> {
        let entity = self.get_mut(id)?;
        let changed = assign(&mut entity.progress, Some(Some(progress)));
        Ok(single(EntityField::Progress, changed))
    }

    /// Look up by id.
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// The entity occupying `cell` (the latest arrival if several do).
    pub fn at(&self, cell: Hex) -> Option<&Entity> {
        self.cells
            .get(&cell)
            .and_then(|ids| ids.last())
            .and_then(|id| self.entities.get(id))
    }

    /// Every id indexed at `cell`, oldest arrival first.
    pub fn occupants(&self, cell: Hex) -> &[EntityId] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every live entity of `kind`, in id order.
    pub fn by_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> + '_ {
        self.kinds
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entities.get(id))
    }

    /// Number of live entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.kinds.get(&kind).map_or(0, BTreeSet::len)
    }

    /// Live units aligned with the enemy.
    pub const fn hostile_count(&self) -> usize {
        self.hostile
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is live.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every live entity, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// The spatial index as a set of `(cell, id)` pairs.
    pub fn index_pairs(&self) -> BTreeSet<(Hex, EntityId)> {
        self.cells
            .iter()
            .flat_map(|(cell, ids)| ids.iter().map(move |id| (*cell, id.clone())))
            .collect()
    }

    /// Drop every entity and index entry.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.cells.clear();
        self.kinds.clear();
        self.hostile = 0;
    }

    fn get_mut(&mut self, id: &EntityId) -> Result<&mut Entity, StoreError> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownEntity(id.clone()))
    }

    fn index_cell(&mut self, cell: Hex, id: &EntityId) {
        let occupants = self.cells.entry(cell).or_default();
        if !occupants.is_empty() {
            warn!(
                %cell,
                entity = %id,
                occupants = occupants.len(),
                "cell already occupied, keeping both"
            );
        }
        occupants.push(id.clone());
    }

    fn unindex_cell(&mut self, cell: Hex, id: &EntityId) {
        if let Some(occupants) = self.cells.get_mut(&cell) {
            occupants.retain(|occupant| occupant != id);
            if occupants.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    fn unindex_kind(&mut self, kind: EntityKind, id: &EntityId) {
        if let Some(ids) = self.kinds.get_mut(&kind) {
            ids.remove(id);
            if ids.is_empty() {
                self.kinds.remove(&kind);
            }
        }
    }

    fn adjust_hostile(&mut self, was: bool, is: bool) {
        match (was, is) {
            (false, true) => self.hostile = self.hostile.saturating_add(1),
            (true, false) => self.hostile = self.hostile.saturating_sub(1),
            _ => {}
        }
    }
}

/// Overwrite `slot` with `value` if present and different.
fn assign<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

fn merge_visual(entity: &mut Entity, patch: &serde_json::Map<String, Value>) -> bool {
    let mut changed = false;
    for (key, value) in patch {
        if value.is_null() {
            changed |= entity.visual.remove(key).is_some();
        } else if entity.visual.get(key) != Some(value) {
            entity.visual.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

fn single(field: EntityField, changed: bool) -> ChangeSet {
    let mut changes = ChangeSet::default();
    if changed {
        changes.fields.insert(field);
    }
    changes
}
