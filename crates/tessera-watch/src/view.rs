//! Headless stand-in for a renderer.
//!
//! Each live entity is shown by a [`Marker`] taken from the session's
//! handle pool. Moves are animated by scheduler tweens writing into a
//! shared position table, so the view always knows where every marker is
//! drawn this frame.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tessera_client::{EntityField, Pooled, Session, SessionContext, StoreChange, Tween};
use tessera_grid::Point;
use tessera_types::{EntityId, EntityKind, ResourceType};
use tracing::{debug, info};

/// How long a one-cell move takes on screen.
const MOVE_DURATION: Duration = Duration::from_millis(250);

type Positions = Arc<Mutex<HashMap<EntityId, Point>>>;

/// A drawable placeholder for one entity.
#[derive(Debug, Default)]
pub struct Marker {
    /// Pool template the marker was built from.
    pub template: &'static str,
    /// Entity the marker currently shows, if attached.
    pub entity: Option<EntityId>,
}

impl Pooled for Marker {
    fn detach(&mut self) {
        self.entity = None;
    }
}

const fn template(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Unit => "unit",
        EntityKind::Resource => "resource",
        EntityKind::Structure => "structure",
    }
}

/// Markers for every live entity, and where each is drawn.
#[derive(Debug, Default)]
pub struct View {
    markers: HashMap<EntityId, Marker>,
    positions: Positions,
}

impl View {
    /// An empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror a batch of store changes. Returns how many were applied.
    pub fn apply(&mut self, ctx: &mut SessionContext<Marker>, changes: Vec<StoreChange>) -> usize {
        let mut applied: usize = 0;
        for change in changes {
            let handled = match change {
                StoreChange::Added(id) => self.show(ctx, id),
                StoreChange::Changed { id, changes } if changes.contains(EntityField::Position) => {
                    changes
                        .previous_position
                        .is_some_and(|from| self.animate_move(ctx, id, from))
                }
                StoreChange::Changed { id, changes } => {
                    debug!(entity = %id, fields = ?changes.fields, "entity changed");
                    true
                }
                StoreChange::Removed(entity) => self.hide(ctx, &entity.id),
                StoreChange::Attacked { attacker, target } => {
                    debug!(%attacker, target = ?target, "attack");
                    true
                }
            };
            if handled {
                applied = applied.saturating_add(1);
            }
        }
        applied
    }

    /// Where `id` is drawn right now.
    pub fn position(&self, id: &EntityId) -> Option<Point> {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    /// Number of markers on screen.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Return every marker to the pool.
    pub fn clear(&mut self, ctx: &mut SessionContext<Marker>) {
        for (_, marker) in self.markers.drain() {
            ctx.pool_mut().release(marker.template, marker);
        }
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn show(&mut self, ctx: &mut SessionContext<Marker>, id: EntityId) -> bool {
        let Some((kind, cell)) = ctx.store().get(&id).map(|e| (e.kind, e.position)) else {
            return false;
        };
        let template = template(kind);
        let mut marker = ctx.pool_mut().acquire(template, || Marker {
            template,
            entity: None,
        });
        marker.entity = Some(id.clone());
        let at = ctx.layout().to_pixel(cell);
        self.set_position(id.clone(), at);
        if let Some(old) = self.markers.insert(id, marker) {
            ctx.pool_mut().release(old.template, old);
        }
        true
    }

    fn hide(&mut self, ctx: &mut SessionContext<Marker>, id: &EntityId) -> bool {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match self.markers.remove(id) {
            Some(marker) => {
                ctx.pool_mut().release(marker.template, marker);
                true
            }
            None => false,
        }
    }

    fn animate_move(
        &self,
        ctx: &mut SessionContext<Marker>,
        id: EntityId,
        from: tessera_grid::Hex,
    ) -> bool {
        let Some(to) = ctx.store().get(&id).map(|e| e.position) else {
            return false;
        };
        let layout = ctx.layout();
        let start = self.position(&id).unwrap_or_else(|| layout.to_pixel(from));
        let tween = Tween::new(start, layout.to_pixel(to), MOVE_DURATION);

        let positions = Arc::clone(&self.positions);
        let key = id.clone();
        ctx.scheduler_mut().schedule_for(
            id,
            tween.into_step(move |at| {
                positions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key.clone(), at);
            }),
        );
        true
    }

    fn set_position(&self, id: EntityId, at: Point) {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, at);
    }
}

/// Log one line describing the game.
pub fn log_summary(session: &Session<Marker>, view: &View) {
    let ctx = session.context();
    let transport = session.transport().stats();
    let pool = ctx.pool().stats();
    info!(
        state = %transport.state,
        entities = ctx.store().len(),
        units = ctx.store().count(EntityKind::Unit),
        hostile = ctx.store().hostile_count(),
        revealed = ctx.revealed().len(),
        food = %ctx.stockpile().amount(ResourceType::Food),
        gold = %ctx.stockpile().amount(ResourceType::Gold),
        wood = %ctx.stockpile().amount(ResourceType::Wood),
        stone = %ctx.stockpile().amount(ResourceType::Stone),
        aether = %ctx.stockpile().amount(ResourceType::Aether),
        markers = view.len(),
        animations = ctx.scheduler().len(),
        pool_created = pool.created,
        pool_reused = pool.reused,
        pool_idle = pool.idle,
        pending_requests = transport.pending,
        "game summary"
    );
}
