//! One client's participation in one live game.
//!
//! [`SessionContext`] owns all per-game state: the entity store, the handle
//! pool, the animation scheduler, the stockpile, revealed cells, the
//! outcome and the queue of renderer notifications. [`Session`] couples a
//! context with the dispatch table and the transport's ordered event
//! stream, and drives the join/leave lifecycle. Nothing here is global;
//! dropping or resetting the session drops every trace of the game.

mod handlers;

use std::collections::{BTreeSet, VecDeque};

use tessera_grid::{Hex, HexLayout};
use tessera_types::{EventKind, GameId, GameOutcome, GameSnapshot, Request, ServerEvent};
use tracing::{info, warn};

use crate::dispatch::{Dispatcher, HandlerId};
use crate::error::{ClientError, HandlerError};
use crate::pool::{Pooled, ResourcePool};
use crate::scheduler::Scheduler;
use crate::stockpile::Stockpile;
use crate::store::{EntityStore, StoreChange};
use crate::transport::{EventReceiver, Transport};

/// Per-game state, mutated only by event handlers.
#[derive(Debug)]
pub struct SessionContext<H> {
    store: EntityStore,
    pool: ResourcePool<H>,
    scheduler: Scheduler,
    stockpile: Stockpile,
    revealed: BTreeSet<Hex>,
    outcome: Option<GameOutcome>,
    game: Option<GameId>,
    changes: VecDeque<StoreChange>,
    layout: HexLayout,
}

impl<H: Pooled> SessionContext<H> {
    /// Empty context projecting cells with `layout`.
    pub fn new(layout: HexLayout) -> Self {
        Self {
            store: EntityStore::new(),
            pool: ResourcePool::new(),
            scheduler: Scheduler::new(),
            stockpile: Stockpile::new(),
            revealed: BTreeSet::new(),
            outcome: None,
            game: None,
            changes: VecDeque::new(),
            layout,
        }
    }

    /// The entity mirror. Read-only outside event handlers.
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The presentation handle pool.
    pub const fn pool_mut(&mut self) -> &mut ResourcePool<H> {
        &mut self.pool
    }

    /// The presentation handle pool.
    pub const fn pool(&self) -> &ResourcePool<H> {
        &self.pool
    }

    /// The animation scheduler.
    pub const fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The animation scheduler.
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Resource totals.
    pub const fn stockpile(&self) -> &Stockpile {
        &self.stockpile
    }

    /// Every cell revealed so far.
    pub const fn revealed(&self) -> &BTreeSet<Hex> {
        &self.revealed
    }

    /// How the game ended, once it has.
    pub const fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    /// The joined game.
    pub const fn game(&self) -> Option<&GameId> {
        self.game.as_ref()
    }

    /// Pixel projection for this session.
    pub const fn layout(&self) -> HexLayout {
        self.layout
    }

    /// Renderer notifications not yet drained.
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    /// Take every queued renderer notification, oldest first.
    pub fn drain_changes(&mut self) -> Vec<StoreChange> {
        self.changes.drain(..).collect()
    }

    /// Forget everything about the current game.
    pub fn reset(&mut self) {
        self.store.clear();
        self.pool.clear();
        self.scheduler.clear();
        self.stockpile.clear();
        self.revealed.clear();
        self.outcome = None;
        self.game = None;
        self.changes.clear();
    }

    /// Load a full snapshot into an empty context.
    fn hydrate(&mut self, snapshot: GameSnapshot) {
        self.stockpile.hydrate(snapshot.totals());
        for (key, entity) in snapshot.entities {
            if key != entity.id {
                warn!(%key, entity = %entity.id, "snapshot key differs from entity id");
            }
            let id = entity.id.clone();
            match self.store.apply_add(entity) {
                Ok(()) => self.changes.push_back(StoreChange::Added(id)),
                Err(e) => warn!(error = %e, "dropping snapshot entity"),
            }
        }
    }
}

/// A context wired to a transport.
#[derive(Debug)]
pub struct Session<H> {
    transport: Transport,
    events: EventReceiver,
    dispatcher: Dispatcher<SessionContext<H>>,
    context: SessionContext<H>,
}

impl<H: Pooled + Send + 'static> Session<H> {
    /// Build a session over `transport`, consuming its event stream, with
    /// the built-in handlers registered.
    pub fn new(transport: Transport, events: EventReceiver) -> Self {
        let context = SessionContext::new(transport.config().layout());
        let mut dispatcher = Dispatcher::new();
        handlers::register(&mut dispatcher, &transport);
        Self {
            transport,
            events,
            dispatcher,
            context,
        }
    }

    /// Switch to `game`: reset, fetch and load its snapshot, then subscribe
    /// to its event stream. The subscription is renewed after every
    /// reconnect until the next join or reset.
    ///
    /// On failure the session is left reset.
    ///
    /// # Errors
    ///
    /// Whatever the `game/get` or `game/subscribe` request fails with.
    pub async fn join(&mut self, game: GameId) -> Result<(), ClientError> {
        self.reset();
        let mut discarded: usize = 0;
        while self.events.try_recv().is_ok() {
            discarded = discarded.saturating_add(1);
        }

        let result = self.load(&game).await;
        match result {
            Ok(()) => {
                info!(
                    %game,
                    entities = self.context.store.len(),
                    discarded,
                    "joined game"
                );
                self.context.game = Some(game);
                Ok(())
            }
            Err(e) => {
                warn!(%game, error = %e, "join failed");
                self.reset();
                Err(e)
            }
        }
    }

    async fn load(&mut self, game: &GameId) -> Result<(), ClientError> {
        let snapshot: GameSnapshot = self
            .transport
            .send_as(Request::GameGet { game: game.clone() })
            .await?;
        self.context.hydrate(snapshot);
        self.transport
            .send(Request::GameSubscribe { game: game.clone() })
            .await?;
        Ok(())
    }

    /// Wait for the next inbound event and dispatch it. Returns the event,
    /// or `None` once the transport is gone.
    pub async fn next(&mut self) -> Option<ServerEvent> {
        let event = self.events.recv().await?;
        self.dispatch(&event);
        Some(event)
    }

    /// Dispatch every event already queued, without waiting. Returns how
    /// many were dispatched.
    pub fn pump(&mut self) -> usize {
        let mut dispatched: usize = 0;
        while let Ok(event) = self.events.try_recv() {
            self.dispatch(&event);
            dispatched = dispatched.saturating_add(1);
        }
        dispatched
    }

    /// Run one event through the dispatch table.
    pub fn dispatch(&mut self, event: &ServerEvent) -> usize {
        self.dispatcher.dispatch(&mut self.context, event)
    }

    /// Register an extra handler, run after the built-ins.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> HandlerId
    where
        F: FnMut(&mut SessionContext<H>, &ServerEvent) -> Result<(), HandlerError> + Send + 'static,
    {
        self.dispatcher.subscribe(kind, handler)
    }

    /// Remove a handler registered with [`Session::subscribe`].
    pub fn unsubscribe(&mut self, kind: EventKind, id: HandlerId) -> bool {
        self.dispatcher.unsubscribe(kind, id)
    }

    /// Take every queued renderer notification.
    pub fn drain_changes(&mut self) -> Vec<StoreChange> {
        self.context.drain_changes()
    }

    /// Leave the current game and clear all per-game state.
    pub fn reset(&mut self) {
        if let Some(game) = self.context.game() {
            info!(%game, "leaving game");
        }
        self.context.reset();
    }

    /// The per-game state.
    pub const fn context(&self) -> &SessionContext<H> {
        &self.context
    }

    /// The per-game state, for renderer-owned parts (pool, scheduler).
    pub const fn context_mut(&mut self) -> &mut SessionContext<H> {
        &mut self.context
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }
}
