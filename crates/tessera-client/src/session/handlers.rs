//! Built-in handlers translating protocol events into session state.

use tessera_types::{EntityId, EntityPatch, EventKind, Request, ServerEvent};
use tracing::{debug, info};

use super::SessionContext;
use crate::dispatch::Dispatcher;
use crate::error::HandlerError;
use crate::pool::Pooled;
use crate::store::{ChangeSet, StoreChange};
use crate::transport::Transport;

type HandlerResult = Result<(), HandlerError>;

pub(super) fn register<H: Pooled + Send + 'static>(
    dispatcher: &mut Dispatcher<SessionContext<H>>,
    transport: &Transport,
) {
    dispatcher.subscribe(EventKind::EntityAdd, entity_add::<H>);
    dispatcher.subscribe(EventKind::EntityUpdate, entity_update::<H>);
    dispatcher.subscribe(EventKind::EntityMove, entity_move::<H>);
    dispatcher.subscribe(EventKind::EntityRemove, entity_remove::<H>);
    dispatcher.subscribe(EventKind::EntityAttack, entity_attack::<H>);
    dispatcher.subscribe(EventKind::EntityStatusAdd, entity_status::<H>);
    dispatcher.subscribe(EventKind::EntityStatusRemove, entity_status::<H>);
    dispatcher.subscribe(EventKind::EntityProgress, entity_progress::<H>);
    dispatcher.subscribe(EventKind::Resource, resource::<H>);
    dispatcher.subscribe(EventKind::Reveal, reveal::<H>);
    dispatcher.subscribe(EventKind::GameEnd, game_end::<H>);
    dispatcher.subscribe(EventKind::Disconnected, disconnected::<H>);

    let transport = transport.clone();
    dispatcher.subscribe(EventKind::Connect, move |ctx: &mut SessionContext<H>, _| {
        if let Some(game) = ctx.game.clone() {
            info!(%game, "connection restored, renewing game subscription");
            transport.fire(Request::GameSubscribe { game });
        }
        Ok(())
    });
}

fn entity_add<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    let ServerEvent::EntityAdd { entity } = event else {
        return Ok(());
    };
    ctx.store.apply_add(entity.clone())?;
    ctx.changes.push_back(StoreChange::Added(entity.id.clone()));
    Ok(())
}

fn entity_update<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    let ServerEvent::EntityUpdate { id, fields } = event else {
        return Ok(());
    };
    let changes = ctx.store.apply_update(id, fields)?;
    push_changed(ctx, id, changes);
    Ok(())
}

fn entity_move<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    let ServerEvent::EntityMove { id, position } = event else {
        return Ok(());
    };
    let changes = ctx.store.apply_update(id, &EntityPatch::position(*position))?;
    push_changed(ctx, id, changes);
    Ok(())
}

fn entity_remove<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    let ServerEvent::EntityRemove { id } = event else {
        return Ok(());
    };
    match ctx.store.apply_remove(id) {
        Some(snapshot) => {
            ctx.scheduler.cancel_for(id);
            ctx.changes.push_back(StoreChange::Removed(snapshot));
        }
        None => debug!(entity = %id, "remove for absent entity ignored"),
    }
    Ok(())
}

fn entity_attack<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    let ServerEvent::EntityAttack { id, target } = event else {
        return Ok(());
    };
    if !ctx.store.contains(id) {
        debug!(entity = %id, "attack by absent entity ignored");
        return Ok(());
    }
    ctx.changes.push_back(StoreChange::Attacked {
        attacker: id.clone(),
        target: target.clone(),
    });
    Ok(())
}

fn entity_status<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    let (id, changes) = match event {
        ServerEvent::EntityStatusAdd { id, status } => (id, ctx.store.add_status(id, status)?),
        ServerEvent::EntityStatusRemove { id, status } => {
            (id, ctx.store.remove_status(id, status)?)
        }
        _ => return Ok(()),
    };
    push_changed(ctx, id, changes);
    Ok(())
}

fn entity_progress<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    let ServerEvent::EntityProgress { id, progress } = event else {
        return Ok(());
    };
    let changes = ctx.store.set_progress(id, *progress)?;
    push_changed(ctx, id, changes);
    Ok(())
}

fn resource<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    let ServerEvent::Resource {
        resource_type,
        amount,
    } = event
    else {
        return Ok(());
    };
    let total = ctx.stockpile.credit(*resource_type, *amount);
    debug!(resource = ?resource_type, %amount, %total, "stockpile credited");
    Ok(())
}

fn reveal<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    if let ServerEvent::Reveal { cells } = event {
        ctx.revealed.extend(cells.iter().copied());
    }
    Ok(())
}

fn game_end<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    if let ServerEvent::GameEnd(outcome) = event {
        info!(victory = ?outcome.victory, reason = ?outcome.reason, "game over");
        ctx.outcome = Some(outcome.clone());
    }
    Ok(())
}

fn disconnected<H>(ctx: &mut SessionContext<H>, event: &ServerEvent) -> HandlerResult {
    if let (ServerEvent::Disconnected { reason }, Some(game)) = (event, ctx.game.as_ref()) {
        info!(%game, reason, "connection lost, game view will resume after reconnect");
    }
    Ok(())
}

fn push_changed<H>(ctx: &mut SessionContext<H>, id: &EntityId, changes: ChangeSet) {
    if !changes.is_empty() {
        ctx.changes.push_back(StoreChange::Changed {
            id: id.clone(),
            changes,
        });
    }
}
