//! Integration tests for the session lifecycle: join, live event flow,
//! resubscription after reconnect and reset.

// Integration tests use unwrap/expect freely and index JSON by key.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::items_after_statements,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

mod common;

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tessera_client::{ClientError, EntityField, Pooled, Session, StoreChange};
use tessera_types::{EntityId, EntityKind, EventKind, GameId, Hex, ResourceType, ServerEvent};

use common::{FakeServer, ServerConn, transport};

#[derive(Debug, Default)]
struct Sprite {
    attached: bool,
}

impl Pooled for Sprite {
    fn detach(&mut self) {
        self.attached = false;
    }
}

fn snapshot() -> Value {
    json!({
        "id": "g1",
        "player": "u1",
        "state": "active",
        "entities": {
            "hall": {
                "entity_type": "structure",
                "id": "hall",
                "position": {"q": 0, "r": 0},
                "hp": 100,
                "max_hp": 100,
                "structure_type": "town_hall"
            },
            "w1": {
                "entity_type": "worker",
                "id": "w1",
                "position": {"q": 1, "r": 0},
                "hp": 1,
                "max_hp": 1
            }
        },
        "food": 100.0,
        "gold": 50,
        "stone": 0,
        "wood": 25,
        "aether": 0
    })
}

/// Serve one `game/get` + `game/subscribe` exchange.
async fn serve_join(conn: &mut ServerConn) {
    let get = conn.recv_request().await.unwrap();
    assert_eq!(get["type"], "game/get");
    assert_eq!(get["game"], "g1");
    conn.reply(&get, snapshot());

    let subscribe = conn.recv_request().await.unwrap();
    assert_eq!(subscribe["type"], "game/subscribe");
    assert_eq!(subscribe["game"], "g1");
    conn.reply(&subscribe, json!({"type": "success"}));
}

async fn joined() -> (Session<Sprite>, FakeServer, ServerConn) {
    let (transport, events, mut server) = transport();
    let mut session = Session::new(transport.clone(), events);
    let (started, mut conn) = tokio::join!(transport.start(), server.accept_and_handshake());
    started.unwrap();

    let (joined, ()) = tokio::join!(session.join(GameId::new("g1")), serve_join(&mut conn));
    joined.unwrap();
    (session, server, conn)
}

/// Let the reader task route everything already written.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn join_hydrates_store_and_stockpile() {
    let (mut session, _server, _conn) = joined().await;
    let ctx = session.context();

    assert_eq!(ctx.game(), Some(&GameId::new("g1")));
    assert_eq!(ctx.store().len(), 2);
    assert_eq!(ctx.store().count(EntityKind::Unit), 1);
    assert_eq!(ctx.store().count(EntityKind::Structure), 1);
    assert_eq!(
        ctx.store().at(Hex::new(1, 0)).map(|e| e.id.clone()),
        Some(EntityId::new("w1"))
    );
    assert_eq!(ctx.stockpile().amount(ResourceType::Food), dec!(100));
    assert_eq!(ctx.stockpile().amount(ResourceType::Gold), dec!(50));
    assert_eq!(ctx.stockpile().amount(ResourceType::Wood), dec!(25));

    let added: Vec<_> = session
        .drain_changes()
        .into_iter()
        .filter_map(|change| match change {
            StoreChange::Added(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(added.len(), 2);
    assert!(added.contains(&EntityId::new("hall")));
    assert!(added.contains(&EntityId::new("w1")));
}

#[tokio::test(start_paused = true)]
async fn join_discards_events_queued_before_it() {
    let (transport, events, mut server) = transport();
    let mut session: Session<Sprite> = Session::new(transport.clone(), events);
    let (started, mut conn) = tokio::join!(transport.start(), server.accept_and_handshake());
    started.unwrap();
    conn.send(json!({"type": "entity/remove", "id": "stale"}));
    settle().await;

    let (joined, ()) = tokio::join!(session.join(GameId::new("g1")), serve_join(&mut conn));
    joined.unwrap();
    assert_eq!(session.pump(), 0);
    assert_eq!(session.context().store().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn live_events_update_the_store_in_order() {
    let (mut session, _server, conn) = joined().await;
    session.drain_changes();

    conn.send(json!({
        "type": "entity/add",
        "entity": {
            "entity_type": "unit",
            "id": "raider",
            "position": {"q": 3, "r": -1},
            "hp": 4,
            "max_hp": 4,
            "alignment": "enemy"
        }
    }));
    conn.send(json!({"type": "entity/move", "id": "w1", "position": {"q": 2, "r": 0}}));
    conn.send(json!({"type": "entity/update", "id": "raider", "fields": {"hp": 2}}));
    conn.send(json!({"type": "resource", "resource_type": "wood", "amount": 5}));
    conn.send(json!({"type": "reveal", "cells": [{"q": 4, "r": 0}, {"q": 4, "r": -1}]}));

    for expected in [
        EventKind::EntityAdd,
        EventKind::EntityMove,
        EventKind::EntityUpdate,
        EventKind::Resource,
        EventKind::Reveal,
    ] {
        assert_eq!(session.next().await.map(|e| e.kind()), Some(expected));
    }

    let ctx = session.context();
    assert_eq!(ctx.store().hostile_count(), 1);
    assert_eq!(ctx.store().get(&EntityId::new("raider")).map(|e| e.hp), Some(2));
    assert_eq!(
        ctx.store().get(&EntityId::new("w1")).map(|e| e.position),
        Some(Hex::new(2, 0))
    );
    assert!(ctx.store().at(Hex::new(1, 0)).is_none());
    assert_eq!(ctx.stockpile().amount(ResourceType::Wood), dec!(30));
    assert!(ctx.revealed().contains(&Hex::new(4, -1)));

    let changes = session.drain_changes();
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[0], StoreChange::Added(EntityId::new("raider")));
    match &changes[1] {
        StoreChange::Changed { id, changes } => {
            assert_eq!(id, &EntityId::new("w1"));
            assert!(changes.contains(EntityField::Position));
            assert_eq!(changes.previous_position, Some(Hex::new(1, 0)));
        }
        other => panic!("expected a move, got {other:?}"),
    }
    match &changes[2] {
        StoreChange::Changed { changes, .. } => assert!(changes.contains(EntityField::Hp)),
        other => panic!("expected an hp change, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn pump_dispatches_everything_queued() {
    let (mut session, _server, conn) = joined().await;
    conn.send(json!({"type": "entity/remove", "id": "w1"}));
    conn.send(json!({"type": "entity/remove", "id": "w1"}));
    conn.send(json!({"type": "entity/remove", "id": "hall"}));
    settle().await;

    assert_eq!(session.pump(), 3);
    assert!(session.context().store().is_empty());
    assert_eq!(session.pump(), 0);
}

#[tokio::test(start_paused = true)]
async fn removed_entity_handle_is_reused_for_the_next_arrival() {
    let (mut session, _server, conn) = joined().await;
    let mut sprites: HashMap<EntityId, Sprite> = HashMap::new();
    for change in session.drain_changes() {
        if let StoreChange::Added(id) = change {
            let sprite = session
                .context_mut()
                .pool_mut()
                .acquire("sprite", || Sprite { attached: true });
            assert!(sprite.attached, "fresh handle for {id}");
            sprites.insert(id, sprite);
        }
    }
    assert_eq!(session.context().pool().stats().created, 2);
    assert_eq!(session.context().pool().idle("sprite"), 0);

    conn.send(json!({"type": "entity/remove", "id": "w1"}));
    session.next().await.unwrap();
    for change in session.drain_changes() {
        if let StoreChange::Removed(entity) = change {
            let sprite = sprites.remove(&entity.id).unwrap();
            session.context_mut().pool_mut().release("sprite", sprite);
        }
    }
    assert_eq!(session.context().pool().idle("sprite"), 1);
    assert!(!sprites.contains_key(&EntityId::new("w1")));

    conn.send(json!({
        "type": "entity/add",
        "entity": {"entity_type": "unit", "id": "w2", "position": {"q": 2, "r": 0}}
    }));
    session.next().await.unwrap();
    let added = session.drain_changes();
    assert_eq!(added, vec![StoreChange::Added(EntityId::new("w2"))]);

    let reused = session
        .context_mut()
        .pool_mut()
        .acquire("sprite", || Sprite { attached: true });
    assert!(!reused.attached, "reused handle comes back detached");

    let stats = session.context().pool().stats();
    assert_eq!(stats.created, 2);
    assert_eq!(stats.reused, 1);
    assert_eq!(stats.released, 1);
    assert_eq!(session.context().pool().idle("sprite"), 0);
}

#[tokio::test(start_paused = true)]
async fn reconnect_renews_the_game_subscription() {
    let (mut session, mut server, conn) = joined().await;
    drop(conn);
    assert_eq!(
        session.next().await.map(|e| e.kind()),
        Some(EventKind::Disconnected)
    );

    let mut conn = server.accept_and_handshake().await;
    assert_eq!(session.next().await, Some(ServerEvent::Connect));

    let subscribe = conn.recv_request().await.unwrap();
    assert_eq!(subscribe["type"], "game/subscribe");
    assert_eq!(subscribe["game"], "g1");
    conn.reply(&subscribe, json!({"type": "success"}));

    assert_eq!(session.context().store().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_join_leaves_session_reset() {
    let (transport, events, mut server) = transport();
    let mut session: Session<Sprite> = Session::new(transport.clone(), events);
    let (started, mut conn) = tokio::join!(transport.start(), server.accept_and_handshake());
    started.unwrap();

    let server_side = async {
        let get = conn.recv_request().await.unwrap();
        conn.reply(&get, json!({"type": "error", "reason": "Game not found"}));
    };
    let (joined, ()) = tokio::join!(session.join(GameId::new("g1")), server_side);

    assert!(matches!(joined, Err(ClientError::RemoteError { .. })));
    assert!(session.context().game().is_none());
    assert!(session.context().store().is_empty());
    assert_eq!(session.context().pending_changes(), 0);
}

#[tokio::test(start_paused = true)]
async fn game_end_records_outcome_and_reset_clears_it() {
    let (mut session, _server, conn) = joined().await;
    conn.send(json!({"type": "game/end", "victory": true, "reason": "hall stands"}));
    session.next().await.unwrap();
    assert_eq!(
        session.context().outcome().and_then(|o| o.victory),
        Some(true)
    );

    session.reset();
    let ctx = session.context();
    assert!(ctx.outcome().is_none());
    assert!(ctx.game().is_none());
    assert!(ctx.store().is_empty());
    assert_eq!(ctx.stockpile().amount(ResourceType::Food), dec!(0));
    assert!(ctx.revealed().is_empty());
}
