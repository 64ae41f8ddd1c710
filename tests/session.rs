mod common;

use common::*;
use rpgsession::{
    session::protocol::ServerMessage,
    store::participants::RosterEntry,
};
use serde_json::json;

fn kind(frame: &ServerMessage) -> &'static str {
    frame.kind()
}

fn health_of(frame: &ServerMessage, id: &str) -> Option<i64> {
    match frame {
        ServerMessage::Users(roster) => roster.iter().find_map(|entry| match entry {
            RosterEntry::Participant(p) if p.id == id => Some(p.health_points),
            _ => None,
        }),
        _ => None,
    }
}

#[tokio::test]
async fn player_receives_snapshots_in_order() {
    let addr = spawn_server().await;
    let aria = login_player(addr, "Aria", "101").await;
    let mut ws = ws_connect(addr, &aria.id).await;

    let mut kinds = Vec::new();
    for _ in 0..5 {
        kinds.push(kind(&ws_recv(&mut ws).await));
    }
    assert_eq!(kinds, ["users", "messages", "character", "shared_items", "shared_abilities"]);
}

#[tokio::test]
async fn chat_message_reaches_everyone() {
    let addr = spawn_server().await;
    let master = login_master(addr).await;
    let aria = login_player(addr, "Aria", "101").await;

    let mut master_ws = ws_connect(addr, &master.id).await;
    ws_drain_snapshots(&mut master_ws, true).await;
    let mut aria_ws = ws_connect(addr, &aria.id).await;
    ws_drain_snapshots(&mut aria_ws, false).await;

    ws_send(&mut aria_ws, json!({"type": "message", "content": "hello"})).await;

    for ws in [&mut aria_ws, &mut master_ws] {
        let frame = ws_expect(ws, |frame| matches!(frame, ServerMessage::Messages(log) if !log.is_empty())).await;
        let ServerMessage::Messages(log) = frame else { unreachable!() };
        let last = log.last().unwrap();
        assert_eq!(last.content, "hello");
        assert_eq!(last.nickname, "Aria");
    }
}

#[tokio::test]
async fn master_health_update_is_pushed_to_all() {
    let addr = spawn_server().await;
    let master = login_master(addr).await;
    let aria = login_player(addr, "Aria", "101").await;

    let mut master_ws = ws_connect(addr, &master.id).await;
    ws_drain_snapshots(&mut master_ws, true).await;
    let mut aria_ws = ws_connect(addr, &aria.id).await;
    ws_drain_snapshots(&mut aria_ws, false).await;

    ws_send(&mut master_ws, json!({"type": "update_health", "userId": aria.id, "healthPoints": 3})).await;

    for ws in [&mut master_ws, &mut aria_ws] {
        ws_expect(ws, |frame| health_of(frame, &aria.id) == Some(3)).await;
    }
}

#[tokio::test]
async fn player_roster_hides_other_codes() {
    let addr = spawn_server().await;
    let aria = login_player(addr, "Aria", "101").await;
    let bram = login_player(addr, "Bram", "202").await;

    let mut ws = ws_connect(addr, &aria.id).await;
    let ServerMessage::Users(roster) = ws_recv(&mut ws).await else {
        panic!("roster must come first");
    };

    let code = |id: &str| {
        roster.iter().find_map(|entry| match entry {
            RosterEntry::Participant(p) if p.id == id => Some(p.character_id.clone()),
            _ => None,
        })
    };
    assert_eq!(code(&aria.id), Some(Some("101".to_owned())));
    assert_eq!(code(&bram.id), Some(None));
}

#[tokio::test]
async fn unknown_participant_is_closed() {
    let addr = spawn_server().await;
    let mut ws = ws_connect(addr, "nobody").await;
    assert_eq!(ws_expect_close(&mut ws).await, 1000);
}

#[tokio::test]
async fn reconnect_closes_the_stale_socket() {
    let addr = spawn_server().await;
    let aria = login_player(addr, "Aria", "101").await;

    let mut first = ws_connect(addr, &aria.id).await;
    ws_drain_snapshots(&mut first, false).await;
    let mut second = ws_connect(addr, &aria.id).await;
    ws_drain_snapshots(&mut second, false).await;

    assert_eq!(ws_expect_close(&mut first).await, 4000);

    // The replacement keeps working.
    ws_send(&mut second, json!({"type": "message", "content": "still here"})).await;
    ws_expect(&mut second, |frame| matches!(frame, ServerMessage::Messages(log) if !log.is_empty())).await;
}

#[tokio::test]
async fn deleting_a_character_closes_their_socket() {
    let addr = spawn_server().await;
    let master = login_master(addr).await;
    let aria = login_player(addr, "Aria", "101").await;

    let mut master_ws = ws_connect(addr, &master.id).await;
    ws_drain_snapshots(&mut master_ws, true).await;
    let mut aria_ws = ws_connect(addr, &aria.id).await;
    ws_drain_snapshots(&mut aria_ws, false).await;

    let response = client()
        .delete(format!("http://{addr}/api/master/characters/101"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    assert_eq!(ws_expect_close(&mut aria_ws).await, 1000);
    ws_expect(&mut master_ws, |frame| match frame {
        ServerMessage::Users(roster) => roster.iter().all(|entry| entry.id() != aria.id),
        _ => false,
    })
    .await;

    let response = client()
        .get(format!("http://{addr}/api/character/{}", aria.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn master_rolls_for_an_npc() {
    let addr = spawn_server().await;
    let master = login_master(addr).await;

    let response = client()
        .post(format!("http://{addr}/api/npcs?master_id={}", master.id))
        .json(&json!({"nickname": "Goblin", "showInChat": true}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let npcs: serde_json::Value = response.json().await.unwrap();
    let npc_id = npcs[0]["id"].as_str().unwrap().to_owned();

    let mut ws = ws_connect(addr, &master.id).await;
    let ServerMessage::Users(roster) = ws_recv(&mut ws).await else {
        panic!("roster must come first");
    };
    assert!(roster.iter().any(|entry| matches!(entry, RosterEntry::Npc(npc) if npc.id == npc_id)));
    for _ in 0..5 {
        ws_recv(&mut ws).await;
    }

    ws_send(&mut ws, json!({"type": "dice_roll", "diceType": "d20", "characterId": npc_id})).await;
    let frame = ws_expect(&mut ws, |frame| matches!(frame, ServerMessage::Messages(log) if !log.is_empty())).await;
    let ServerMessage::Messages(log) = frame else { unreachable!() };
    let roll = log.last().unwrap();
    assert!(roll.is_dice_roll);
    assert_eq!(roll.nickname, "Goblin");
    assert!(roll.content.starts_with("Goblin rolled d20: "));

    // The roster refresh carries the roll in the master's history.
    ws_expect(&mut ws, |frame| match frame {
        ServerMessage::Users(roster) => roster.iter().any(|entry| {
            matches!(entry, RosterEntry::Participant(p) if p.id == master.id && p.dice_results == vec![roll.dice_result.unwrap()])
        }),
        _ => false,
    })
    .await;
}

#[tokio::test]
async fn shared_item_update_is_broadcast_each_time() {
    let addr = spawn_server().await;
    let master = login_master(addr).await;
    let mut ws = ws_connect(addr, &master.id).await;
    ws_drain_snapshots(&mut ws, true).await;

    ws_send(&mut ws, json!({"type": "add_shared_item", "item": {"id": "item-rope", "name": "Rope"}})).await;
    ws_expect(&mut ws, |frame| matches!(frame, ServerMessage::SharedItems(items) if items.len() == 1)).await;

    let update = json!({"type": "update_shared_item", "item": {"id": "item-rope", "name": "Silk Rope"}});
    for _ in 0..2 {
        ws_send(&mut ws, update.clone()).await;
        let frame = ws_expect(&mut ws, |frame| matches!(frame, ServerMessage::SharedItems(_))).await;
        let ServerMessage::SharedItems(items) = frame else { unreachable!() };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Silk Rope");
    }
}
