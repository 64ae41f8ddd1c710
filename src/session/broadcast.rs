//! Recomputes a state slice from the store and fans it out to live channels.
//!
//! Every push re-reads the store at call time. Delivery is best effort per
//! recipient: one dead or saturated channel never stops the others.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::store::{
    catalog::{self, CatalogKind},
    characters, chat, npcs,
    participants::{self, Role, RosterEntry},
};

use super::{
    protocol::ServerMessage,
    registry::{ConnectionHandle, Outgoing, Registry},
};

#[derive(Clone)]
pub struct Broadcaster {
    db_pool: SqlitePool,
    registry: Arc<Registry>,
    chat_log_limit: i64,
    dice_history_limit: i64,
}

/// The roster as `recipient_id` may see it. Players lose every other
/// participant's character code; masters see everything.
pub fn roster_for(roster: &[RosterEntry], recipient_id: &str, role: Role) -> Vec<RosterEntry> {
    roster
        .iter()
        .map(|entry| match entry {
            RosterEntry::Participant(participant) if role != Role::Master && participant.id != recipient_id => {
                let mut hidden = participant.clone();
                hidden.character_id = None;
                RosterEntry::Participant(hidden)
            }
            other => other.clone(),
        })
        .collect()
}

impl Broadcaster {
    pub fn new(db_pool: SqlitePool, registry: Arc<Registry>, chat_log_limit: i64, dice_history_limit: i64) -> Self {
        Broadcaster {
            db_pool,
            registry,
            chat_log_limit,
            dice_history_limit,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn dice_history_limit(&self) -> i64 {
        self.dice_history_limit
    }

    pub async fn roster_view(&self, recipient_id: &str, role: Role) -> Result<ServerMessage, sqlx::Error> {
        let roster = participants::roster(&self.db_pool, self.dice_history_limit).await?;
        Ok(ServerMessage::Users(roster_for(&roster, recipient_id, role)))
    }

    pub async fn chat_log(&self) -> Result<ServerMessage, sqlx::Error> {
        Ok(ServerMessage::Messages(chat::recent(&self.db_pool, self.chat_log_limit).await?))
    }

    pub async fn shared_catalog(&self, kind: CatalogKind) -> Result<ServerMessage, sqlx::Error> {
        Ok(match kind {
            CatalogKind::Items => ServerMessage::SharedItems(catalog::list_items(&self.db_pool, None).await?),
            CatalogKind::Abilities => ServerMessage::SharedAbilities(catalog::list_abilities(&self.db_pool, None).await?),
        })
    }

    pub async fn npc_roster(&self, master_id: &str) -> Result<ServerMessage, sqlx::Error> {
        Ok(ServerMessage::Npcs(npcs::list_for_master(&self.db_pool, master_id).await?))
    }

    pub async fn character(&self, participant_id: &str) -> Result<Option<ServerMessage>, sqlx::Error> {
        Ok(characters::get(&self.db_pool, participant_id)
            .await?
            .map(ServerMessage::Character))
    }

    /// Sends each connected participant their own filtered roster.
    pub async fn push_roster(&self) -> Result<(), sqlx::Error> {
        let roster = participants::roster(&self.db_pool, self.dice_history_limit).await?;
        let audience = self.registry.snapshot().await;
        tracing::debug!(recipients = audience.len(), entries = roster.len(), "pushing roster");

        for (participant_id, handle) in &audience {
            let view = roster_for(&roster, participant_id, handle.role);
            handle.send(participant_id, Outgoing::Frame(ServerMessage::Users(view)));
        }
        Ok(())
    }

    pub async fn push_chat_log(&self) -> Result<(), sqlx::Error> {
        let frame = self.chat_log().await?;
        self.push_to_all(frame).await;
        Ok(())
    }

    pub async fn push_shared_catalog(&self, kind: CatalogKind) -> Result<(), sqlx::Error> {
        let frame = self.shared_catalog(kind).await?;
        self.push_to_all(frame).await;
        Ok(())
    }

    /// Only the owning master sees the full NPC list.
    pub async fn push_npc_roster(&self, master_id: &str) -> Result<(), sqlx::Error> {
        let Some(handle) = self.registry.lookup(master_id).await else {
            tracing::warn!(master_id, "master not connected, npc roster not pushed");
            return Ok(());
        };

        let frame = self.npc_roster(master_id).await?;
        handle.send(master_id, Outgoing::Frame(frame));
        Ok(())
    }

    /// Sends a participant their own sheet, if they are connected and have one.
    pub async fn push_character(&self, participant_id: &str) -> Result<(), sqlx::Error> {
        let Some(handle) = self.registry.lookup(participant_id).await else {
            tracing::debug!(participant_id, "not connected, sheet not pushed");
            return Ok(());
        };

        if let Some(frame) = self.character(participant_id).await? {
            handle.send(participant_id, Outgoing::Frame(frame));
        }
        Ok(())
    }

    async fn push_to_all(&self, frame: ServerMessage) {
        let audience: Vec<(String, ConnectionHandle)> = self.registry.snapshot().await;
        tracing::debug!(kind = frame.kind(), recipients = audience.len(), "pushing");

        for (participant_id, handle) in &audience {
            handle.send(participant_id, Outgoing::Frame(frame.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::store::{
        catalog::SharedItemInput,
        participants::Participant,
        testing,
    };

    async fn connect(registry: &Registry, participant: &Participant) -> mpsc::Receiver<Outgoing> {
        let (tx, rx) = mpsc::channel(16);
        registry.register(&participant.id, ConnectionHandle::new(participant.role(), tx)).await;
        rx
    }

    fn users(outgoing: Option<Outgoing>) -> Vec<RosterEntry> {
        match outgoing {
            Some(Outgoing::Frame(ServerMessage::Users(entries))) => entries,
            other => panic!("expected users frame, got {other:?}"),
        }
    }

    fn code_of<'a>(roster: &'a [RosterEntry], id: &str) -> Option<&'a str> {
        roster.iter().find_map(|entry| match entry {
            RosterEntry::Participant(p) if p.id == id => p.character_id.as_deref(),
            _ => None,
        })
    }

    #[tokio::test]
    async fn players_only_see_their_own_character_code() {
        let db_pool = testing::pool().await;
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(db_pool.clone(), registry.clone(), 100, 3);

        let master = testing::master(&db_pool).await;
        let aria = testing::player(&db_pool, "Aria", "101").await;
        let bram = testing::player(&db_pool, "Bram", "202").await;
        let mut master_rx = connect(&registry, &master).await;
        let mut aria_rx = connect(&registry, &aria).await;

        broadcaster.push_roster().await.unwrap();

        let aria_view = users(aria_rx.recv().await);
        assert_eq!(code_of(&aria_view, &aria.id), Some("101"));
        assert_eq!(code_of(&aria_view, &bram.id), None);
        assert_eq!(aria_view.len(), 3);

        let master_view = users(master_rx.recv().await);
        assert_eq!(code_of(&master_view, &aria.id), Some("101"));
        assert_eq!(code_of(&master_view, &bram.id), Some("202"));
    }

    #[tokio::test]
    async fn health_change_reaches_every_channel() {
        let db_pool = testing::pool().await;
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(db_pool.clone(), registry.clone(), 100, 3);

        let master = testing::master(&db_pool).await;
        let aria = testing::player(&db_pool, "Aria", "101").await;
        let mut receivers = vec![connect(&registry, &master).await, connect(&registry, &aria).await];

        participants::update_health(&db_pool, &aria.id, 4).await.unwrap();
        broadcaster.push_roster().await.unwrap();

        for rx in &mut receivers {
            let roster = users(rx.recv().await);
            let hp = roster.iter().find_map(|entry| match entry {
                RosterEntry::Participant(p) if p.id == aria.id => Some(p.health_points),
                _ => None,
            });
            assert_eq!(hp, Some(4));
        }
    }

    #[tokio::test]
    async fn dead_channel_does_not_block_the_rest() {
        let db_pool = testing::pool().await;
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(db_pool.clone(), registry.clone(), 100, 3);

        let master = testing::master(&db_pool).await;
        let aria = testing::player(&db_pool, "Aria", "101").await;
        let dead_rx = connect(&registry, &master).await;
        drop(dead_rx);
        let mut aria_rx = connect(&registry, &aria).await;

        catalog::create_item(&db_pool, &master.id, &SharedItemInput { name: "Rope".into(), ..Default::default() })
            .await
            .unwrap();
        broadcaster.push_shared_catalog(CatalogKind::Items).await.unwrap();

        match aria_rx.recv().await {
            Some(Outgoing::Frame(ServerMessage::SharedItems(items))) => assert_eq!(items.len(), 1),
            other => panic!("expected shared items, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn npc_roster_goes_to_the_owner_only() {
        let db_pool = testing::pool().await;
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(db_pool.clone(), registry.clone(), 100, 3);

        let master = testing::master(&db_pool).await;
        let aria = testing::player(&db_pool, "Aria", "101").await;
        let mut master_rx = connect(&registry, &master).await;
        let mut aria_rx = connect(&registry, &aria).await;

        let input: npcs::NpcInput = serde_json::from_str(r#"{"nickname": "Goblin"}"#).unwrap();
        npcs::create(&db_pool, &master.id, &input).await.unwrap();
        broadcaster.push_npc_roster(&master.id).await.unwrap();

        match master_rx.recv().await {
            Some(Outgoing::Frame(ServerMessage::Npcs(list))) => assert_eq!(list[0].card.nickname, "Goblin"),
            other => panic!("expected npcs, got {other:?}"),
        }
        assert!(aria_rx.try_recv().is_err());

        // Absent master is a logged no-op.
        registry.unregister(&master.id).await;
        broadcaster.push_npc_roster(&master.id).await.unwrap();
    }

    #[tokio::test]
    async fn sheet_push_skips_disconnected_participants() {
        let db_pool = testing::pool().await;
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(db_pool.clone(), registry.clone(), 100, 3);

        let aria = testing::player(&db_pool, "Aria", "101").await;
        broadcaster.push_character(&aria.id).await.unwrap();

        let mut aria_rx = connect(&registry, &aria).await;
        broadcaster.push_character(&aria.id).await.unwrap();
        match aria_rx.recv().await {
            Some(Outgoing::Frame(ServerMessage::Character(sheet))) => assert_eq!(sheet.user_id, aria.id),
            other => panic!("expected character, got {other:?}"),
        }
    }

    #[test]
    fn roster_filter_keeps_npcs_untouched() {
        let npc: npcs::NpcCard = serde_json::from_value(serde_json::json!({
            "id": "npc-1", "masterId": "m", "nickname": "Goblin", "healthPoints": 5,
            "maxHealthPoints": 5, "showHealthBar": true, "healthBarColor": "red",
            "showInChat": true, "notes": "", "createdAt": "2024-01-01T00:00:00.000Z"
        }))
        .unwrap();
        let roster = vec![RosterEntry::Npc(npc)];
        assert_eq!(roster_for(&roster, "someone", Role::Player), roster);
    }
}
