use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::{
    characters::{Ability, Attributes, InventoryItem, SheetUpdate, Skill, NPC_TABLES},
    prefixed_id,
};

/// The roster-facing part of an NPC.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcCard {
    pub id: String,
    pub master_id: String,
    pub nickname: String,
    pub health_points: i64,
    pub max_health_points: i64,
    pub show_health_bar: bool,
    pub health_bar_color: String,
    pub show_in_chat: bool,
    pub notes: String,
    pub created_at: String,
    #[sqlx(skip)]
    #[serde(default = "yes")]
    pub is_npc: bool,
    #[sqlx(skip)]
    #[serde(default)]
    pub dice_results: Vec<i64>,
}

fn yes() -> bool {
    true
}

fn green() -> String {
    "green".to_owned()
}

fn ten() -> i64 {
    10
}

/// Card plus sheet, as the owning master sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    #[serde(flatten)]
    pub card: NpcCard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcInput {
    pub nickname: String,
    #[serde(default = "ten")]
    pub health_points: i64,
    #[serde(default = "ten")]
    pub max_health_points: i64,
    #[serde(default = "yes")]
    pub show_health_bar: bool,
    #[serde(default = "green")]
    pub health_bar_color: String,
    #[serde(default)]
    pub show_in_chat: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub sheet: SheetUpdate,
}

const SELECT_CARD: &str = "SELECT id,master_id,nickname,health_points,max_health_points,show_health_bar,health_bar_color,show_in_chat,notes,created_at FROM npcs";

fn mark(mut card: NpcCard) -> NpcCard {
    card.is_npc = true;
    card
}

/// Creates the NPC and its sheet in one transaction; returns the new id.
pub async fn create(db_pool: &SqlitePool, master_id: &str, input: &NpcInput) -> Result<String, sqlx::Error> {
    let id = prefixed_id("npc");

    let mut tx = db_pool.begin().await?;
    sqlx::query(
        "INSERT INTO npcs (id,master_id,nickname,health_points,max_health_points,show_health_bar,health_bar_color,show_in_chat,notes)
         VALUES (?,?,?,?,?,?,?,?,?)",
    )
    .bind(&id)
    .bind(master_id)
    .bind(&input.nickname)
    .bind(input.health_points)
    .bind(input.max_health_points)
    .bind(input.show_health_bar)
    .bind(&input.health_bar_color)
    .bind(input.show_in_chat)
    .bind(&input.notes)
    .execute(&mut *tx)
    .await?;

    let sheet = SheetUpdate {
        attributes: Some(input.sheet.attributes.unwrap_or_default()),
        ..input.sheet.clone()
    };
    NPC_TABLES.write(&mut tx, &id, &sheet).await?;
    tx.commit().await?;

    tracing::info!(npc_id = %id, master_id, nickname = %input.nickname, "npc created");
    Ok(id)
}

pub async fn find_card(db_pool: &SqlitePool, npc_id: &str) -> Result<Option<NpcCard>, sqlx::Error> {
    let card: Option<NpcCard> = sqlx::query_as(&format!("{SELECT_CARD} WHERE id=?"))
        .bind(npc_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(card.map(mark))
}

/// Every NPC flagged show-in-chat, whoever owns it.
pub async fn chat_visible(db_pool: &SqlitePool) -> Result<Vec<NpcCard>, sqlx::Error> {
    let cards: Vec<NpcCard> = sqlx::query_as(&format!("{SELECT_CARD} WHERE show_in_chat=1 ORDER BY created_at,rowid"))
        .fetch_all(db_pool)
        .await?;
    Ok(cards.into_iter().map(mark).collect())
}

pub async fn get(db_pool: &SqlitePool, npc_id: &str) -> Result<Option<Npc>, sqlx::Error> {
    match find_card(db_pool, npc_id).await? {
        Some(card) => Ok(Some(with_sheet(db_pool, card).await?)),
        None => Ok(None),
    }
}

pub async fn list_for_master(db_pool: &SqlitePool, master_id: &str) -> Result<Vec<Npc>, sqlx::Error> {
    let cards: Vec<NpcCard> = sqlx::query_as(&format!("{SELECT_CARD} WHERE master_id=? ORDER BY created_at,rowid"))
        .bind(master_id)
        .fetch_all(db_pool)
        .await?;

    let mut npcs = Vec::with_capacity(cards.len());
    for card in cards {
        npcs.push(with_sheet(db_pool, mark(card)).await?);
    }
    Ok(npcs)
}

async fn with_sheet(db_pool: &SqlitePool, card: NpcCard) -> Result<Npc, sqlx::Error> {
    Ok(Npc {
        attributes: NPC_TABLES.read_attributes(db_pool, &card.id).await?,
        skills: NPC_TABLES.read_skills(db_pool, &card.id).await?,
        abilities: NPC_TABLES.read_abilities(db_pool, &card.id).await?,
        inventory: NPC_TABLES.read_inventory(db_pool, &card.id).await?,
        card,
    })
}

/// Rewrites the card and any sheet sections present. `false` if no such NPC.
pub async fn update(db_pool: &SqlitePool, npc_id: &str, input: &NpcInput) -> Result<bool, sqlx::Error> {
    let mut tx = db_pool.begin().await?;
    let result = sqlx::query(
        "UPDATE npcs SET nickname=?,health_points=?,max_health_points=?,show_health_bar=?,health_bar_color=?,show_in_chat=?,notes=?
         WHERE id=?",
    )
    .bind(&input.nickname)
    .bind(input.health_points)
    .bind(input.max_health_points)
    .bind(input.show_health_bar)
    .bind(&input.health_bar_color)
    .bind(input.show_in_chat)
    .bind(&input.notes)
    .bind(npc_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    NPC_TABLES.write(&mut tx, npc_id, &input.sheet).await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn delete(db_pool: &SqlitePool, npc_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM npcs WHERE id=?")
        .bind(npc_id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
