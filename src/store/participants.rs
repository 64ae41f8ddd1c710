use std::collections::HashSet;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::npcs::{self, NpcCard};

pub const DEFAULT_SKILLS: [&str; 8] = [
    "Athletics", "Acrobatics", "Stealth", "Arcana",
    "History", "Nature", "Perception", "Persuasion",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Master,
    Player,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub nickname: String,
    pub is_master: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    pub health_points: i64,
    pub max_health_points: i64,
    pub created_at: String,
    /// Most recent first.
    #[sqlx(skip)]
    #[serde(default)]
    pub dice_results: Vec<i64>,
    #[sqlx(skip)]
    #[serde(default)]
    pub is_npc: bool,
}

impl Participant {
    pub fn role(&self) -> Role {
        if self.is_master { Role::Master } else { Role::Player }
    }
}

/// One line of the live roster: a participant or a chat-visible NPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RosterEntry {
    Npc(NpcCard),
    Participant(Participant),
}

impl RosterEntry {
    pub fn id(&self) -> &str {
        match self {
            RosterEntry::Npc(npc) => &npc.id,
            RosterEntry::Participant(participant) => &participant.id,
        }
    }
}

/// A character code is exactly three ASCII digits.
pub fn is_valid_character_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit())
}

const SELECT_PARTICIPANT: &str = "SELECT id,nickname,is_master,character_id,health_points,max_health_points,created_at FROM participants";

/// Creates the participant together with a default sheet, atomically.
pub async fn create(
    db_pool: &SqlitePool,
    nickname: &str,
    role: Role,
    character_id: Option<&str>,
) -> Result<Participant, sqlx::Error> {
    let id = Uuid::now_v7().to_string();
    let character_id = match role {
        Role::Master => None,
        Role::Player => character_id,
    };

    let mut tx = db_pool.begin().await?;
    sqlx::query("INSERT INTO participants (id,nickname,is_master,character_id) VALUES (?,?,?,?)")
        .bind(&id)
        .bind(nickname)
        .bind(role == Role::Master)
        .bind(character_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO attributes (user_id) VALUES (?)")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO currency (user_id) VALUES (?)")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    for skill in DEFAULT_SKILLS {
        sqlx::query("INSERT INTO skills (user_id,name) VALUES (?,?)")
            .bind(&id)
            .bind(skill)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!(participant_id = %id, nickname, ?role, "participant created");

    get(db_pool, &id, 0)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn get(db_pool: &SqlitePool, id: &str, dice_limit: i64) -> Result<Option<Participant>, sqlx::Error> {
    let participant: Option<Participant> = sqlx::query_as(&format!("{SELECT_PARTICIPANT} WHERE id=?"))
        .bind(id)
        .fetch_optional(db_pool)
        .await?;

    with_dice(db_pool, participant, dice_limit).await
}

pub async fn find_master(db_pool: &SqlitePool, dice_limit: i64) -> Result<Option<Participant>, sqlx::Error> {
    let participant: Option<Participant> =
        sqlx::query_as(&format!("{SELECT_PARTICIPANT} WHERE is_master=1 ORDER BY rowid LIMIT 1"))
            .fetch_optional(db_pool)
            .await?;

    with_dice(db_pool, participant, dice_limit).await
}

pub async fn find_by_character_id(
    db_pool: &SqlitePool,
    character_id: &str,
    dice_limit: i64,
) -> Result<Option<Participant>, sqlx::Error> {
    let participant: Option<Participant> =
        sqlx::query_as(&format!("{SELECT_PARTICIPANT} WHERE character_id=?"))
            .bind(character_id)
            .fetch_optional(db_pool)
            .await?;

    with_dice(db_pool, participant, dice_limit).await
}

async fn with_dice(
    db_pool: &SqlitePool,
    participant: Option<Participant>,
    dice_limit: i64,
) -> Result<Option<Participant>, sqlx::Error> {
    let Some(mut participant) = participant else {
        return Ok(None);
    };
    participant.dice_results = recent_dice(db_pool, &participant.id, dice_limit).await?;
    Ok(Some(participant))
}

/// All participants in creation order, each with recent dice history.
pub async fn list(db_pool: &SqlitePool, dice_limit: i64) -> Result<Vec<Participant>, sqlx::Error> {
    let mut participants: Vec<Participant> =
        sqlx::query_as(&format!("{SELECT_PARTICIPANT} ORDER BY created_at,rowid"))
            .fetch_all(db_pool)
            .await?;

    for participant in &mut participants {
        participant.dice_results = recent_dice(db_pool, &participant.id, dice_limit).await?;
    }
    Ok(participants)
}

/// Participants followed by every NPC flagged show-in-chat.
pub async fn roster(db_pool: &SqlitePool, dice_limit: i64) -> Result<Vec<RosterEntry>, sqlx::Error> {
    let mut entries: Vec<RosterEntry> = list(db_pool, dice_limit)
        .await?
        .into_iter()
        .map(RosterEntry::Participant)
        .collect();

    entries.extend(
        npcs::chat_visible(db_pool)
            .await?
            .into_iter()
            .map(RosterEntry::Npc),
    );
    Ok(entries)
}

pub async fn update_nickname(db_pool: &SqlitePool, id: &str, nickname: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE participants SET nickname=? WHERE id=?")
        .bind(nickname)
        .bind(id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_health(db_pool: &SqlitePool, id: &str, health_points: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE participants SET health_points=? WHERE id=?")
        .bind(health_points)
        .bind(id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_max_health(db_pool: &SqlitePool, id: &str, max_health_points: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE participants SET max_health_points=? WHERE id=?")
        .bind(max_health_points)
        .bind(id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Removes the participant; the schema cascades to sheet rows, messages,
/// dice history and anything the participant owns as master.
pub async fn delete(db_pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM participants WHERE id=?")
        .bind(id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_dice_result(db_pool: &SqlitePool, id: &str, result: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO dice_results (user_id,result) VALUES (?,?)")
        .bind(id)
        .bind(result)
        .execute(db_pool)
        .await?;
    Ok(())
}

pub async fn recent_dice(db_pool: &SqlitePool, id: &str, limit: i64) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT result FROM dice_results WHERE user_id=? ORDER BY id DESC LIMIT ?")
        .bind(id)
        .bind(limit)
        .fetch_all(db_pool)
        .await?;
    Ok(rows.into_iter().map(|(result,)| result).collect())
}

/// Picks a random character code nobody holds yet.
pub async fn free_character_code(db_pool: &SqlitePool) -> Result<Option<String>, sqlx::Error> {
    let taken: HashSet<String> = sqlx::query_as::<_, (String,)>("SELECT character_id FROM participants WHERE character_id IS NOT NULL")
        .fetch_all(db_pool)
        .await?
        .into_iter()
        .map(|(code,)| code)
        .collect();

    let free: Vec<String> = (0..1000)
        .map(|n| format!("{n:03}"))
        .filter(|code| !taken.contains(code))
        .collect();

    Ok(free.choose(&mut rand::rng()).cloned())
}
