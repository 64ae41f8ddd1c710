//! Master-owned item and ability templates shared with the whole table.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::prefixed_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Items,
    Abilities,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedItem {
    pub id: String,
    pub master_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub rarity: String,
    pub value: String,
    pub weight: String,
    pub effect: String,
    pub is_public: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedItemInput {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub rarity: String,
    pub value: String,
    pub weight: String,
    pub effect: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedAbility {
    pub id: String,
    pub master_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub cost: String,
    pub range: String,
    pub duration: String,
    pub effect: String,
    pub is_public: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedAbilityInput {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub cost: String,
    pub range: String,
    pub duration: String,
    pub effect: String,
    pub is_public: bool,
}

const ITEM_COLUMNS: &str = "id,master_id,name,description,type,rarity,value,weight,effect,is_public,created_at";
const ABILITY_COLUMNS: &str = "id,master_id,name,description,type,cost,\"range\",duration,effect,is_public,created_at";

/// Inserts the item, keeping a client-supplied id when there is one.
pub async fn create_item(db_pool: &SqlitePool, master_id: &str, input: &SharedItemInput) -> Result<SharedItem, sqlx::Error> {
    let id = input.id.clone().unwrap_or_else(|| prefixed_id("item"));
    sqlx::query_as(&format!(
        "INSERT INTO shared_items (id,master_id,name,description,type,rarity,value,weight,effect,is_public)
         VALUES (?,?,?,?,?,?,?,?,?,?) RETURNING {ITEM_COLUMNS}"
    ))
    .bind(&id)
    .bind(master_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.kind)
    .bind(&input.rarity)
    .bind(&input.value)
    .bind(&input.weight)
    .bind(&input.effect)
    .bind(input.is_public)
    .fetch_one(db_pool)
    .await
}

/// Every item, or only those owned by `master_id`.
pub async fn list_items(db_pool: &SqlitePool, master_id: Option<&str>) -> Result<Vec<SharedItem>, sqlx::Error> {
    match master_id {
        Some(master_id) => {
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM shared_items WHERE master_id=? ORDER BY rowid"))
                .bind(master_id)
                .fetch_all(db_pool)
                .await
        }
        None => {
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM shared_items ORDER BY rowid"))
                .fetch_all(db_pool)
                .await
        }
    }
}

pub async fn update_item(db_pool: &SqlitePool, item_id: &str, input: &SharedItemInput) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE shared_items SET name=?,description=?,type=?,rarity=?,value=?,weight=?,effect=?,is_public=? WHERE id=?",
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.kind)
    .bind(&input.rarity)
    .bind(&input.value)
    .bind(&input.weight)
    .bind(&input.effect)
    .bind(input.is_public)
    .bind(item_id)
    .execute(db_pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_item(db_pool: &SqlitePool, item_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM shared_items WHERE id=?")
        .bind(item_id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn create_ability(db_pool: &SqlitePool, master_id: &str, input: &SharedAbilityInput) -> Result<SharedAbility, sqlx::Error> {
    let id = input.id.clone().unwrap_or_else(|| prefixed_id("ability"));
    sqlx::query_as(&format!(
        "INSERT INTO shared_abilities (id,master_id,name,description,type,cost,\"range\",duration,effect,is_public)
         VALUES (?,?,?,?,?,?,?,?,?,?) RETURNING {ABILITY_COLUMNS}"
    ))
    .bind(&id)
    .bind(master_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.kind)
    .bind(&input.cost)
    .bind(&input.range)
    .bind(&input.duration)
    .bind(&input.effect)
    .bind(input.is_public)
    .fetch_one(db_pool)
    .await
}

pub async fn list_abilities(db_pool: &SqlitePool, master_id: Option<&str>) -> Result<Vec<SharedAbility>, sqlx::Error> {
    match master_id {
        Some(master_id) => {
            sqlx::query_as(&format!("SELECT {ABILITY_COLUMNS} FROM shared_abilities WHERE master_id=? ORDER BY rowid"))
                .bind(master_id)
                .fetch_all(db_pool)
                .await
        }
        None => {
            sqlx::query_as(&format!("SELECT {ABILITY_COLUMNS} FROM shared_abilities ORDER BY rowid"))
                .fetch_all(db_pool)
                .await
        }
    }
}

pub async fn update_ability(db_pool: &SqlitePool, ability_id: &str, input: &SharedAbilityInput) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE shared_abilities SET name=?,description=?,type=?,cost=?,\"range\"=?,duration=?,effect=?,is_public=? WHERE id=?",
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.kind)
    .bind(&input.cost)
    .bind(&input.range)
    .bind(&input.duration)
    .bind(&input.effect)
    .bind(input.is_public)
    .bind(ability_id)
    .execute(db_pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_ability(db_pool: &SqlitePool, ability_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM shared_abilities WHERE id=?")
        .bind(ability_id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
