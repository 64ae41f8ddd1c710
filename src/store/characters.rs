use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::prefixed_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub strength: i64,
    pub dexterity: i64,
    pub constitution: i64,
    pub intelligence: i64,
    pub wisdom: i64,
    pub charisma: i64,
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub proficient: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Ability {
    #[serde(default = "new_ability_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(default = "new_item_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn new_ability_id() -> String {
    prefixed_id("ability")
}

fn new_item_id() -> String {
    prefixed_id("item")
}

fn one() -> i64 {
    1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(default)]
pub struct Currency {
    pub bronze: i64,
    pub silver: i64,
    pub gold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSheet {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    pub attributes: Attributes,
    pub skills: Vec<Skill>,
    pub abilities: Vec<Ability>,
    pub inventory: Vec<InventoryItem>,
    pub currency: Currency,
}

/// A partial sheet: only the sections present are replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<Skill>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abilities: Option<Vec<Ability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<InventoryItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl SheetUpdate {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_none()
            && self.skills.is_none()
            && self.abilities.is_none()
            && self.inventory.is_none()
            && self.currency.is_none()
    }
}

/// Table family a sheet lives in. Characters and NPCs share the row shapes
/// but not the tables.
pub(crate) struct SheetTables {
    pub owner: &'static str,
    pub attributes: &'static str,
    pub skills: &'static str,
    pub abilities: &'static str,
    pub inventory: &'static str,
    pub currency: Option<&'static str>,
}

pub(crate) const CHARACTER_TABLES: SheetTables = SheetTables {
    owner: "user_id",
    attributes: "attributes",
    skills: "skills",
    abilities: "abilities",
    inventory: "inventory",
    currency: Some("currency"),
};

pub(crate) const NPC_TABLES: SheetTables = SheetTables {
    owner: "npc_id",
    attributes: "npc_attributes",
    skills: "npc_skills",
    abilities: "npc_abilities",
    inventory: "npc_inventory",
    currency: None,
};

impl SheetTables {
    pub(crate) async fn read_attributes(&self, db_pool: &SqlitePool, owner_id: &str) -> Result<Option<Attributes>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT strength,dexterity,constitution,intelligence,wisdom,charisma FROM {} WHERE {}=?",
            self.attributes, self.owner
        ))
        .bind(owner_id)
        .fetch_optional(db_pool)
        .await
    }

    pub(crate) async fn read_skills(&self, db_pool: &SqlitePool, owner_id: &str) -> Result<Vec<Skill>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT name,value,proficient FROM {} WHERE {}=? ORDER BY rowid",
            self.skills, self.owner
        ))
        .bind(owner_id)
        .fetch_all(db_pool)
        .await
    }

    pub(crate) async fn read_abilities(&self, db_pool: &SqlitePool, owner_id: &str) -> Result<Vec<Ability>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT id,name,description FROM {} WHERE {}=? ORDER BY rowid",
            self.abilities, self.owner
        ))
        .bind(owner_id)
        .fetch_all(db_pool)
        .await
    }

    pub(crate) async fn read_inventory(&self, db_pool: &SqlitePool, owner_id: &str) -> Result<Vec<InventoryItem>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT id,name,description,quantity FROM {} WHERE {}=? ORDER BY rowid",
            self.inventory, self.owner
        ))
        .bind(owner_id)
        .fetch_all(db_pool)
        .await
    }

    /// Replaces every section present in `update`. The caller owns the
    /// transaction, so a half-written sheet is never visible.
    pub(crate) async fn write(&self, conn: &mut SqliteConnection, owner_id: &str, update: &SheetUpdate) -> Result<(), sqlx::Error> {
        if let Some(attributes) = &update.attributes {
            sqlx::query(&format!(
                "INSERT INTO {table} ({owner},strength,dexterity,constitution,intelligence,wisdom,charisma) VALUES (?,?,?,?,?,?,?)
                 ON CONFLICT({owner}) DO UPDATE SET strength=excluded.strength,dexterity=excluded.dexterity,
                 constitution=excluded.constitution,intelligence=excluded.intelligence,wisdom=excluded.wisdom,charisma=excluded.charisma",
                table = self.attributes,
                owner = self.owner,
            ))
            .bind(owner_id)
            .bind(attributes.strength)
            .bind(attributes.dexterity)
            .bind(attributes.constitution)
            .bind(attributes.intelligence)
            .bind(attributes.wisdom)
            .bind(attributes.charisma)
            .execute(&mut *conn)
            .await?;
        }

        if let Some(skills) = &update.skills {
            sqlx::query(&format!("DELETE FROM {} WHERE {}=?", self.skills, self.owner))
                .bind(owner_id)
                .execute(&mut *conn)
                .await?;
            for skill in skills {
                sqlx::query(&format!("INSERT INTO {} ({},name,value,proficient) VALUES (?,?,?,?)", self.skills, self.owner))
                    .bind(owner_id)
                    .bind(&skill.name)
                    .bind(skill.value)
                    .bind(skill.proficient)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        if let Some(abilities) = &update.abilities {
            sqlx::query(&format!("DELETE FROM {} WHERE {}=?", self.abilities, self.owner))
                .bind(owner_id)
                .execute(&mut *conn)
                .await?;
            for ability in abilities {
                self.insert_ability(conn, owner_id, ability).await?;
            }
        }

        if let Some(inventory) = &update.inventory {
            sqlx::query(&format!("DELETE FROM {} WHERE {}=?", self.inventory, self.owner))
                .bind(owner_id)
                .execute(&mut *conn)
                .await?;
            for item in inventory {
                self.insert_item(conn, owner_id, item).await?;
            }
        }

        if let (Some(currency), Some(table)) = (&update.currency, self.currency) {
            sqlx::query(&format!(
                "INSERT INTO {table} ({owner},bronze,silver,gold) VALUES (?,?,?,?)
                 ON CONFLICT({owner}) DO UPDATE SET bronze=excluded.bronze,silver=excluded.silver,gold=excluded.gold",
                owner = self.owner,
            ))
            .bind(owner_id)
            .bind(currency.bronze)
            .bind(currency.silver)
            .bind(currency.gold)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub(crate) async fn insert_ability(&self, conn: &mut SqliteConnection, owner_id: &str, ability: &Ability) -> Result<(), sqlx::Error> {
        sqlx::query(&format!("INSERT INTO {} (id,{},name,description) VALUES (?,?,?,?)", self.abilities, self.owner))
            .bind(&ability.id)
            .bind(owner_id)
            .bind(&ability.name)
            .bind(&ability.description)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub(crate) async fn insert_item(&self, conn: &mut SqliteConnection, owner_id: &str, item: &InventoryItem) -> Result<(), sqlx::Error> {
        sqlx::query(&format!("INSERT INTO {} (id,{},name,description,quantity) VALUES (?,?,?,?,?)", self.inventory, self.owner))
            .bind(&item.id)
            .bind(owner_id)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

/// The full sheet, or `None` when the participant has none (or does not exist).
pub async fn get(db_pool: &SqlitePool, user_id: &str) -> Result<Option<CharacterSheet>, sqlx::Error> {
    let tables = &CHARACTER_TABLES;
    let Some(attributes) = tables.read_attributes(db_pool, user_id).await? else {
        return Ok(None);
    };

    let currency: Option<Currency> = sqlx::query_as("SELECT bronze,silver,gold FROM currency WHERE user_id=?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    let character_id: Option<(Option<String>,)> = sqlx::query_as("SELECT character_id FROM participants WHERE id=?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;

    Ok(Some(CharacterSheet {
        user_id: user_id.to_owned(),
        character_id: character_id.and_then(|(code,)| code),
        attributes,
        skills: tables.read_skills(db_pool, user_id).await?,
        abilities: tables.read_abilities(db_pool, user_id).await?,
        inventory: tables.read_inventory(db_pool, user_id).await?,
        currency: currency.unwrap_or_default(),
    }))
}

/// Applies every present section in a single transaction.
pub async fn apply_update(db_pool: &SqlitePool, user_id: &str, update: &SheetUpdate) -> Result<(), sqlx::Error> {
    let mut tx = db_pool.begin().await?;
    CHARACTER_TABLES.write(&mut tx, user_id, update).await?;
    tx.commit().await
}

pub async fn add_item(db_pool: &SqlitePool, user_id: &str, item: &InventoryItem) -> Result<(), sqlx::Error> {
    let mut conn = db_pool.acquire().await?;
    CHARACTER_TABLES.insert_item(&mut conn, user_id, item).await
}

pub async fn add_ability(db_pool: &SqlitePool, user_id: &str, ability: &Ability) -> Result<(), sqlx::Error> {
    let mut conn = db_pool.acquire().await?;
    CHARACTER_TABLES.insert_ability(&mut conn, user_id, ability).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    #[tokio::test]
    async fn missing_participant_has_no_sheet() {
        let db_pool = testing::pool().await;
        assert!(get(&db_pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_replaces_only_present_sections() {
        let db_pool = testing::pool().await;
        let player = testing::player(&db_pool, "Aria", "101").await;

        let update: SheetUpdate = serde_json::from_str(
            r#"{
                "skills": [{"name": "Lockpicking", "value": 4, "proficient": true}],
                "currency": {"gold": 12}
            }"#,
        )
        .unwrap();
        apply_update(&db_pool, &player.id, &update).await.unwrap();

        let sheet = get(&db_pool, &player.id).await.unwrap().unwrap();
        assert_eq!(sheet.character_id.as_deref(), Some("101"));
        assert_eq!(sheet.skills, vec![Skill { name: "Lockpicking".into(), value: 4, proficient: true }]);
        assert_eq!(sheet.currency, Currency { bronze: 0, silver: 0, gold: 12 });
        assert_eq!(sheet.attributes, Attributes::default());
    }

    #[tokio::test]
    async fn failed_update_leaves_sheet_untouched() {
        let db_pool = testing::pool().await;
        let player = testing::player(&db_pool, "Aria", "101").await;
        let rope = InventoryItem { id: "rope".into(), name: "Rope".into(), description: String::new(), quantity: 1 };

        // Second row collides on (user_id, id) after the delete already ran.
        let update = SheetUpdate {
            skills: Some(vec![]),
            inventory: Some(vec![rope.clone(), rope]),
            ..SheetUpdate::default()
        };
        assert!(apply_update(&db_pool, &player.id, &update).await.is_err());

        let sheet = get(&db_pool, &player.id).await.unwrap().unwrap();
        assert_eq!(sheet.skills.len(), crate::store::participants::DEFAULT_SKILLS.len());
        assert!(sheet.inventory.is_empty());
    }

    #[tokio::test]
    async fn add_item_and_ability_append_rows() {
        let db_pool = testing::pool().await;
        let player = testing::player(&db_pool, "Aria", "101").await;

        let item: InventoryItem = serde_json::from_str(r#"{"name": "Torch"}"#).unwrap();
        assert!(item.id.starts_with("item-"));
        assert_eq!(item.quantity, 1);
        add_item(&db_pool, &player.id, &item).await.unwrap();
        add_ability(
            &db_pool,
            &player.id,
            &Ability { id: "ability-1".into(), name: "Second Wind".into(), description: "heal".into() },
        )
        .await
        .unwrap();

        let sheet = get(&db_pool, &player.id).await.unwrap().unwrap();
        assert_eq!(sheet.inventory, vec![item]);
        assert_eq!(sheet.abilities.len(), 1);
    }
}
