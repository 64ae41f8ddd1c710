use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub nickname: String,
    pub content: String,
    #[sqlx(rename = "created_at")]
    pub timestamp: String,
    pub is_dice_roll: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dice_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dice_result: Option<i64>,
}

/// Die label and drawn value attached to a roll summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceAnnotation {
    pub dice_type: String,
    pub result: i64,
}

pub async fn create(
    db_pool: &SqlitePool,
    user_id: &str,
    nickname: &str,
    content: &str,
    roll: Option<DiceAnnotation>,
) -> Result<ChatMessage, sqlx::Error> {
    let id = Uuid::now_v7().to_string();
    let (dice_type, dice_result) = match roll {
        Some(DiceAnnotation { dice_type, result }) => (Some(dice_type), Some(result)),
        None => (None, None),
    };

    sqlx::query_as(
        "INSERT INTO messages (id,user_id,nickname,content,is_dice_roll,dice_type,dice_result) VALUES (?,?,?,?,?,?,?)
         RETURNING id,user_id,nickname,content,created_at,is_dice_roll,dice_type,dice_result",
    )
    .bind(&id)
    .bind(user_id)
    .bind(nickname)
    .bind(content)
    .bind(dice_type.is_some())
    .bind(dice_type)
    .bind(dice_result)
    .fetch_one(db_pool)
    .await
}

/// The newest `limit` messages, oldest first.
pub async fn recent(db_pool: &SqlitePool, limit: i64) -> Result<Vec<ChatMessage>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id,user_id,nickname,content,created_at,is_dice_roll,dice_type,dice_result FROM (
            SELECT rowid AS seq,* FROM messages ORDER BY rowid DESC LIMIT ?
         ) ORDER BY seq ASC",
    )
    .bind(limit)
    .fetch_all(db_pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    #[tokio::test]
    async fn recent_is_bounded_and_oldest_first() {
        let db_pool = testing::pool().await;
        let player = testing::player(&db_pool, "Aria", "101").await;
        for n in 0..7 {
            create(&db_pool, &player.id, "Aria", &format!("line {n}"), None).await.unwrap();
        }

        let log = recent(&db_pool, 5).await.unwrap();
        let lines: Vec<&str> = log.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(lines, ["line 2", "line 3", "line 4", "line 5", "line 6"]);
    }

    #[tokio::test]
    async fn dice_annotation_is_persisted() {
        let db_pool = testing::pool().await;
        let player = testing::player(&db_pool, "Aria", "101").await;
        let roll = DiceAnnotation { dice_type: "d6".into(), result: 4 };
        let message = create(&db_pool, &player.id, "Aria", "Aria rolled d6: 4", Some(roll)).await.unwrap();

        assert!(message.is_dice_roll);
        assert_eq!(message.dice_type.as_deref(), Some("d6"));
        assert_eq!(message.dice_result, Some(4));
        assert_eq!(recent(&db_pool, 100).await.unwrap(), vec![message]);
    }
}
