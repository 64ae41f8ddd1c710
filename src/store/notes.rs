use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::prefixed_id;

/// Private to the master who wrote it. Never pushed over a socket.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterNote {
    pub id: String,
    pub master_id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NoteInput {
    pub title: String,
    pub content: String,
    pub category: String,
}

pub async fn create(db_pool: &SqlitePool, master_id: &str, input: &NoteInput) -> Result<MasterNote, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO master_notes (id,master_id,title,content,category) VALUES (?,?,?,?,?)
         RETURNING id,master_id,title,content,category,created_at",
    )
    .bind(prefixed_id("note"))
    .bind(master_id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.category)
    .fetch_one(db_pool)
    .await
}

pub async fn list(db_pool: &SqlitePool, master_id: &str) -> Result<Vec<MasterNote>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id,master_id,title,content,category,created_at FROM master_notes WHERE master_id=? ORDER BY rowid",
    )
    .bind(master_id)
    .fetch_all(db_pool)
    .await
}

pub async fn update(db_pool: &SqlitePool, note_id: &str, input: &NoteInput) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE master_notes SET title=?,content=?,category=? WHERE id=?")
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.category)
        .bind(note_id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(db_pool: &SqlitePool, note_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM master_notes WHERE id=?")
        .bind(note_id)
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{participants, testing};

    #[tokio::test]
    async fn notes_are_scoped_to_their_master() {
        let db_pool = testing::pool().await;
        let master = testing::master(&db_pool).await;
        let input = NoteInput { title: "Villain".into(), content: "The baron did it".into(), category: "plot".into() };
        let note = create(&db_pool, &master.id, &input).await.unwrap();
        assert!(note.id.starts_with("note-"));

        assert_eq!(list(&db_pool, &master.id).await.unwrap(), vec![note.clone()]);
        assert!(list(&db_pool, "other").await.unwrap().is_empty());

        let edit = NoteInput { title: "Villain".into(), content: "The butler did it".into(), category: "plot".into() };
        assert!(update(&db_pool, &note.id, &edit).await.unwrap());
        assert_eq!(list(&db_pool, &master.id).await.unwrap()[0].content, "The butler did it");

        participants::delete(&db_pool, &master.id).await.unwrap();
        assert!(!delete(&db_pool, &note.id).await.unwrap());
    }
}
