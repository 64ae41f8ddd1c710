//! REST CRUD. Master-initiated mutations trigger the same pushes the socket
//! protocol does.

mod characters;
mod notes;
mod npcs;
mod shared;

use axum::{routing::{delete, get, post, put}, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    store::participants::{self, Participant},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(characters::list_users))
        .route("/messages", get(characters::list_messages))
        .route("/character/{user_id}", get(characters::get_character).put(characters::update_character))
        .route("/character/{user_id}/health", put(characters::update_health))
        .route("/character/{user_id}/max-health", put(characters::update_max_health))
        .route("/character/{user_id}/items", post(characters::add_item))
        .route("/character/{user_id}/abilities", post(characters::add_ability))
        .route("/master/characters", post(characters::create_character))
        .route("/master/characters/{character_id}", delete(characters::delete_character))
        .route("/npcs", post(npcs::create_npc))
        .route("/npcs/{id}", get(npcs::list_npcs).put(npcs::update_npc).delete(npcs::delete_npc))
        .route("/shared-items", get(shared::list_items).post(shared::create_item))
        .route("/shared-items/{item_id}", put(shared::update_item).delete(shared::delete_item))
        .route("/shared-abilities", get(shared::list_abilities).post(shared::create_ability))
        .route("/shared-abilities/{ability_id}", put(shared::update_ability).delete(shared::delete_ability))
        .route("/master-notes", post(notes::create_note))
        .route("/master-notes/{id}", get(notes::list_notes).put(notes::update_note).delete(notes::delete_note))
}

#[derive(Deserialize)]
pub(crate) struct MasterQuery {
    pub(crate) master_id: String,
}

#[derive(Deserialize)]
pub(crate) struct MasterFilter {
    pub(crate) master_id: Option<String>,
}

/// The participant behind `master_id`, if they really are the master.
pub(crate) async fn require_master(db_pool: &SqlitePool, master_id: &str, action: &str) -> AppResult<Participant> {
    match participants::get(db_pool, master_id, 0).await? {
        Some(participant) if participant.is_master => Ok(participant),
        _ => Err(AppError::forbidden(format!("Only masters can {action}"))),
    }
}

pub(crate) fn success() -> axum::Json<Value> {
    axum::Json(json!({ "success": true }))
}
