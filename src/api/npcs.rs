use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    session::broadcast::Broadcaster,
    store::{
        npcs::{self, Npc, NpcInput},
        participants,
    },
    AppError, AppResult, AppState,
};

use super::{require_master, success, MasterQuery};

/// Refreshes the owner's NPC list and, since show-in-chat NPCs sit in the
/// roster, everyone's roster.
async fn push_npc_change(broadcaster: &Broadcaster, master_id: &str) -> AppResult<()> {
    broadcaster.push_npc_roster(master_id).await?;
    broadcaster.push_roster().await?;
    Ok(())
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_npc(
    Query(MasterQuery { master_id }): Query<MasterQuery>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(input): Json<NpcInput>,
) -> AppResult<Json<Vec<Npc>>> {
    require_master(&db_pool, &master_id, "create NPCs").await?;

    npcs::create(&db_pool, &master_id, &input).await?;
    push_npc_change(&broadcaster, &master_id).await?;

    Ok(Json(npcs::list_for_master(&db_pool, &master_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_npcs(
    Path(master_id): Path<String>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Npc>>> {
    match participants::get(&db_pool, &master_id, 0).await? {
        Some(master) if master.is_master => Ok(Json(npcs::list_for_master(&db_pool, &master_id).await?)),
        _ => Err(AppError::not_found("Master user")),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_npc(
    Path(npc_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(input): Json<NpcInput>,
) -> AppResult<Json<Value>> {
    let Some(card) = npcs::find_card(&db_pool, &npc_id).await? else {
        return Err(AppError::not_found("NPC"));
    };

    if !npcs::update(&db_pool, &npc_id, &input).await? {
        return Err(AppError::not_found("NPC"));
    }
    push_npc_change(&broadcaster, &card.master_id).await?;
    Ok(success())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_npc(
    Path(npc_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
) -> AppResult<Json<Value>> {
    let Some(card) = npcs::find_card(&db_pool, &npc_id).await? else {
        return Err(AppError::not_found("NPC"));
    };

    npcs::delete(&db_pool, &npc_id).await?;
    push_npc_change(&broadcaster, &card.master_id).await?;
    Ok(success())
}
