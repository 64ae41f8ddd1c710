use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    store::notes::{self, MasterNote, NoteInput},
    AppError, AppResult, AppState,
};

use super::{require_master, success, MasterQuery};

#[debug_handler(state = AppState)]
pub(crate) async fn create_note(
    Query(MasterQuery { master_id }): Query<MasterQuery>,
    State(db_pool): State<SqlitePool>,
    Json(input): Json<NoteInput>,
) -> AppResult<Json<MasterNote>> {
    require_master(&db_pool, &master_id, "create notes").await?;
    Ok(Json(notes::create(&db_pool, &master_id, &input).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_notes(
    Path(master_id): Path<String>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<MasterNote>>> {
    require_master(&db_pool, &master_id, "view notes").await?;
    Ok(Json(notes::list(&db_pool, &master_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_note(
    Path(note_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    Json(input): Json<NoteInput>,
) -> AppResult<Json<Value>> {
    if !notes::update(&db_pool, &note_id, &input).await? {
        return Err(AppError::not_found("Note"));
    }
    Ok(success())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_note(
    Path(note_id): Path<String>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Value>> {
    if !notes::delete(&db_pool, &note_id).await? {
        return Err(AppError::not_found("Note"));
    }
    Ok(success())
}
