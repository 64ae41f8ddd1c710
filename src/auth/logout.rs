use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    session::broadcast::Broadcaster,
    store::participants::{self, Participant},
    AppError, AppResult, AppState,
};

#[debug_handler]
pub async fn logout(session: Session) -> AppResult<Json<Value>> {
    session.clear().await;
    Ok(Json(json!({ "success": true })))
}

#[debug_handler(state = AppState)]
pub async fn me(
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    session: Session,
) -> AppResult<Json<Participant>> {
    let Some(user_id) = super::session_user(&session).await? else {
        return Err(AppError::not_found("Session"));
    };

    participants::get(&db_pool, &user_id, broadcaster.dice_history_limit())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Participant"))
}
