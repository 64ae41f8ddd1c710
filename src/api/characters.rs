use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    auth,
    session::{broadcast::{self, Broadcaster}, ws::CLOSE_NORMAL},
    store::{
        characters::{self, Ability, CharacterSheet, InventoryItem, SheetUpdate},
        chat::{self, ChatMessage},
        participants::{self, Role, RosterEntry},
    },
    AppError, AppResult, AppState, Config,
};

use super::{require_master, success};

#[derive(Deserialize)]
pub(crate) struct HealthQuery {
    health_points: i64,
}

#[derive(Deserialize)]
pub(crate) struct MaxHealthQuery {
    max_health_points: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewCharacter {
    master_id: String,
    nickname: String,
    #[serde(default)]
    character_id: Option<String>,
}

/// The roster as the session's participant would receive it over the socket.
/// Anonymous callers see nobody's character code.
#[debug_handler(state = AppState)]
pub(crate) async fn list_users(
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    session: Session,
) -> AppResult<Json<Vec<RosterEntry>>> {
    let limit = broadcaster.dice_history_limit();
    let roster = participants::roster(&db_pool, limit).await?;

    let viewer = match auth::session_user(&session).await? {
        Some(id) => participants::get(&db_pool, &id, 0).await?,
        None => None,
    };
    let view = match viewer {
        Some(viewer) => broadcast::roster_for(&roster, &viewer.id, viewer.role()),
        None => broadcast::roster_for(&roster, "", Role::Player),
    };
    Ok(Json(view))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_messages(
    State(db_pool): State<SqlitePool>,
    State(config): State<std::sync::Arc<Config>>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    Ok(Json(chat::recent(&db_pool, config.chat_log_limit).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_character(
    Path(user_id): Path<String>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<CharacterSheet>> {
    characters::get(&db_pool, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Character"))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_character(
    Path(user_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    Json(update): Json<SheetUpdate>,
) -> AppResult<Json<CharacterSheet>> {
    if characters::get(&db_pool, &user_id).await?.is_none() {
        return Err(AppError::not_found("Character"));
    }

    characters::apply_update(&db_pool, &user_id, &update).await?;
    characters::get(&db_pool, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Character"))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_health(
    Path(user_id): Path<String>,
    Query(HealthQuery { health_points }): Query<HealthQuery>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
) -> AppResult<Json<Value>> {
    if !participants::update_health(&db_pool, &user_id, health_points).await? {
        return Err(AppError::not_found("User"));
    }
    broadcaster.push_roster().await?;
    Ok(success())
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_max_health(
    Path(user_id): Path<String>,
    Query(MaxHealthQuery { max_health_points }): Query<MaxHealthQuery>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
) -> AppResult<Json<Value>> {
    if !participants::update_max_health(&db_pool, &user_id, max_health_points).await? {
        return Err(AppError::not_found("User"));
    }
    broadcaster.push_roster().await?;
    Ok(success())
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_item(
    Path(user_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(item): Json<InventoryItem>,
) -> AppResult<Json<Value>> {
    if participants::get(&db_pool, &user_id, 0).await?.is_none() {
        return Err(AppError::not_found("User"));
    }
    characters::add_item(&db_pool, &user_id, &item).await?;
    broadcaster.push_character(&user_id).await?;
    Ok(success())
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_ability(
    Path(user_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(ability): Json<Ability>,
) -> AppResult<Json<Value>> {
    if participants::get(&db_pool, &user_id, 0).await?.is_none() {
        return Err(AppError::not_found("User"));
    }
    characters::add_ability(&db_pool, &user_id, &ability).await?;
    broadcaster.push_character(&user_id).await?;
    Ok(success())
}

/// Master creates a player character, picking a free code when none is given.
#[debug_handler(state = AppState)]
pub(crate) async fn create_character(
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(NewCharacter { master_id, nickname, character_id }): Json<NewCharacter>,
) -> AppResult<Json<auth::LoginResponse>> {
    require_master(&db_pool, &master_id, "create characters").await?;

    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(AppError::Validation("Nickname is required for the new character".to_owned()));
    }

    let code = match character_id {
        Some(code) if participants::is_valid_character_code(&code) => code,
        Some(_) => return Err(AppError::Validation("Character ID must be 3 digits".to_owned())),
        None => participants::free_character_code(&db_pool)
            .await?
            .ok_or_else(|| AppError::Validation("No free character IDs left".to_owned()))?,
    };
    if participants::find_by_character_id(&db_pool, &code, 0).await?.is_some() {
        return Err(AppError::Validation(format!("Character ID {code} is already taken")));
    }

    let user = participants::create(&db_pool, nickname, Role::Player, Some(&code)).await?;
    broadcaster.push_roster().await?;
    Ok(Json(auth::LoginResponse { success: true, user }))
}

/// Removes a player by character code and closes their socket if open.
#[debug_handler(state = AppState)]
pub(crate) async fn delete_character(
    Path(character_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
) -> AppResult<Json<Value>> {
    let Some(target) = participants::find_by_character_id(&db_pool, &character_id, 0).await? else {
        return Err(AppError::not_found(format!("Character with ID {character_id}")));
    };

    if !participants::delete(&db_pool, &target.id).await? {
        return Err(AppError::not_found(format!("Character with ID {character_id}")));
    }
    tracing::info!(participant_id = %target.id, character_id = %character_id, "participant deleted");

    broadcaster
        .registry()
        .disconnect(&target.id, CLOSE_NORMAL, "participant removed")
        .await;
    broadcaster.push_roster().await?;
    Ok(success())
}
