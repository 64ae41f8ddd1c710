use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    session::broadcast::Broadcaster,
    store::participants::{self, Participant, Role},
    AppError, AppResult, AppState, Config,
};

use super::USER_ID;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub nickname: String,
    #[serde(default)]
    pub master_code: Option<String>,
    #[serde(default)]
    pub character_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Participant,
}

#[debug_handler(state = AppState)]
pub async fn login(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    State(broadcaster): State<Broadcaster>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = resolve(&db_pool, &config, broadcaster.dice_history_limit(), request).await?;

    session.insert(USER_ID, &user.id).await?;
    tracing::info!(participant_id = %user.id, nickname = %user.nickname, role = ?user.role(), "logged in");

    Ok(Json(LoginResponse { success: true, user }))
}

/// Master code → the one master (created on first login). Otherwise a player
/// keyed by character code, created on first use; a returning player's new
/// nickname replaces the old one.
async fn resolve(
    db_pool: &SqlitePool,
    config: &Config,
    dice_limit: i64,
    LoginRequest { nickname, master_code, character_id }: LoginRequest,
) -> AppResult<Participant> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(AppError::Validation("Nickname is required".to_owned()));
    }

    if master_code.as_deref() == Some(config.master_code.as_str()) {
        if let Some(master) = participants::find_master(db_pool, dice_limit).await? {
            return Ok(master);
        }
        return Ok(participants::create(db_pool, nickname, Role::Master, None).await?);
    }

    let code = character_id.unwrap_or_default();
    if !participants::is_valid_character_code(&code) {
        return Err(AppError::Validation("Character ID must be 3 digits".to_owned()));
    }

    match participants::find_by_character_id(db_pool, &code, dice_limit).await? {
        Some(existing) if existing.nickname == nickname => Ok(existing),
        Some(existing) => {
            participants::update_nickname(db_pool, &existing.id, nickname).await?;
            participants::get(db_pool, &existing.id, dice_limit)
                .await?
                .ok_or_else(|| AppError::not_found("Participant"))
        }
        None => Ok(participants::create(db_pool, nickname, Role::Player, Some(&code)).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    fn request(nickname: &str, master_code: Option<&str>, character_id: Option<&str>) -> LoginRequest {
        LoginRequest {
            nickname: nickname.to_owned(),
            master_code: master_code.map(str::to_owned),
            character_id: character_id.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn repeat_master_login_returns_the_same_master() {
        let db_pool = testing::pool().await;
        let config = Config::ephemeral();

        let first = resolve(&db_pool, &config, 3, request("GM", Some("master123"), None)).await.unwrap();
        let second = resolve(&db_pool, &config, 3, request("Other GM", Some("master123"), None)).await.unwrap();
        assert!(first.is_master);
        assert_eq!(first.id, second.id);
        assert_eq!(second.nickname, "GM");
    }

    #[tokio::test]
    async fn wrong_master_code_falls_through_to_player_rules() {
        let db_pool = testing::pool().await;
        let config = Config::ephemeral();
        let err = resolve(&db_pool, &config, 3, request("Sneaky", Some("guess"), None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn player_is_keyed_by_character_code() {
        let db_pool = testing::pool().await;
        let config = Config::ephemeral();

        let first = resolve(&db_pool, &config, 3, request("Aria", None, Some("101"))).await.unwrap();
        let renamed = resolve(&db_pool, &config, 3, request("Aria the Bold", None, Some("101"))).await.unwrap();
        assert_eq!(first.id, renamed.id);
        assert_eq!(renamed.nickname, "Aria the Bold");
        assert!(!renamed.is_master);
    }

    #[tokio::test]
    async fn bad_input_is_rejected() {
        let db_pool = testing::pool().await;
        let config = Config::ephemeral();

        for bad in [request("  ", None, Some("101")), request("Aria", None, Some("1a1")), request("Aria", None, None)] {
            let err = resolve(&db_pool, &config, 3, bad).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }
}
