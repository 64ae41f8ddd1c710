use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    session::broadcast::Broadcaster,
    store::catalog::{self, CatalogKind, SharedAbility, SharedAbilityInput, SharedItem, SharedItemInput},
    AppError, AppResult, AppState,
};

use super::{require_master, success, MasterFilter, MasterQuery};

#[debug_handler(state = AppState)]
pub(crate) async fn create_item(
    Query(MasterQuery { master_id }): Query<MasterQuery>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(input): Json<SharedItemInput>,
) -> AppResult<Json<SharedItem>> {
    require_master(&db_pool, &master_id, "create shared items").await?;

    let item = catalog::create_item(&db_pool, &master_id, &input).await?;
    broadcaster.push_shared_catalog(CatalogKind::Items).await?;
    Ok(Json(item))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_items(
    Query(MasterFilter { master_id }): Query<MasterFilter>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<SharedItem>>> {
    Ok(Json(catalog::list_items(&db_pool, master_id.as_deref()).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_item(
    Path(item_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(input): Json<SharedItemInput>,
) -> AppResult<Json<Value>> {
    if !catalog::update_item(&db_pool, &item_id, &input).await? {
        return Err(AppError::not_found("Shared item"));
    }
    broadcaster.push_shared_catalog(CatalogKind::Items).await?;
    Ok(success())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_item(
    Path(item_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
) -> AppResult<Json<Value>> {
    if !catalog::delete_item(&db_pool, &item_id).await? {
        return Err(AppError::not_found("Shared item"));
    }
    broadcaster.push_shared_catalog(CatalogKind::Items).await?;
    Ok(success())
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_ability(
    Query(MasterQuery { master_id }): Query<MasterQuery>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(input): Json<SharedAbilityInput>,
) -> AppResult<Json<SharedAbility>> {
    require_master(&db_pool, &master_id, "create shared abilities").await?;

    let ability = catalog::create_ability(&db_pool, &master_id, &input).await?;
    broadcaster.push_shared_catalog(CatalogKind::Abilities).await?;
    Ok(Json(ability))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_abilities(
    Query(MasterFilter { master_id }): Query<MasterFilter>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<SharedAbility>>> {
    Ok(Json(catalog::list_abilities(&db_pool, master_id.as_deref()).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_ability(
    Path(ability_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
    Json(input): Json<SharedAbilityInput>,
) -> AppResult<Json<Value>> {
    if !catalog::update_ability(&db_pool, &ability_id, &input).await? {
        return Err(AppError::not_found("Shared ability"));
    }
    broadcaster.push_shared_catalog(CatalogKind::Abilities).await?;
    Ok(success())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_ability(
    Path(ability_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(broadcaster): State<Broadcaster>,
) -> AppResult<Json<Value>> {
    if !catalog::delete_ability(&db_pool, &ability_id).await? {
        return Err(AppError::not_found("Shared ability"));
    }
    broadcaster.push_shared_catalog(CatalogKind::Abilities).await?;
    Ok(success())
}
