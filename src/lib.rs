pub mod api;
pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod session;
pub mod store;

use std::sync::Arc;

use axum::{debug_handler, extract::FromRef, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};
pub use config::Config;

use session::{broadcast::Broadcaster, registry::Registry};

/// Everything a handler or a connection task may need; cheap to clone.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub registry: Arc<Registry>,
    pub broadcaster: Broadcaster,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::new(
            db_pool.clone(),
            registry.clone(),
            config.chat_log_limit,
            config.dice_history_limit,
        );

        AppState {
            db_pool,
            registry,
            broadcaster,
            config: Arc::new(config),
        }
    }
}

/// Builds the full HTTP surface: REST under `/api`, the session socket under `/ws`.
pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.config.session_idle_minutes,
        )));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(hello))
        .route("/ws/{user_id}", get(session::ws::session_ws))
        .nest("/api", auth::router().merge(api::router()))
        .with_state(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[debug_handler]
async fn hello() -> Json<Value> {
    Json(json!({ "message": "Welcome to the rpgsession API" }))
}
