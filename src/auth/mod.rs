use axum::{routing::{get, post}, Router};
use tower_sessions::Session;

use crate::{AppResult, AppState};

mod login;
mod logout;

pub use login::{login, LoginResponse};
pub use logout::{logout, me};

/// Cookie-session key holding the logged-in participant id.
pub const USER_ID: &str = "user_id";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Participant id stored in the cookie session, if any.
pub async fn session_user(session: &Session) -> AppResult<Option<String>> {
    Ok(session.get::<String>(USER_ID).await?)
}
