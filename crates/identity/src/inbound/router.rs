use axum::Router;
use axum::routing::{get, post};

use crate::inbound::http::account::*;
use crate::inbound::http::login::*;
use crate::inbound::state::IdentityState;

pub fn create_router(state: IdentityState) -> Router {
    Router::new()
        // provider handshake
        .route("/oauth2/authorization/{provider}", get(oauth_authorize))
        .route("/login/oauth2/code/{provider}", get(oauth_callback))
        // session-scoped account API; handlers resolve the session
        // themselves because /api/user must answer 200 either way
        .route("/api/user", get(current_user))
        .route("/api/profile", post(update_profile))
        .route("/api/logout", post(logout))
        .with_state(state)
}
